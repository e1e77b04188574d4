//! Settings structs with compiled defaults.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! partial JSON file fills the remaining fields from [`Default`].

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for a Dune client.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuneSettings {
    /// Where the platform lives.
    pub endpoints: EndpointSettings,
    /// HTTP client tuning.
    pub http: HttpSettings,
    /// Attributes of the scratch query the client upserts.
    pub query: QuerySettings,
    /// Job completion polling.
    pub polling: PollSettings,
}

impl DuneSettings {
    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("endpoints.graphqlUrl", &self.endpoints.graphql_url),
            ("endpoints.authBaseUrl", &self.endpoints.auth_base_url),
        ];
        for (key, url) in urls {
            let url = url.trim();
            if url.is_empty() {
                return Err(SettingsError::InvalidValue(format!("{key} must not be empty")));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SettingsError::InvalidValue(format!(
                    "{key} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if self.polling.interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "polling.intervalMs must be > 0".to_string(),
            ));
        }
        if self.polling.max_attempts == Some(0) {
            return Err(SettingsError::InvalidValue(
                "polling.maxAttempts must be > 0 when set".to_string(),
            ));
        }
        if self.http.timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "http.timeoutMs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform URLs and the fixed headers the login form expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// Base URL of the `/api/auth/*` endpoints.
    pub auth_base_url: String,
    /// `Origin` header sent with the login form.
    pub origin: String,
    /// `Referer` header sent with the login form.
    pub login_referer: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            graphql_url: "https://core-hsr.duneanalytics.com/v1/graphql".to_string(),
            auth_base_url: "https://duneanalytics.com".to_string(),
            origin: "https://duneanalytics.com".to_string(),
            login_referer: "https://duneanalytics.com/auth/login".to_string(),
        }
    }
}

/// HTTP client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("dune-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Scratch query attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySettings {
    /// Dataset (engine) the query runs against.
    pub dataset_id: i64,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: String,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            dataset_id: 4,
            name: "Scratch Query".to_string(),
            description: String::new(),
        }
    }
}

/// Job polling. Without `maxAttempts` or `deadlineMs` the client polls
/// until the job finishes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSettings {
    /// Delay between polls in milliseconds.
    pub interval_ms: u64,
    /// Give up after this many polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Give up once this many milliseconds have passed since the first poll.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            max_attempts: None,
            deadline_ms: None,
        }
    }
}
