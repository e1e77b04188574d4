//! `reqwest` implementation of [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dune_core::{DuneError, Result, Session};
use dune_settings::{EndpointSettings, HttpSettings};
use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, LOCATION};
use reqwest::redirect;
use serde_json::Value;
use tracing::{debug, error};

use crate::graphql::{GraphqlRequest, GraphqlResponse};
use crate::transport::{AuthEndpoint, FormRequest, HttpReply, Transport};

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP transport with a cookie jar shared across all requests.
///
/// Two clients share the jar: one follows redirects, one hands 3xx answers
/// back unchanged for the login form.
pub struct ReqwestTransport {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
    graphql_url: String,
    auth_base_url: String,
}

impl ReqwestTransport {
    /// Build the transport for `endpoints`.
    pub fn new(endpoints: &EndpointSettings, http: &HttpSettings) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let build = |policy: redirect::Policy| {
            reqwest::Client::builder()
                .cookie_provider(Arc::clone(&jar))
                .redirect(policy)
                .timeout(Duration::from_millis(http.timeout_ms))
                .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
                .user_agent(http.user_agent.as_str())
                .build()
                .map_err(|e| DuneError::Config(format!("failed to build HTTP client: {e}")))
        };

        Ok(Self {
            client: build(redirect::Policy::default())?,
            no_redirect: build(redirect::Policy::none())?,
            graphql_url: endpoints.graphql_url.clone(),
            auth_base_url: endpoints.auth_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn auth_url(&self, endpoint: AuthEndpoint) -> String {
        format!("{}{}", self.auth_base_url, endpoint.path())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpReply> {
        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect
        };

        let mut builder = client
            .post(self.auth_url(request.endpoint))
            .form(&request.fields);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(transport_error)?;
        debug!(endpoint = %request.endpoint, status, "auth request completed");

        Ok(HttpReply {
            status,
            body,
            location,
        })
    }

    async fn execute(
        &self,
        session: &Session,
        request: &GraphqlRequest,
    ) -> Result<GraphqlResponse<Value>> {
        let mut builder = self.client.post(&self.graphql_url).json(request);
        if let Some(bearer) = session.authorization() {
            builder = builder.header(AUTHORIZATION, bearer);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DuneError::Authentication(format!(
                "{} rejected with HTTP {}: {}",
                request.operation_name,
                status.as_u16(),
                truncate(&body)
            )));
        }
        if !status.is_success() {
            error!(
                operation = request.operation_name,
                status = status.as_u16(),
                "GraphQL request failed"
            );
            return Err(DuneError::from_status(status.as_u16(), truncate(&body)));
        }

        serde_json::from_str(&body).map_err(|e| {
            DuneError::Protocol(format!(
                "{}: undecodable GraphQL response: {e}",
                request.operation_name
            ))
        })
    }
}

fn transport_error(err: reqwest::Error) -> DuneError {
    DuneError::Transport {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_joins_without_double_slash() {
        let endpoints = EndpointSettings {
            auth_base_url: "http://localhost:9/".into(),
            ..EndpointSettings::default()
        };
        let transport = ReqwestTransport::new(&endpoints, &HttpSettings::default()).unwrap();
        assert_eq!(
            transport.auth_url(AuthEndpoint::Session),
            "http://localhost:9/api/auth/session"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
        assert_eq!(truncate("short"), "short");
    }
}
