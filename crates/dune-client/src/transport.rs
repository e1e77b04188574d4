//! The seam between the orchestrator and the network.
//!
//! [`Transport`] has two entry points because the platform has two endpoint
//! families: a form-encoded auth subsystem that relies on cookies, and a
//! GraphQL endpoint authorized by the session's bearer token.

use std::fmt;

use async_trait::async_trait;
use dune_core::{DuneError, Result, Session};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::graphql::{GraphqlRequest, GraphqlResponse};

/// Endpoints of the cookie-based auth subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthEndpoint {
    /// Issues the CSRF token the login form needs.
    Csrf,
    /// Accepts the login form.
    Login,
    /// Exchanges the session cookie for a bearer token.
    Session,
}

impl AuthEndpoint {
    /// Path below the auth base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Csrf => "/api/auth/csrf",
            Self::Login => "/api/auth",
            Self::Session => "/api/auth/session",
        }
    }

    /// Short name used in logs and mock scripts.
    pub fn name(self) -> &'static str {
        match self {
            Self::Csrf => "csrf",
            Self::Login => "login",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for AuthEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A form-encoded POST to the auth subsystem.
#[derive(Clone)]
pub struct FormRequest {
    /// Target endpoint.
    pub endpoint: AuthEndpoint,
    /// Form fields, in order.
    pub fields: Vec<(String, String)>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// When false the transport hands back the raw 3xx response.
    pub follow_redirects: bool,
}

impl FormRequest {
    /// An empty form for `endpoint` that follows redirects.
    pub fn new(endpoint: AuthEndpoint) -> Self {
        Self {
            endpoint,
            fields: Vec::new(),
            headers: Vec::new(),
            follow_redirects: true,
        }
    }

    /// Append a form field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Append a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Return redirects to the caller instead of following them.
    #[must_use]
    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }

    /// Value of a form field, if present.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for FormRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| {
                let shown = if k == "password" { "[REDACTED]" } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();
        f.debug_struct("FormRequest")
            .field("endpoint", &self.endpoint)
            .field("fields", &fields)
            .field("headers", &self.headers)
            .field("follow_redirects", &self.follow_redirects)
            .finish()
    }
}

/// Raw answer from the auth subsystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
    /// `Location` header of a redirect.
    pub location: Option<String>,
}

impl HttpReply {
    /// A reply with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 3xx.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Decode the body as JSON. A body that does not fit `T` is a protocol error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            DuneError::Protocol(format!("unexpected auth response body: {e}"))
        })
    }
}

/// Request/response capability the orchestrator drives.
///
/// Implementations keep the cookie jar between calls; the bearer token is
/// never stored here and arrives with each GraphQL call on the session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a form to the auth subsystem.
    async fn post_form(&self, request: FormRequest) -> Result<HttpReply>;

    /// Execute a GraphQL operation on behalf of `session`.
    async fn execute(
        &self,
        session: &Session,
        request: &GraphqlRequest,
    ) -> Result<GraphqlResponse<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn auth_paths() {
        assert_eq!(AuthEndpoint::Csrf.path(), "/api/auth/csrf");
        assert_eq!(AuthEndpoint::Login.path(), "/api/auth");
        assert_eq!(AuthEndpoint::Session.path(), "/api/auth/session");
        assert_eq!(AuthEndpoint::Login.to_string(), "login");
    }

    #[test]
    fn form_request_debug_redacts_password() {
        let form = FormRequest::new(AuthEndpoint::Login)
            .field("username", "alice")
            .field("password", "hunter2")
            .without_redirects();
        let debug = format!("{form:?}");
        assert!(!debug.contains("hunter2"), "password leaked: {debug}");
        assert!(debug.contains("alice"));
        assert!(!form.follow_redirects);
        assert_eq!(form.field_value("password"), Some("hunter2"));
    }

    #[test]
    fn reply_classification() {
        assert!(HttpReply::new(200, "").is_success());
        assert!(HttpReply::new(302, "").is_redirect());
        assert!(!HttpReply::new(401, "").is_success());
        assert!(!HttpReply::new(401, "").is_redirect());
    }

    #[test]
    fn reply_json_errors_are_protocol() {
        let reply = HttpReply::new(200, "<html>");
        let result: Result<Value> = reply.json();
        assert_matches!(result, Err(DuneError::Protocol(_)));
    }
}
