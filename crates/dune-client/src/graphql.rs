//! GraphQL envelope types and typed operations.

use dune_core::records::null_as_default;
use dune_core::{DuneError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes the platform uses for a missing, expired or rejected token.
const AUTH_ERROR_CODES: &[&str] = &["invalid-jwt", "access-denied", "invalid-headers"];

/// Typed GraphQL operation definition.
///
/// Implement this trait for each query or mutation.
pub trait GraphqlOperation {
    /// Variables type.
    type Variables: Serialize + Send + Sync;
    /// Response data type.
    type ResponseData: DeserializeOwned;

    /// GraphQL document text.
    const QUERY: &'static str;
    /// Operation name sent with the request.
    const OPERATION_NAME: &'static str;
}

/// GraphQL request payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    /// Document text.
    pub query: &'static str,
    /// Operation to run within the document.
    pub operation_name: &'static str,
    /// Serialized variables.
    pub variables: Value,
}

impl GraphqlRequest {
    /// Build the request for operation `O`.
    pub fn new<O: GraphqlOperation>(variables: &O::Variables) -> Result<Self> {
        Ok(Self {
            query: O::QUERY,
            operation_name: O::OPERATION_NAME,
            variables: serde_json::to_value(variables)?,
        })
    }
}

/// GraphQL response container.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T> {
    /// Operation result, absent on hard failure.
    #[serde(default)]
    pub data: Option<T>,
    /// GraphQL-level errors.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub errors: Vec<GraphqlError>,
    /// Server extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl<T> GraphqlResponse<T> {
    /// A response carrying only data.
    pub fn from_data(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            extensions: None,
        }
    }

    /// A response carrying only errors.
    pub fn from_errors(errors: Vec<GraphqlError>) -> Self {
        Self {
            data: None,
            errors,
            extensions: None,
        }
    }
}

/// GraphQL error location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// GraphQL path segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    /// Object field name.
    Key(String),
    /// List index.
    Index(i64),
}

/// A GraphQL-level error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    /// Human-readable message.
    pub message: String,
    /// Document locations the error refers to.
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<GraphqlErrorLocation>,
    /// Response path of the failing field.
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: Vec<GraphqlPathSegment>,
    /// Server extensions, including `code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    /// An error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    /// An error tagged with `extensions.code`.
    pub fn with_code(message: impl Into<String>, code: &str) -> Self {
        Self {
            extensions: Some(serde_json::json!({ "code": code })),
            ..Self::new(message)
        }
    }

    /// `extensions.code`, if present.
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }

    /// Whether the error rejects the caller's credentials.
    pub fn is_authentication(&self) -> bool {
        self.code().is_some_and(|c| AUTH_ERROR_CODES.contains(&c))
    }
}

/// Turn a raw response into `O`'s typed data.
///
/// GraphQL errors win over partial data: an auth error code maps to
/// [`DuneError::Authentication`], anything else to [`DuneError::Protocol`].
pub fn decode<O: GraphqlOperation>(response: GraphqlResponse<Value>) -> Result<O::ResponseData> {
    if !response.errors.is_empty() {
        let message = response
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let message = format!("{}: {message}", O::OPERATION_NAME);
        return Err(if response.errors.iter().any(GraphqlError::is_authentication) {
            DuneError::Authentication(message)
        } else {
            DuneError::Protocol(message)
        });
    }

    let data = response.data.ok_or_else(|| {
        DuneError::Protocol(format!("{}: response carried no data", O::OPERATION_NAME))
    })?;
    serde_json::from_value(data)
        .map_err(|e| DuneError::Protocol(format!("{}: {e}", O::OPERATION_NAME)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
