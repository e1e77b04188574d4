//! Scripted [`Transport`] for deterministic tests without network access.
//!
//! Replies are queued per target: an auth endpoint name (`csrf`, `login`,
//! `session`) or a GraphQL operation name. Each call pops the next reply; the
//! last reply in a queue is sticky and answers every further call. Every call
//! is recorded in order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dune_core::{DuneError, Result, Session};
use parking_lot::Mutex;
use serde_json::Value;

use crate::graphql::{GraphqlError, GraphqlOperation, GraphqlRequest, GraphqlResponse};
use crate::transport::{AuthEndpoint, FormRequest, HttpReply, Transport};

type Responder = Arc<dyn Fn(&RecordedCall) -> MockReply + Send + Sync>;

/// A pre-programmed answer.
#[derive(Clone)]
pub enum MockReply {
    /// Raw auth subsystem reply.
    Http(HttpReply),
    /// GraphQL response envelope.
    Graphql(GraphqlResponse<Value>),
    /// Fail the call.
    Error(DuneError),
    /// Compute the reply from the recorded call.
    Respond(Responder),
}

impl MockReply {
    /// HTTP 200 with a JSON body.
    pub fn json(body: &Value) -> Self {
        Self::Http(HttpReply::new(200, body.to_string()))
    }

    /// A bare HTTP status with a text body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Http(HttpReply::new(status, body))
    }

    /// HTTP 302 to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Http(HttpReply {
            status: 302,
            body: String::new(),
            location: Some(location.into()),
        })
    }

    /// GraphQL `data`.
    pub fn data(data: Value) -> Self {
        Self::Graphql(GraphqlResponse::from_data(data))
    }

    /// GraphQL `errors` without data.
    pub fn graphql_errors(errors: Vec<GraphqlError>) -> Self {
        Self::Graphql(GraphqlResponse::from_errors(errors))
    }

    /// Compute the reply per call.
    pub fn respond<F>(f: F) -> Self
    where
        F: Fn(&RecordedCall) -> MockReply + Send + Sync + 'static,
    {
        Self::Respond(Arc::new(f))
    }
}

/// One call as seen by the mock.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    /// Auth endpoint name or GraphQL operation name.
    pub target: String,
    /// Form fields of an auth call.
    pub form: Vec<(String, String)>,
    /// Extra headers of an auth call.
    pub headers: Vec<(String, String)>,
    /// Whether an auth call asked for redirects to be followed.
    pub follow_redirects: bool,
    /// Variables of a GraphQL call.
    pub variables: Value,
    /// `Authorization` header the session would send.
    pub bearer: Option<String>,
}

impl RecordedCall {
    /// A form field value.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// A header value (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Transport that answers from per-target scripts.
#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
/// An empty mock with nothing scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `target`.
    pub fn script(&self, target: &str, reply: MockReply) {
        self.scripts
            .lock()
            .entry(target.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Drop everything still queued for `target`.
    pub fn reset(&self, target: &str) {
        let _ = self.scripts.lock().remove(target);
    }

    /// Queue a reply for an auth endpoint.
    pub fn script_auth(&self, endpoint: AuthEndpoint, reply: MockReply) {
        self.script(endpoint.name(), reply);
    }

    /// Queue a reply for operation `O`.
    pub fn script_operation<O: GraphqlOperation>(&self, reply: MockReply) {
        self.script(O::OPERATION_NAME, reply);
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Targets of every call so far, oldest first.
    pub fn targets(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.target.clone()).collect()
    }

    /// Number of calls to `target`.
    pub fn count(&self, target: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.target == target)
            .count()
    }

    /// Calls to `target`, oldest first.
    pub fn calls_to(&self, target: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.target == target)
            .cloned()
            .collect()
    }

    fn answer(&self, call: RecordedCall) -> Result<MockReply> {
        let next = {
            let mut scripts = self.scripts.lock();
            scripts.get_mut(&call.target).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        self.calls.lock().push(call.clone());

        match next {
            Some(MockReply::Respond(f)) => Ok(f(&call)),
            Some(reply) => Ok(reply),
            None => Err(DuneError::Protocol(format!(
                "MockTransport: no reply scripted for {}",
                call.target
            ))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpReply> {
        let call = RecordedCall {
            target: request.endpoint.name().to_string(),
            form: request.fields,
            headers: request.headers,
            follow_redirects: request.follow_redirects,
            variables: Value::Null,
            bearer: None,
        };
        let target = call.target.clone();
        match self.answer(call)? {
            MockReply::Http(reply) => Ok(reply),
            MockReply::Error(e) => Err(e),
            _ => Err(DuneError::Protocol(format!(
                "MockTransport: {target} needs an HTTP reply"
            ))),
        }
    }

    async fn execute(
        &self,
        session: &Session,
        request: &GraphqlRequest,
    ) -> Result<GraphqlResponse<Value>> {
        let call = RecordedCall {
            target: request.operation_name.to_string(),
            form: Vec::new(),
            headers: Vec::new(),
            follow_redirects: true,
            variables: request.variables.clone(),
            bearer: session.authorization(),
        };
        match self.answer(call)? {
            MockReply::Graphql(response) => Ok(response),
            MockReply::Error(e) => Err(e),
            _ => Err(DuneError::Protocol(format!(
                "MockTransport: {} needs a GraphQL reply",
                request.operation_name
            ))),
        }
    }
}
