//! Authentication state owned by a client.
//!
//! The session is a plain value: the orchestrator overwrites it on every
//! refresh and passes it by reference to each request it builds. Nothing in
//! the transport holds on to the bearer token between calls.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::ids::{QueryId, UserId};
use crate::records::UserRecord;

/// Bearer token, subject and user record for the current login.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<SecretString>,
    subject: Option<String>,
    user: Option<UserRecord>,
    scratch_query: Option<QueryId>,
}

impl Session {
    /// An unauthenticated session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether a non-empty bearer token is present.
    pub fn is_authenticated(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// `Authorization` header value, when authenticated.
    pub fn authorization(&self) -> Option<String> {
        if !self.is_authenticated() {
            return None;
        }
        self.token
            .as_ref()
            .map(|t| format!("Bearer {}", t.expose_secret()))
    }

    /// Subject id the session endpoint reported for this login.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The authenticated user, once looked up.
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// Id of the authenticated user, once looked up.
    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Scratch query last upserted for this user.
    pub fn scratch_query(&self) -> Option<QueryId> {
        self.scratch_query
    }

    /// Install a fresh token and subject. The user record is kept only until
    /// [`Session::set_user`] replaces it.
    pub fn set_token(&mut self, token: impl Into<String>, subject: impl Into<String>) {
        self.token = Some(SecretString::from(token.into()));
        self.subject = Some(subject.into());
    }

    /// Record the user behind the token. Switching to a different user drops
    /// the previous user's scratch query.
    pub fn set_user(&mut self, user: UserRecord) {
        if self.user_id() != Some(user.id) {
            self.scratch_query = None;
        }
        self.user = Some(user);
    }

    /// Remember the scratch query so the next upsert updates it in place.
    pub fn set_scratch_query(&mut self, id: QueryId) {
        self.scratch_query = Some(id);
    }

    /// Drop all credentials and return to the anonymous state.
    pub fn clear(&mut self) {
        *self = Self::anonymous();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("subject", &self.subject)
            .field("user_id", &self.user_id())
            .field("scratch_query", &self.scratch_query)
            .finish()
    }
}
