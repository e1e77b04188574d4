//! Login credentials.

use std::fmt;

use dune_core::{DuneError, Result};
use secrecy::{ExposeSecret, SecretString};

/// Env var holding the account username.
pub const USERNAME_ENV: &str = "DUNE_USERNAME";
/// Env var holding the account password.
pub const PASSWORD_ENV: &str = "DUNE_PASSWORD";

/// Username and password for the platform's login form.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Credentials from explicit values.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Read `DUNE_USERNAME` and `DUNE_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an explicit environment lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DuneError::Config(format!("{key} is not set")))
        };
        Ok(Self::new(read(USERNAME_ENV)?, read(PASSWORD_ENV)?))
    }

    /// Account name.
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Both parts are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn debug_redacts_password() {
        let creds = Credentials::new("alice", "hunter2");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
        assert_eq!(creds.password(), "hunter2");
    }

    #[test]
    fn from_lookup_reads_both_vars() {
        let creds = Credentials::from_lookup(|key| match key {
            USERNAME_ENV => Some("alice".into()),
            PASSWORD_ENV => Some("pw".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.username(), "alice");
        assert!(creds.is_complete());
    }

    #[test]
    fn from_lookup_requires_password() {
        let result = Credentials::from_lookup(|key| (key == USERNAME_ENV).then(|| "alice".into()));
        assert_matches!(result, Err(DuneError::Config(m)) if m.contains(PASSWORD_ENV));
    }

    #[test]
    fn empty_parts_are_incomplete() {
        assert!(!Credentials::new("", "pw").is_complete());
        assert!(!Credentials::new("alice", "").is_complete());
    }
}
