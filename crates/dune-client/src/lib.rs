//! # dune-client
//!
//! Async client for the Dune Analytics platform.
//!
//! [`DuneClient`] logs in through the cookie-based auth endpoints, exchanges
//! the session for a bearer token, upserts a scratch query, executes it,
//! polls the job until it leaves the active set and hands back the result as
//! a single-pass [`ResultRows`] iterator.
//!
//! The network sits behind the [`Transport`] trait: [`ReqwestTransport`] for
//! real use, [`mock::MockTransport`] for tests.

#![deny(unsafe_code)]

pub mod client;
pub mod credentials;
pub mod graphql;
pub mod http;
pub mod mock;
pub mod operations;
pub mod poll;
pub mod rows;
pub mod transport;

pub use client::{DuneClient, DuneClientBuilder};
pub use credentials::Credentials;
pub use graphql::{GraphqlError, GraphqlOperation, GraphqlRequest, GraphqlResponse};
pub use http::ReqwestTransport;
pub use operations::QueryParameter;
pub use poll::PollPolicy;
pub use rows::ResultRows;
pub use transport::{AuthEndpoint, FormRequest, HttpReply, Transport};

pub use dune_core::{DuneError, JobId, JobStatus, QueryId, Result, Session};
pub use dune_settings::DuneSettings;
