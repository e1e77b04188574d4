//! # dune-core
//!
//! Foundation types shared by the Dune client crates:
//!
//! - **Errors**: [`DuneError`] taxonomy via `thiserror`
//! - **Typed IDs**: [`QueryId`], [`UserId`], [`DatasetId`], [`JobId`]
//! - **Session**: [`Session`] with the bearer token, subject and user record
//! - **Records**: users, queries, jobs and query results as returned by the platform
//! - **Logging**: `tracing` subscriber setup and a log capture layer for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod records;
pub mod session;

pub use errors::{DuneError, Result};
pub use ids::{DatasetId, JobId, QueryId, UserId};
pub use records::{
    Group, JobRecord, JobStatus, Membership, QueryRecord, ResultMetadata, ResultRow, UserRecord,
    UserSummary, Visualization,
};
pub use session::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
