//! Records returned by the platform's GraphQL API.
//!
//! Field names follow the wire format. Optional fields default so that a
//! response omitting them still decodes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{DatasetId, JobId, QueryId, UserId};

/// One row of query output, usually an object of column name to scalar.
pub type ResultRow = serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// The user behind an authenticated session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Platform user id.
    pub id: UserId,
    /// Account name.
    pub name: String,
    /// Avatar URL, if set.
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Group memberships.
    #[serde(default, deserialize_with = "null_as_default")]
    pub memberships: Vec<Membership>,
}

/// A user's membership in a group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    /// The group joined.
    pub group: Group,
}

/// A group and the permissions it grants its members.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group id.
    pub id: String,
    /// Group type, e.g. `team`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Permissions granted to members.
    #[serde(default, deserialize_with = "null_as_default")]
    pub permissions: Vec<String>,
}

/// Owner summary embedded in a query record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    /// Platform user id.
    pub id: UserId,
    /// Account name.
    pub name: String,
    /// Avatar URL, if set.
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

/// A saved (or scratch) query as stored by the platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Query id.
    pub id: QueryId,
    /// Dataset the query runs against.
    #[serde(default)]
    pub dataset_id: Option<DatasetId>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// SQL text.
    #[serde(default)]
    pub query: String,
    /// Scratch queries are temporary.
    #[serde(default)]
    pub is_temp: bool,
    /// Archived queries are hidden.
    #[serde(default)]
    pub is_archived: bool,
    /// Refresh schedule, if any.
    #[serde(default)]
    pub schedule: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Declared parameters, as stored.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// Owner.
    #[serde(default)]
    pub user: Option<UserSummary>,
    /// Attached visualizations.
    #[serde(default, deserialize_with = "null_as_default")]
    pub visualizations: Vec<Visualization>,
    /// Creation time.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A visualization attached to a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    /// Visualization id.
    pub id: i64,
    /// Visualization type, e.g. `table`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name.
    pub name: String,
    /// Renderer options.
    #[serde(default)]
    pub options: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────────────────

/// An execution job still known to the scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job id.
    pub id: JobId,
    /// Submitting user.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Worker lease expiry.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub locked_until: Option<DateTime<Utc>>,
    /// Submission time.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Scheduling category.
    #[serde(default)]
    pub category: Option<String>,
}

/// Snapshot of a job's progress: the active job records and, when queued,
/// the job's position in the execution queue.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobStatus {
    /// Active job records; empty once finished.
    pub jobs: Vec<JobRecord>,
    /// Position in the execution queue.
    pub queue_position: Option<i64>,
}

impl JobStatus {
    /// A job is finished once it no longer appears in the active set.
    pub fn is_finished(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata the platform keeps for each query result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Result id.
    pub id: String,
    /// Job that produced the result.
    pub job_id: JobId,
    /// Remote error text, if execution failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Execution time in seconds.
    #[serde(default)]
    pub runtime: Option<f64>,
    /// When the result was produced.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub generated_at: Option<DateTime<Utc>>,
    /// Column names in output order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: Vec<String>,
}

impl ResultMetadata {
    /// The remote error message, if the execution failed.
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.trim().is_empty())
    }
}

/// Decode `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept RFC 3339 timestamps and zone-less `timestamp` columns (read as
/// UTC). Anything else decodes to `None` rather than failing the response.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_record_decodes_memberships() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": 12,
            "name": "alice",
            "profile_image_url": null,
            "memberships": [
                {"group": {"id": "g-1", "type": "team", "permissions": ["read", "write"], "__typename": "groups"}}
            ],
            "__typename": "users"
        }))
        .unwrap();

        assert_eq!(user.id, UserId::new(12));
        assert_eq!(user.memberships.len(), 1);
        assert_eq!(user.memberships[0].group.kind, "team");
        assert_eq!(user.memberships[0].group.permissions, vec!["read", "write"]);
    }

    #[test]
    fn query_record_tolerates_missing_fields() {
        let record: QueryRecord = serde_json::from_value(json!({"id": 99})).unwrap();
        assert_eq!(record.id, QueryId::new(99));
        assert!(record.visualizations.is_empty());
        assert!(!record.is_temp);
    }

    #[test]
    fn result_metadata_failure_ignores_blank_error() {
        let mut meta: ResultMetadata = serde_json::from_value(json!({
            "id": "r-1",
            "job_id": "7d1d5a3e-7c55-4c1f-9a43-3f0b5b5f2a10",
            "error": "  ",
            "runtime": 3,
            "generated_at": "2021-05-10T12:00:00.123456+00:00",
            "columns": ["a"]
        }))
        .unwrap();
        assert!(meta.failure().is_none());
        assert!(meta.generated_at.is_some());

        meta.error = Some("division by zero".into());
        assert_eq!(meta.failure(), Some("division by zero"));
    }

    #[test]
    fn job_record_accepts_zone_less_timestamps() {
        let job: JobRecord = serde_json::from_value(json!({
            "id": "7d1d5a3e-7c55-4c1f-9a43-3f0b5b5f2a10",
            "user_id": 12,
            "locked_until": "2021-05-10T12:00:30.5",
            "created_at": "not a date",
            "category": "free"
        }))
        .unwrap();
        assert_eq!(
            job.locked_until.unwrap().to_rfc3339(),
            "2021-05-10T12:00:30.500+00:00"
        );
        assert!(job.created_at.is_none());
    }

    #[test]
    fn null_lists_decode_as_empty() {
        let meta: ResultMetadata = serde_json::from_value(json!({
            "id": "r-1",
            "job_id": "7d1d5a3e-7c55-4c1f-9a43-3f0b5b5f2a10",
            "error": "syntax error at or near \"SELEC\"",
            "runtime": null,
            "generated_at": null,
            "columns": null
        }))
        .unwrap();
        assert!(meta.columns.is_empty());
        assert_eq!(meta.failure(), Some("syntax error at or near \"SELEC\""));

        let user: UserRecord = serde_json::from_value(json!({
            "id": 12,
            "name": "alice",
            "memberships": [{"group": {"id": "g-1", "type": "team", "permissions": null}}]
        }))
        .unwrap();
        assert!(user.memberships[0].group.permissions.is_empty());

        let user: UserRecord =
            serde_json::from_value(json!({"id": 12, "name": "alice", "memberships": null})).unwrap();
        assert!(user.memberships.is_empty());

        let record: QueryRecord =
            serde_json::from_value(json!({"id": 99, "visualizations": null})).unwrap();
        assert!(record.visualizations.is_empty());
    }

    #[test]
    fn job_status_finished_when_empty() {
        assert!(JobStatus::default().is_finished());
    }
}
