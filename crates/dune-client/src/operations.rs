//! The five GraphQL operations the client issues.
//!
//! Documents are static text. Their variable declarations are checked against
//! the serialized variable structs in the tests below.

use dune_core::records::null_as_default;
use dune_core::{
    DatasetId, JobId, JobRecord, JobStatus, QueryId, QueryRecord, ResultMetadata, UserId,
    UserRecord,
};
use dune_settings::QuerySettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graphql::GraphqlOperation;

// ─────────────────────────────────────────────────────────────────────────────
// FindSessionUser
// ─────────────────────────────────────────────────────────────────────────────

/// Look up the user behind a session subject.
pub struct FindSessionUser;

/// Variables for [`FindSessionUser`].
#[derive(Clone, Debug, Serialize)]
pub struct SubjectVariables {
    /// Session subject.
    pub sub: String,
}

/// Response of [`FindSessionUser`].
#[derive(Clone, Debug, Deserialize)]
pub struct SessionUsers {
    /// Users matching the subject.
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<UserRecord>,
}

impl GraphqlOperation for FindSessionUser {
    type Variables = SubjectVariables;
    type ResponseData = SessionUsers;

    const OPERATION_NAME: &'static str = "FindSessionUser";
    const QUERY: &'static str = r"
query FindSessionUser($sub: uuid!) {
  users(where: {private_info: {cognito_id: {_eq: $sub}}}) {
    ...SessionUser
    __typename
  }
}

fragment SessionUser on users {
  id
  name
  profile_image_url
  memberships {
    group {
      ...Group
      __typename
    }
    __typename
  }
  __typename
}

fragment Group on groups {
  id
  type
  permissions
  __typename
}
";
}

// ─────────────────────────────────────────────────────────────────────────────
// UpsertQuery
// ─────────────────────────────────────────────────────────────────────────────

/// Create or update the caller's scratch query.
pub struct UpsertQuery;

/// Columns the platform updates when an upserted query already exists.
pub const QUERY_UPDATE_COLUMNS: &[&str] = &[
    "dataset_id",
    "name",
    "description",
    "query",
    "schedule",
    "is_archived",
    "is_temp",
    "tags",
    "parameters",
];

/// Columns updated when a visualization already exists.
pub const VISUALIZATION_UPDATE_COLUMNS: &[&str] = &["name", "options"];

/// Hasura `on_conflict` clause.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OnConflict {
    /// Unique constraint to upsert on.
    pub constraint: &'static str,
    /// Columns overwritten on conflict.
    pub update_columns: &'static [&'static str],
}

impl OnConflict {
    /// Upsert keyed on the query primary key.
    pub fn queries() -> Self {
        Self {
            constraint: "queries_pkey",
            update_columns: QUERY_UPDATE_COLUMNS,
        }
    }

    /// Upsert keyed on the visualization primary key.
    pub fn visualizations() -> Self {
        Self {
            constraint: "visualizations_pkey",
            update_columns: VISUALIZATION_UPDATE_COLUMNS,
        }
    }
}

/// Row inserted into `visualizations`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisualizationInsert {
    /// Visualization type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name.
    pub name: String,
    /// Renderer options.
    pub options: Value,
}

/// Nested visualization insert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VisualizationsInsert {
    /// Visualizations to insert.
    pub data: Vec<VisualizationInsert>,
    /// Upsert rule for existing visualizations.
    pub on_conflict: OnConflict,
}

/// Row inserted into `queries`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryInsert {
    /// Set when updating a known query so the conflict key matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<QueryId>,
    /// Refresh schedule; scratch queries have none.
    pub schedule: Option<String>,
    /// Dataset to run against.
    pub dataset_id: DatasetId,
    /// Display name.
    pub name: String,
    /// SQL text.
    pub query: String,
    /// Owner.
    pub user_id: UserId,
    /// Free-form description.
    pub description: String,
    /// Always false for scratch queries.
    pub is_archived: bool,
    /// Always true for scratch queries.
    pub is_temp: bool,
    /// Declared parameters.
    pub parameters: Vec<Value>,
    /// Attached visualizations.
    pub visualizations: VisualizationsInsert,
}

/// Variables for [`UpsertQuery`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpsertQueryVariables {
    /// Include 24h favorite counts in the reply.
    pub favs_last_24h: bool,
    /// Include 7d favorite counts in the reply.
    pub favs_last_7d: bool,
    /// Include 30d favorite counts in the reply.
    pub favs_last_30d: bool,
    /// Include all-time favorite counts in the reply.
    pub favs_all_time: bool,
    /// The query row to insert or update.
    pub object: QueryInsert,
    /// Upsert rule for the query row.
    pub on_conflict: OnConflict,
    /// Signed-in user id.
    pub session_id: UserId,
}

impl UpsertQueryVariables {
    /// A temporary query owned by `user` with a single results table.
    ///
    /// Passing the id of the user's previous scratch query turns the insert
    /// into an update of that row.
    pub fn scratch(
        user: UserId,
        existing: Option<QueryId>,
        sql: &str,
        settings: &QuerySettings,
    ) -> Self {
        Self {
            favs_last_24h: false,
            favs_last_7d: false,
            favs_last_30d: false,
            favs_all_time: false,
            object: QueryInsert {
                id: existing,
                schedule: None,
                dataset_id: DatasetId::new(settings.dataset_id),
                name: settings.name.clone(),
                query: sql.to_owned(),
                user_id: user,
                description: settings.description.clone(),
                is_archived: false,
                is_temp: true,
                parameters: Vec::new(),
                visualizations: VisualizationsInsert {
                    data: vec![VisualizationInsert {
                        kind: "table".to_string(),
                        name: "Query results".to_string(),
                        options: Value::Object(serde_json::Map::new()),
                    }],
                    on_conflict: OnConflict::visualizations(),
                },
            },
            on_conflict: OnConflict::queries(),
            session_id: user,
        }
    }
}

/// Response of [`UpsertQuery`].
#[derive(Clone, Debug, Deserialize)]
pub struct UpsertedQuery {
    /// The stored query.
    pub insert_queries_one: QueryRecord,
}

impl GraphqlOperation for UpsertQuery {
    type Variables = UpsertQueryVariables;
    type ResponseData = UpsertedQuery;

    const OPERATION_NAME: &'static str = "UpsertQuery";
    const QUERY: &'static str = r"
mutation UpsertQuery($session_id: Int!, $object: queries_insert_input!, $on_conflict: queries_on_conflict!, $favs_last_24h: Boolean! = false, $favs_last_7d: Boolean! = false, $favs_last_30d: Boolean! = false, $favs_all_time: Boolean! = true) {
  insert_queries_one(object: $object, on_conflict: $on_conflict) {
    ...Query
    favorite_queries(where: {user_id: {_eq: $session_id}}, limit: 1) {
      created_at
      __typename
    }
    __typename
  }
}

fragment Query on queries {
  id
  dataset_id
  name
  description
  query
  private_to_group_id
  is_temp
  is_archived
  created_at
  updated_at
  schedule
  tags
  parameters
  user {
    ...User
    __typename
  }
  visualizations {
    id
    type
    name
    options
    created_at
    __typename
  }
  favorite_queries_aggregate @include(if: $favs_all_time) {
    aggregate {
      count
      __typename
    }
    __typename
  }
  query_favorite_count_last_24h @include(if: $favs_last_24h) {
    favorite_count
    __typename
  }
  query_favorite_count_last_7d @include(if: $favs_last_7d) {
    favorite_count
    __typename
  }
  query_favorite_count_last_30d @include(if: $favs_last_30d) {
    favorite_count
    __typename
  }
  __typename
}

fragment User on users {
  id
  name
  profile_image_url
  __typename
}
";
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecuteQuery
// ─────────────────────────────────────────────────────────────────────────────

/// Submit a saved query for execution.
pub struct ExecuteQuery;

/// A named query parameter. The platform receives every value as text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueryParameter {
    /// Parameter name.
    pub key: String,
    /// Parameter type tag.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Parameter value.
    pub value: String,
}

impl QueryParameter {
    /// A text parameter.
    pub fn text(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: "text",
            value: value.into(),
        }
    }
}

/// Variables for [`ExecuteQuery`].
#[derive(Clone, Debug, Serialize)]
pub struct ExecuteQueryVariables {
    /// Query to run.
    pub query_id: QueryId,
    /// Parameter values.
    pub parameters: Vec<QueryParameter>,
}

/// Job handle returned by `execute_query`.
#[derive(Clone, Debug, Deserialize)]
pub struct SubmittedJob {
    /// Id of the submitted job.
    pub job_id: JobId,
}

/// Response of [`ExecuteQuery`].
#[derive(Clone, Debug, Deserialize)]
pub struct ExecutedQuery {
    /// The submitted job.
    pub execute_query: SubmittedJob,
}

impl GraphqlOperation for ExecuteQuery {
    type Variables = ExecuteQueryVariables;
    type ResponseData = ExecutedQuery;

    const OPERATION_NAME: &'static str = "ExecuteQuery";
    const QUERY: &'static str = r"
mutation ExecuteQuery($query_id: Int!, $parameters: [Parameter!]!) {
  execute_query(query_id: $query_id, parameters: $parameters) {
    job_id
    __typename
  }
}
";
}

// ─────────────────────────────────────────────────────────────────────────────
// FindResultJob / FindResultDataByJob
// ─────────────────────────────────────────────────────────────────────────────

/// Variables for the job lookups.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct JobVariables {
    /// Job to look up.
    pub job_id: JobId,
}

/// List the active job records for a job id, plus its queue position.
pub struct FindResultJob;

/// Row of `view_queue_positions`.
#[derive(Clone, Debug, Deserialize)]
pub struct QueuePosition {
    /// Position in the execution queue.
    pub pos: i64,
}

/// Response of [`FindResultJob`].
#[derive(Clone, Debug, Deserialize)]
pub struct ResultJobs {
    /// Active jobs with the requested id.
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs: Vec<JobRecord>,
    /// Queue position of the job, when queued.
    #[serde(default, deserialize_with = "null_as_default")]
    pub view_queue_positions: Vec<QueuePosition>,
}

impl From<ResultJobs> for JobStatus {
    fn from(data: ResultJobs) -> Self {
        Self {
            queue_position: data.view_queue_positions.first().map(|p| p.pos),
            jobs: data.jobs,
        }
    }
}

impl GraphqlOperation for FindResultJob {
    type Variables = JobVariables;
    type ResponseData = ResultJobs;

    const OPERATION_NAME: &'static str = "FindResultJob";
    const QUERY: &'static str = r"
query FindResultJob($job_id: uuid) {
  jobs(where: {id: {_eq: $job_id}}) {
    id
    user_id
    locked_until
    created_at
    category
    __typename
  }
  view_queue_positions(where: {id: {_eq: $job_id}}) {
    pos
    __typename
  }
}
";
}

/// Fetch result metadata and row data for a finished job.
pub struct FindResultDataByJob;

/// Row of `get_result_by_job_id`.
#[derive(Clone, Debug, Deserialize)]
pub struct ResultData {
    /// Row payload.
    #[serde(default)]
    pub data: Value,
}

/// Response of [`FindResultDataByJob`].
#[derive(Clone, Debug, Deserialize)]
pub struct JobResults {
    /// Result metadata.
    #[serde(default, deserialize_with = "null_as_default")]
    pub query_results: Vec<ResultMetadata>,
    /// Result rows.
    #[serde(default, deserialize_with = "null_as_default")]
    pub get_result_by_job_id: Vec<ResultData>,
}

impl GraphqlOperation for FindResultDataByJob {
    type Variables = JobVariables;
    type ResponseData = JobResults;

    const OPERATION_NAME: &'static str = "FindResultDataByJob";
    const QUERY: &'static str = r"
query FindResultDataByJob($job_id: uuid!) {
  query_results(where: {job_id: {_eq: $job_id}}) {
    id
    job_id
    error
    runtime
    generated_at
    columns
    __typename
  }
  get_result_by_job_id(args: {want_job_id: $job_id}) {
    data
    __typename
  }
}
";
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
