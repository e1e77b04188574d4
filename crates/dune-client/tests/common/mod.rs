//! Shared scripting helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use dune_client::mock::{MockReply, MockTransport};
use dune_client::operations::{
    ExecuteQuery, FindResultDataByJob, FindResultJob, FindSessionUser, UpsertQuery,
};
use dune_client::{AuthEndpoint, DuneClient, JobId, PollPolicy};
use serde_json::{Value, json};

pub const SUB: &str = "4b8e0b36-8a6e-4d53-9c1a-1c2f0e0f4a11";
pub const JOB: &str = "7d1d5a3e-7c55-4c1f-9a43-3f0b5b5f2a10";
pub const TOKEN: &str = "tok-integration";
pub const USER_ID: i64 = 12;
pub const QUERY_ID: i64 = 501;

pub fn job_id() -> JobId {
    JOB.parse().expect("valid job id")
}

pub fn user() -> Value {
    json!({
        "id": USER_ID,
        "name": "alice",
        "profile_image_url": null,
        "memberships": [{"group": {"id": "g-1", "type": "team", "permissions": ["read"]}}]
    })
}

/// Script csrf, login (302) and a session that resolves to [`user`].
pub fn script_auth(mock: &MockTransport) {
    mock.script_auth(AuthEndpoint::Csrf, MockReply::json(&json!({"csrf": "csrf-1"})));
    mock.script_auth(AuthEndpoint::Login, MockReply::redirect("/"));
    mock.script_auth(
        AuthEndpoint::Session,
        MockReply::json(&json!({"token": TOKEN, "sub": SUB})),
    );
    mock.script_operation::<FindSessionUser>(MockReply::data(json!({ "users": [user()] })));
}

/// Script upsert, execute, `running_polls` active polls, then an empty job list.
pub fn script_query(mock: &MockTransport, running_polls: usize, rows: &Value) {
    mock.script_operation::<UpsertQuery>(MockReply::data(json!({
        "insert_queries_one": {"id": QUERY_ID, "query": "SELECT 1", "is_temp": true}
    })));
    mock.script_operation::<ExecuteQuery>(MockReply::data(
        json!({"execute_query": {"job_id": JOB}}),
    ));
    for _ in 0..running_polls {
        mock.script_operation::<FindResultJob>(MockReply::data(json!({
            "jobs": [{"id": JOB, "user_id": USER_ID, "category": "free"}],
            "view_queue_positions": [{"pos": 1}]
        })));
    }
    mock.script_operation::<FindResultJob>(MockReply::data(
        json!({"jobs": [], "view_queue_positions": []}),
    ));
    mock.script_operation::<FindResultDataByJob>(MockReply::data(json!({
        "query_results": [{
            "id": "r-1", "job_id": JOB, "error": null, "runtime": 1,
            "generated_at": "2021-05-10T12:00:00+00:00", "columns": ["a"]
        }],
        "get_result_by_job_id": [{"data": rows}]
    })));
}

/// A mock-backed client, already logged in, polling every 10ms.
pub async fn logged_in_client() -> (Arc<MockTransport>, DuneClient) {
    let mock = Arc::new(MockTransport::new());
    script_auth(&mock);
    let client = DuneClient::builder()
        .transport(mock.clone())
        .credentials(dune_client::Credentials::new("alice", "hunter2"))
        .poll_policy(PollPolicy::fixed(std::time::Duration::from_millis(10)))
        .build()
        .await
        .expect("login succeeds");
    (mock, client)
}
