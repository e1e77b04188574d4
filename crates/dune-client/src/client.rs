//! The session orchestrator.
//!
//! [`DuneClient`] owns the [`Session`] and drives every protocol step as a
//! single awaited request, strictly in order. Steps that change the session
//! take `&mut self`.

use std::fmt;
use std::sync::Arc;

use dune_core::{
    DuneError, JobId, JobStatus, QueryId, QueryRecord, Result, Session, UserRecord,
};
use dune_settings::DuneSettings;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::graphql::{self, GraphqlOperation, GraphqlRequest};
use crate::http::ReqwestTransport;
use crate::operations::{
    ExecuteQuery, ExecuteQueryVariables, FindResultDataByJob, FindResultJob, FindSessionUser,
    JobVariables, QueryParameter, SubjectVariables, UpsertQuery, UpsertQueryVariables,
};
use crate::poll::PollPolicy;
use crate::rows::ResultRows;
use crate::transport::{AuthEndpoint, FormRequest, Transport};

#[derive(Deserialize)]
struct CsrfReply {
    csrf: String,
}

#[derive(Deserialize)]
struct SessionReply {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// Builder for [`DuneClient`].
#[derive(Default)]
pub struct DuneClientBuilder {
    settings: Option<DuneSettings>,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Credentials>,
    poll_policy: Option<PollPolicy>,
}

impl DuneClientBuilder {
    /// Use these settings instead of the compiled defaults.
    #[must_use]
    pub fn settings(mut self, settings: DuneSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Replace the HTTP transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Log in while building.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Override the poll policy derived from settings.
    #[must_use]
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = Some(policy);
        self
    }

    /// Build the client, authenticating first when credentials were given.
    pub async fn build(self) -> Result<DuneClient> {
        let settings = self.settings.unwrap_or_default();
        settings
            .validate()
            .map_err(|e| DuneError::Config(e.to_string()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&settings.endpoints, &settings.http)?),
        };
        let poll_policy = self
            .poll_policy
            .unwrap_or_else(|| PollPolicy::from(&settings.polling));

        let mut client = DuneClient {
            transport,
            session: Session::anonymous(),
            settings,
            poll_policy,
        };
        if let Some(credentials) = self.credentials {
            client.authenticate(&credentials).await?;
        }
        Ok(client)
    }
}

/// Client for one platform account.
///
/// Not shareable across tasks without the caller's own lock: every method
/// that touches the session borrows the client mutably.
pub struct DuneClient {
    transport: Arc<dyn Transport>,
    session: Session,
    settings: DuneSettings,
    poll_policy: PollPolicy,
}

impl fmt::Debug for DuneClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuneClient")
            .field("session", &self.session)
            .field("settings", &self.settings)
            .field("poll_policy", &self.poll_policy)
            .finish_non_exhaustive()
    }
}

impl DuneClient {
    /// Start configuring a client.
    pub fn builder() -> DuneClientBuilder {
        DuneClientBuilder::default()
    }

    /// An anonymous client with default settings over `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let settings = DuneSettings::default();
        Self {
            transport,
            session: Session::anonymous(),
            poll_policy: PollPolicy::from(&settings.polling),
            settings,
        }
    }

    /// Current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Settings in effect.
    pub fn settings(&self) -> &DuneSettings {
        &self.settings
    }

    /// Policy used by [`Self::wait_for_job`].
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    /// Replace the poll policy.
    pub fn set_poll_policy(&mut self, policy: PollPolicy) {
        self.poll_policy = policy;
    }

    // ── Authentication ──────────────────────────────────────────────────

    /// Log in with the CSRF-protected form, then refresh the session.
    ///
    /// The login endpoint answers with a redirect, which is not followed.
    /// Fails if the refresh that follows does not yield a bearer token.
    #[tracing::instrument(skip_all, fields(username = credentials.username()))]
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        if !credentials.is_complete() {
            return Err(DuneError::Config(
                "username and password must not be empty".to_string(),
            ));
        }

        let reply = self
            .transport
            .post_form(FormRequest::new(AuthEndpoint::Csrf))
            .await?;
        if !reply.is_success() {
            return Err(DuneError::Authentication(format!(
                "csrf request failed with HTTP {}",
                reply.status
            )));
        }
        let csrf: CsrfReply = reply.json()?;

        let endpoints = &self.settings.endpoints;
        let login = FormRequest::new(AuthEndpoint::Login)
            .field("csrf", csrf.csrf)
            .field("action", "login")
            .field("username", credentials.username())
            .field("password", credentials.password())
            .header("Origin", endpoints.origin.as_str())
            .header("Referer", endpoints.login_referer.as_str())
            .without_redirects();
        let reply = self.transport.post_form(login).await?;
        if !(reply.is_success() || reply.is_redirect()) {
            return Err(DuneError::Authentication(format!(
                "login rejected with HTTP {}",
                reply.status
            )));
        }

        self.refresh_session().await?;
        if !self.session.is_authenticated() {
            return Err(DuneError::Authentication(
                "login did not establish a session".to_string(),
            ));
        }
        info!(user_id = ?self.session.user_id(), "authenticated");
        Ok(())
    }

    /// Exchange the session cookie for a fresh bearer token and user record.
    ///
    /// A reply without a token leaves the session anonymous; that is not an
    /// error. When the user lookup fails, the previous session is kept.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_session(&mut self) -> Result<()> {
        let reply = self
            .transport
            .post_form(FormRequest::new(AuthEndpoint::Session))
            .await?;
        if !reply.is_success() {
            return Err(DuneError::Authentication(format!(
                "session request failed with HTTP {}",
                reply.status
            )));
        }
        let body: SessionReply = reply.json()?;

        let Some(token) = body.token.filter(|t| !t.is_empty()) else {
            debug!("session endpoint returned no token; session is anonymous");
            self.session.clear();
            return Ok(());
        };
        let sub = body.sub.filter(|s| !s.is_empty()).ok_or_else(|| {
            DuneError::Protocol("session response has a token but no subject".to_string())
        })?;

        let mut next = self.session.clone();
        next.set_token(token, sub);
        let user = self.lookup_user(&next).await?;
        next.set_user(user);
        self.session = next;
        debug!(user_id = ?self.session.user_id(), "session refreshed");
        Ok(())
    }

    /// The user behind the current session subject.
    pub async fn find_session_user(&self) -> Result<UserRecord> {
        self.lookup_user(&self.session).await
    }

    #[tracing::instrument(skip_all)]
    async fn lookup_user(&self, session: &Session) -> Result<UserRecord> {
        let sub = session.subject().ok_or_else(|| {
            DuneError::Authentication("session has no subject; authenticate first".to_string())
        })?;
        let variables = SubjectVariables {
            sub: sub.to_string(),
        };
        let data = self.run::<FindSessionUser>(session, &variables).await?;
        data.users.into_iter().next().ok_or_else(|| {
            DuneError::Authentication(format!("no user matches session subject {sub}"))
        })
    }

    // ── Query lifecycle ─────────────────────────────────────────────────

    /// Run `sql` and return its rows.
    ///
    /// Refreshes the session, upserts the scratch query, executes it, waits
    /// for the job and fetches the result, in that order.
    pub async fn query(&mut self, sql: &str) -> Result<ResultRows> {
        self.query_with_parameters(sql, std::iter::empty::<(String, String)>())
            .await
    }

    /// [`DuneClient::query`] with named text parameters.
    pub async fn query_with_parameters<I, K, V>(
        &mut self,
        sql: &str,
        parameters: I,
    ) -> Result<ResultRows>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let parameters: Vec<QueryParameter> = parameters
            .into_iter()
            .map(|(k, v)| QueryParameter::text(k, v))
            .collect();

        self.refresh_session().await?;
        let query = self.upsert_query(sql).await?;
        let job_id = self.execute_query(query.id, parameters).await?;
        let _attempts = self.wait_for_job(job_id).await?;
        self.find_result_data_by_job(job_id).await
    }

    /// Create or update the caller's temporary scratch query.
    ///
    /// The first upsert for a user creates the query; later upserts carry its
    /// id so the platform updates the same row.
    #[tracing::instrument(skip_all, fields(scratch_query = ?self.session.scratch_query()))]
    pub async fn upsert_query(&mut self, sql: &str) -> Result<QueryRecord> {
        let user_id = self.session.user_id().ok_or_else(|| {
            DuneError::Authentication("upserting a query needs a session user".to_string())
        })?;
        let variables = UpsertQueryVariables::scratch(
            user_id,
            self.session.scratch_query(),
            sql,
            &self.settings.query,
        );
        let data = self.run::<UpsertQuery>(&self.session, &variables).await?;
        let record = data.insert_queries_one;
        self.session.set_scratch_query(record.id);
        debug!(query_id = %record.id, "query upserted");
        Ok(record)
    }

    /// Submit a query for execution. Every parameter is sent as text.
    #[tracing::instrument(skip_all, fields(query_id = %query_id))]
    pub async fn execute_query(
        &self,
        query_id: QueryId,
        parameters: Vec<QueryParameter>,
    ) -> Result<JobId> {
        let variables = ExecuteQueryVariables {
            query_id,
            parameters,
        };
        let data = self.run::<ExecuteQuery>(&self.session, &variables).await?;
        let job_id = data.execute_query.job_id;
        info!(%job_id, "job submitted");
        Ok(job_id)
    }

    /// Active job records for `job_id` and its queue position.
    pub async fn find_result_job(&self, job_id: JobId) -> Result<JobStatus> {
        let data = self
            .run::<FindResultJob>(&self.session, &JobVariables { job_id })
            .await?;
        Ok(data.into())
    }

    /// Poll until the job leaves the active set. Returns the number of polls.
    ///
    /// The first poll is immediate; later polls follow the poll policy's
    /// interval. Fails with [`DuneError::Timeout`] once the policy runs out.
    #[tracing::instrument(skip_all, fields(job_id = %job_id))]
    pub async fn wait_for_job(&self, job_id: JobId) -> Result<u32> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            let status = self.find_result_job(job_id).await?;
            attempts = attempts.saturating_add(1);
            if status.is_finished() {
                info!(attempts, "job finished");
                return Ok(attempts);
            }
            debug!(
                attempts,
                queue_position = ?status.queue_position,
                "job still running"
            );

            let elapsed = started.elapsed();
            if !self.poll_policy.allows_another(attempts, elapsed) {
                warn!(attempts, ?elapsed, "gave up waiting for job");
                return Err(DuneError::Timeout {
                    job_id,
                    attempts,
                    elapsed,
                });
            }
            tokio::time::sleep(self.poll_policy.interval()).await;
        }
    }

    /// Fetch the result of a finished job.
    ///
    /// A result whose metadata carries an error fails with
    /// [`DuneError::RemoteExecution`].
    #[tracing::instrument(skip_all, fields(job_id = %job_id))]
    pub async fn find_result_data_by_job(&self, job_id: JobId) -> Result<ResultRows> {
        let data = self
            .run::<FindResultDataByJob>(&self.session, &JobVariables { job_id })
            .await?;

        if let Some(message) = data.query_results.iter().find_map(|m| m.failure()) {
            warn!(error = message, "remote execution failed");
            return Err(DuneError::RemoteExecution {
                job_id,
                message: message.to_string(),
            });
        }

        let rows = ResultRows::from_records(
            job_id,
            data.query_results,
            data.get_result_by_job_id.into_iter().map(|r| r.data),
        );
        debug!(rows = rows.len(), "result fetched");
        Ok(rows)
    }

    /// Execute operation `O` on behalf of `session`.
    async fn run<O: GraphqlOperation>(
        &self,
        session: &Session,
        variables: &O::Variables,
    ) -> Result<O::ResponseData> {
        if !session.is_authenticated() {
            return Err(DuneError::Authentication(format!(
                "{} needs a bearer token; authenticate first",
                O::OPERATION_NAME
            )));
        }
        let request = GraphqlRequest::new::<O>(variables)?;
        let response = self.transport.execute(session, &request).await?;
        graphql::decode::<O>(response)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
