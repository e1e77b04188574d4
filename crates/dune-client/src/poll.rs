//! How long [`DuneClient::wait_for_job`](crate::DuneClient::wait_for_job) keeps polling.

use std::time::Duration;

use dune_settings::PollSettings;

/// Fixed-interval poll schedule with optional attempt and time limits.
///
/// The default polls every second with no limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    max_attempts: Option<u32>,
    deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl PollPolicy {
    /// Poll every `interval` until the job finishes.
    pub const fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            deadline: None,
        }
    }

    /// Give up after `attempts` polls.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Give up once `deadline` has passed since the first poll.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Pause between polls.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll limit, if any.
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Overall time limit, if any.
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Whether another poll may follow `attempts` unfinished polls that took
    /// `elapsed` so far. A poll that would start past the deadline is refused.
    pub fn allows_another(&self, attempts: u32, elapsed: Duration) -> bool {
        if self.max_attempts.is_some_and(|max| attempts >= max) {
            return false;
        }
        match self.deadline {
            Some(deadline) => elapsed.saturating_add(self.interval) <= deadline,
            None => true,
        }
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(settings: &PollSettings) -> Self {
        let mut policy = Self::fixed(Duration::from_millis(settings.interval_ms));
        if let Some(attempts) = settings.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(ms) = settings.deadline_ms {
            policy = policy.with_deadline(Duration::from_millis(ms));
        }
        policy
    }
}
