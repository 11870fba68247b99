//! Per-host provisioning session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// State machine positions for one host's remote-boot sequence.
///
/// Ordered: later variants are further along, which lets the session
/// track its high-water mark across retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    MediaEjected,
    MediaInserted,
    BootConfigured,
    PoweredOn,
    Installing,
    Verifying,
    Succeeded,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::MediaEjected => "MediaEjected",
            SessionState::MediaInserted => "MediaInserted",
            SessionState::BootConfigured => "BootConfigured",
            SessionState::PoweredOn => "PoweredOn",
            SessionState::Installing => "Installing",
            SessionState::Verifying => "Verifying",
            SessionState::Succeeded => "Succeeded",
            SessionState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One host's provisioning attempt, from first eject to terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningSession {
    pub id: Uuid,
    pub hostname: String,
    pub state: SessionState,
    /// Furthest non-terminal state reached across all attempts
    pub high_water: SessionState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningSession {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            hostname: hostname.into(),
            state: SessionState::Idle,
            high_water: SessionState::Idle,
            attempts: 0,
            last_error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to a new (non-terminal) state.
    pub fn advance(&mut self, state: SessionState) {
        debug!(host = %self.hostname, from = %self.state, to = %state, "session transition");
        self.state = state;
        if state > self.high_water && !state.is_terminal() {
            self.high_water = state;
        }
    }

    pub fn succeed(&mut self) {
        self.state = SessionState::Succeeded;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = SessionState::Failed;
        self.last_error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn is_succeeded(&self) -> bool {
        self.state == SessionState::Succeeded
    }

    /// Whether the boot sequence got as far as handing off to the
    /// installer (regardless of final verification outcome).
    pub fn reached_install(&self) -> bool {
        self.high_water >= SessionState::Installing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering() {
        assert!(SessionState::MediaEjected < SessionState::MediaInserted);
        assert!(SessionState::Installing < SessionState::Verifying);
        assert!(!SessionState::Installing.is_terminal());
        assert!(SessionState::Succeeded.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = ProvisioningSession::new("esxi01");
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.completed_at.is_none());

        session.advance(SessionState::MediaEjected);
        session.advance(SessionState::MediaInserted);
        session.fail("transport error: timeout");

        assert_eq!(session.state, SessionState::Failed);
        assert!(session.completed_at.is_some());
        assert_eq!(
            session.last_error.as_deref(),
            Some("transport error: timeout")
        );
    }

    #[test]
    fn test_high_water_survives_retry_reset() {
        let mut session = ProvisioningSession::new("esxi01");
        session.advance(SessionState::MediaEjected);
        session.advance(SessionState::MediaInserted);
        session.advance(SessionState::BootConfigured);
        session.advance(SessionState::PoweredOn);
        session.advance(SessionState::Installing);
        // Retry restarts the whole sequence
        session.advance(SessionState::Idle);
        session.advance(SessionState::MediaEjected);
        session.fail("gave up");

        assert!(session.reached_install());
        assert_eq!(session.high_water, SessionState::Installing);
    }

    #[test]
    fn test_succeed_sets_completed() {
        let mut session = ProvisioningSession::new("esxi01");
        session.succeed();
        assert!(session.is_succeeded());
        assert!(session.completed_at.is_some());
    }
}
