//! Session state types and the shared status handle.
//!
//! The handle is the one place presentation layers read session state from;
//! every snapshot comes out of a single lock acquisition, so duration and
//! transcript length are never observed half-updated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Lifecycle phase of the (single) meeting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Finalizing,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub meeting_id: Option<String>,
    pub title: Option<String>,
    pub participants: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// Advisory live transcript from streaming STT. Never part of the
    /// persisted record.
    pub live_transcript: String,
    pub limit_reached: bool,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            meeting_id: None,
            title: None,
            participants: Vec::new(),
            started_at: None,
            live_transcript: String::new(),
            limit_reached: false,
            last_error: None,
        }
    }
}

impl SessionState {
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Consistent snapshot returned to presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingStatus {
    pub active: bool,
    pub phase: SessionPhase,
    pub meeting_id: Option<String>,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub transcript_length: usize,
    pub participants: Vec<String>,
    pub limit_reached: bool,
    pub last_error: Option<String>,
}

/// Thread-safe handle shared between the orchestrator, its background tasks
/// and the presentation layers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionState>>,
    limit_notify: Arc<Notify>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn snapshot(&self) -> MeetingStatus {
        let state = self.inner.lock().await;
        MeetingStatus {
            active: state.phase == SessionPhase::Recording,
            phase: state.phase,
            meeting_id: state.meeting_id.clone(),
            title: state.title.clone(),
            duration_seconds: state.duration_seconds(),
            transcript_length: state.live_transcript.chars().count(),
            participants: state.participants.clone(),
            limit_reached: state.limit_reached,
            last_error: state.last_error.clone(),
        }
    }

    pub async fn begin_recording(
        &self,
        meeting_id: String,
        title: String,
        participants: Vec<String>,
        started_at: DateTime<Utc>,
    ) {
        let mut state = self.inner.lock().await;
        *state = SessionState {
            phase: SessionPhase::Recording,
            meeting_id: Some(meeting_id),
            title: Some(title),
            participants,
            started_at: Some(started_at),
            ..Default::default()
        };
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        let mut state = self.inner.lock().await;
        state.phase = phase;
    }

    pub async fn append_partial(&self, text: &str) {
        let mut state = self.inner.lock().await;
        if !state.live_transcript.is_empty() {
            state.live_transcript.push(' ');
        }
        state.live_transcript.push_str(text);
    }

    pub async fn mark_limit_reached(&self) {
        {
            let mut state = self.inner.lock().await;
            state.limit_reached = true;
        }
        self.limit_notify.notify_waiters();
    }

    /// Resolves when the max-duration deadline fires. Returns immediately if
    /// it already has.
    pub async fn limit_reached(&self) {
        loop {
            let notified = self.limit_notify.notified();
            if self.inner.lock().await.limit_reached {
                return;
            }
            notified.await;
        }
    }

    /// Return to Idle, keeping only the error (if any) for inspection.
    pub async fn reset_to_idle(&self, error: Option<String>) {
        let mut state = self.inner.lock().await;
        *state = SessionState {
            last_error: error,
            ..Default::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_phase_as_str() {
        assert_eq!(SessionPhase::Idle.as_str(), "idle");
        assert_eq!(SessionPhase::Recording.as_str(), "recording");
        assert_eq!(SessionPhase::Finalizing.as_str(), "finalizing");
    }

    #[tokio::test]
    async fn test_begin_recording_populates_snapshot() {
        let handle = SessionStatusHandle::default();
        handle
            .begin_recording(
                "meeting-1".to_string(),
                "Standup".to_string(),
                vec!["Alice".to_string(), "Bob".to_string()],
                Utc::now(),
            )
            .await;

        let status = handle.snapshot().await;
        assert!(status.active);
        assert_eq!(status.meeting_id.as_deref(), Some("meeting-1"));
        assert_eq!(status.title.as_deref(), Some("Standup"));
        assert_eq!(status.participants, vec!["Alice", "Bob"]);
        assert_eq!(status.transcript_length, 0);
    }

    #[tokio::test]
    async fn test_append_partial_grows_transcript() {
        let handle = SessionStatusHandle::default();
        handle
            .begin_recording("m".to_string(), "t".to_string(), vec![], Utc::now())
            .await;

        handle.append_partial("hello").await;
        handle.append_partial("world").await;

        let state = handle.get().await;
        assert_eq!(state.live_transcript, "hello world");
    }

    #[tokio::test]
    async fn test_reset_clears_session_but_keeps_error() {
        let handle = SessionStatusHandle::default();
        handle
            .begin_recording("m".to_string(), "t".to_string(), vec![], Utc::now())
            .await;
        handle.reset_to_idle(Some("boom".to_string())).await;

        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Idle);
        assert!(state.meeting_id.is_none());
        assert!(state.live_transcript.is_empty());
        assert_eq!(state.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_limit_notification_wakes_waiter() {
        let handle = SessionStatusHandle::default();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.limit_reached().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        handle.mark_limit_reached().await;
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_limit_already_reached_returns_immediately() {
        let handle = SessionStatusHandle::default();
        handle.mark_limit_reached().await;
        tokio::time::timeout(Duration::from_millis(100), handle.limit_reached())
            .await
            .expect("should not block");
    }
}
