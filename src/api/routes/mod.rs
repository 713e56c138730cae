pub mod devices;
pub mod engines;
pub mod meetings;
pub mod process;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::meeting::{MeetingSessionOrchestrator, SessionStatusHandle};
use crate::persist::PersistenceLayer;

/// Shared state handed to every route.
///
/// Status reads go through the status handle and never contend with the
/// orchestrator lock; everything that mutates the session or the engines
/// takes the lock.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Mutex<MeetingSessionOrchestrator>>,
    pub status: SessionStatusHandle,
    pub persist: Arc<PersistenceLayer>,
}
