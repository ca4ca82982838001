//! Acquisition run state and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::acquisition::Acquisition;
use crate::recording::RecordingSnapshot;

/// Lifecycle state of an acquisition run.
///
/// # State Machine
///
/// ```text
/// Pending ──execute()──> Running ──stop──> Completed
///    │
///    └──connect failed──> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionState {
    /// Configured, not yet executed
    Pending,
    /// Samples are being recorded
    Running,
    /// Run finished; the recording is final
    Completed,
    /// Run could not start
    Failed,
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionState::Pending => write!(f, "Pending"),
            AcquisitionState::Running => write!(f, "Running"),
            AcquisitionState::Completed => write!(f, "Completed"),
            AcquisitionState::Failed => write!(f, "Failed"),
        }
    }
}

impl AcquisitionState {
    /// Check if the state allows executing the run.
    pub fn can_begin(&self) -> bool {
        matches!(self, AcquisitionState::Pending)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The configured duration elapsed (auto-stop).
    DurationElapsed,
    /// A stop was requested through a [`RunStopHandle`](super::RunStopHandle).
    Requested,
}

/// Result of a finished acquisition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedAcquisition {
    /// Metadata of the run.
    pub acquisition: Acquisition,
    /// Final recording.
    pub recording: RecordingSnapshot,
    /// When recording started.
    pub started_at: DateTime<Utc>,
    /// When recording stopped.
    pub finished_at: DateTime<Utc>,
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// Delivery failures reported by the channel during the run.
    pub delivery_failures: u64,
}

impl CompletedAcquisition {
    /// Wall-clock length of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
