//! Executor for a single acquisition run.
//!
//! An [`AcquisitionRun`] drives one [`AcquisitionController`] through a complete
//! acquisition:
//!
//! ```text
//! connect → new_record → start(reset) → wait (duration | stop request) → stop → disconnect
//! ```
//!
//! With `auto_stop` the run ends when the acquisition duration elapses or a stop is
//! requested, whichever comes first; without it only a stop request ends the run.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::acquisition::Acquisition;
use super::state::{AcquisitionState, CompletedAcquisition, StopReason};
use crate::controller::AcquisitionController;
use crate::error::{AcquisitionError, AppResult};

/// Requests that a running acquisition stop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RunStopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl RunStopHandle {
    /// Ask the run to stop. Takes effect immediately if it is running, or as soon as it
    /// starts otherwise.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One executable acquisition.
///
/// # Example
///
/// ```rust,ignore
/// let acquisition = Acquisition::builder()
///     .name("caffeine")
///     .duration(Duration::from_secs(300), true)
///     .build();
/// let mut run = AcquisitionRun::new(acquisition)?;
/// let completed = run.execute(&controller).await?;
/// println!("{} scans", completed.recording.len());
/// ```
pub struct AcquisitionRun {
    acquisition: Acquisition,
    state: AcquisitionState,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl AcquisitionRun {
    /// Create a pending run.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the acquisition metadata is invalid.
    pub fn new(acquisition: Acquisition) -> AppResult<Self> {
        acquisition.validate()?;
        let (stop_tx, stop_rx) = watch::channel(false);
        Ok(Self {
            acquisition,
            state: AcquisitionState::Pending,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        })
    }

    /// The acquisition this run executes.
    pub fn acquisition(&self) -> &Acquisition {
        &self.acquisition
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Handle that stops this run from another task.
    pub fn stop_handle(&self) -> RunStopHandle {
        RunStopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Execute the run on `controller` and return the final recording.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the run is not pending
    /// - `Channel` if connecting fails (the run becomes `Failed`)
    pub async fn execute(
        &mut self,
        controller: &AcquisitionController,
    ) -> AppResult<CompletedAcquisition> {
        if !self.state.can_begin() {
            return Err(AcquisitionError::InvalidState(format!(
                "cannot execute acquisition '{}' in {} state",
                self.acquisition.name, self.state
            )));
        }

        info!(
            acquisition = %self.acquisition.name,
            device = %controller.device().id,
            duration_ms = self.acquisition.duration_ms,
            auto_stop = self.acquisition.auto_stop,
            "Starting acquisition"
        );

        if let Err(err) = self.prepare(controller).await {
            error!(
                acquisition = %self.acquisition.name,
                error = %err,
                transient = err.is_transient(),
                "Acquisition failed to start"
            );
            self.state = AcquisitionState::Failed;
            return Err(err);
        }

        let failures_before = controller.delivery_failures();
        let started_at = Utc::now();
        controller.start(true);
        self.state = AcquisitionState::Running;

        let stop_reason = self.wait_for_stop().await;

        controller.stop();
        let finished_at = Utc::now();
        controller.disconnect().await;
        self.state = AcquisitionState::Completed;

        let completed = CompletedAcquisition {
            acquisition: self.acquisition.clone(),
            recording: controller.recording(),
            started_at,
            finished_at,
            stop_reason,
            delivery_failures: controller.delivery_failures() - failures_before,
        };
        info!(
            acquisition = %self.acquisition.name,
            scans = completed.recording.len(),
            ?stop_reason,
            "Acquisition completed"
        );
        Ok(completed)
    }

    async fn prepare(&self, controller: &AcquisitionController) -> AppResult<()> {
        controller.connect().await?;
        if !controller.is_connected() {
            warn!(
                acquisition = %self.acquisition.name,
                "Channel medium closed; recording will not receive samples"
            );
        }
        if let Err(err) = controller.new_record(None) {
            controller.disconnect().await;
            return Err(err);
        }
        Ok(())
    }

    async fn wait_for_stop(&self) -> StopReason {
        let mut stop_rx = self.stop_rx.clone();
        let requested = async move {
            // The sender lives in `self`, so this only resolves on a stop request.
            let _ = stop_rx.wait_for(|stopped| *stopped).await;
        };

        if self.acquisition.auto_stop {
            tokio::select! {
                _ = sleep(self.acquisition.duration()) => StopReason::DurationElapsed,
                _ = requested => StopReason::Requested,
            }
        } else {
            requested.await;
            StopReason::Requested
        }
    }
}
