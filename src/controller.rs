//! Acquisition controller.
//!
//! [`AcquisitionController`] is the single point of control for one device's acquisition
//! session. It bridges asynchronous sample delivery from a [`SampleSource`] to the owned
//! [`ChromatogramRecording`] under explicit, caller-driven state transitions.
//!
//! # State Machines
//!
//! ```text
//! connection:  Disconnected ──connect()──> Connected ──disconnect()──> Disconnected
//!              (connect() is a silent no-op while the channel medium is closed)
//!
//! recording:   Idle ──start()──> Recording ──stop()──> Idle
//!              (new_record()/reset() are valid in both states and keep the state)
//! ```
//!
//! The two machines are independent: starting a recording while disconnected is allowed,
//! samples simply never arrive until the channel is connected.
//!
//! # Concurrency
//!
//! Recording state, the delivery gate and the recording itself live behind one
//! `parking_lot::Mutex`. A batch is applied under a single lock acquisition, so a
//! `stop()` or `reset()` racing with delivery sees the batch either fully applied or
//! fully discarded. The gate carries the epoch of the current connection; handlers from
//! earlier connections, and any callback still in flight when `disconnect()` returns,
//! find the gate closed and append nothing.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::error::{AppResult, DeliveryFailure};
use crate::hardware::capabilities::{SampleHandler, SampleSource};
use crate::hardware::ControlDevice;
use crate::recording::{
    ChromatogramRecording, RecordingSnapshot, DEFAULT_SCAN_DELAY_MS, DEFAULT_SCAN_INTERVAL_MS,
};
use crate::validation::validate_scan_interval;

/// Whether the device channel is delivering into this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No handler installed; nothing is delivered.
    Disconnected,
    /// The channel delivers into the current handler.
    Connected,
}

/// Whether delivered batches are appended to the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    /// Delivered batches are discarded.
    Idle,
    /// Delivered batches are appended in arrival order.
    Recording,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording => write!(f, "Recording"),
        }
    }
}

/// Timing applied by [`AcquisitionController::new_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingDefaults {
    /// Delay before the first scan, in milliseconds.
    pub scan_delay_ms: u64,
    /// Spacing between scans, in milliseconds.
    pub scan_interval_ms: u64,
}

impl Default for RecordingDefaults {
    fn default() -> Self {
        Self {
            scan_delay_ms: DEFAULT_SCAN_DELAY_MS,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
        }
    }
}

/// Observer for asynchronous delivery failures.
pub type FailureHook = Arc<dyn Fn(&DeliveryFailure) + Send + Sync>;

// =============================================================================
// Shared state
// =============================================================================

struct Shared {
    connection: ConnectionState,
    recording_state: RecordingState,
    /// Epoch of the connection allowed to deliver; `None` while disconnected.
    gate: Option<u64>,
    recording: ChromatogramRecording,
    discarded_batches: u64,
}

impl Shared {
    fn apply_batch(&mut self, values: &[f32]) -> bool {
        if self.recording_state == RecordingState::Recording {
            self.recording.extend_from_slice(values);
            true
        } else {
            self.discarded_batches += 1;
            false
        }
    }
}

struct FailureReporter {
    device_id: String,
    count: AtomicU64,
    hook: RwLock<Option<FailureHook>>,
}

impl FailureReporter {
    fn report(&self, failure: &DeliveryFailure) {
        self.count.fetch_add(1, Ordering::Relaxed);
        warn!(device = %self.device_id, kind = %failure.kind, "{}", failure);
        let hook = self.hook.read().clone();
        if let Some(hook) = hook {
            hook(failure);
        }
    }
}

/// Completion handler installed on the channel for one connection epoch.
struct ControllerHandler {
    epoch: u64,
    shared: Arc<Mutex<Shared>>,
    reporter: Arc<FailureReporter>,
}

impl SampleHandler for ControllerHandler {
    fn on_batch(&self, values: &[f32]) {
        let mut shared = self.shared.lock();
        if shared.gate != Some(self.epoch) {
            trace!(epoch = self.epoch, len = values.len(), "Stale handler, batch suppressed");
            return;
        }
        shared.apply_batch(values);
    }

    fn on_failure(&self, failure: DeliveryFailure) {
        if self.shared.lock().gate != Some(self.epoch) {
            trace!(epoch = self.epoch, %failure, "Stale handler, failure ignored");
            return;
        }
        self.reporter.report(&failure);
    }
}

// =============================================================================
// AcquisitionController
// =============================================================================

/// Controls acquisition for one device.
///
/// # Example
///
/// ```rust,ignore
/// let source = Arc::new(MockSampleSource::new("ulad3x"));
/// let controller = AcquisitionController::new(ControlDevice::new("ulad3x"), source.clone())?;
///
/// controller.connect().await?;
/// controller.start(true);
/// // ... channel delivers batches ...
/// controller.stop();
/// let chromatogram = controller.recording();
/// controller.disconnect().await;
/// ```
pub struct AcquisitionController {
    device: Arc<ControlDevice>,
    source: Arc<dyn SampleSource>,
    defaults: RecordingDefaults,
    shared: Arc<Mutex<Shared>>,
    reporter: Arc<FailureReporter>,
    /// Serializes connect/disconnect; holds the next connection epoch.
    lifecycle: tokio::sync::Mutex<u64>,
}

impl AcquisitionController {
    /// Create a controller with the default 100 ms delay / 100 ms interval.
    pub fn new(
        device: impl Into<Arc<ControlDevice>>,
        source: Arc<dyn SampleSource>,
    ) -> AppResult<Self> {
        Self::with_defaults(device, source, RecordingDefaults::default())
    }

    /// Create a controller whose `new_record` uses `defaults`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `defaults.scan_interval_ms` is zero.
    pub fn with_defaults(
        device: impl Into<Arc<ControlDevice>>,
        source: Arc<dyn SampleSource>,
        defaults: RecordingDefaults,
    ) -> AppResult<Self> {
        validate_scan_interval(defaults.scan_interval_ms)?;
        let device = device.into();
        let recording = ChromatogramRecording::new(
            device.id.clone(),
            defaults.scan_delay_ms,
            defaults.scan_interval_ms,
        )?;

        debug!(device = %device.id, channel = source.channel_id(), "Controller created");
        Ok(Self {
            reporter: Arc::new(FailureReporter {
                device_id: device.id.clone(),
                count: AtomicU64::new(0),
                hook: RwLock::new(None),
            }),
            device,
            source,
            defaults,
            shared: Arc::new(Mutex::new(Shared {
                connection: ConnectionState::Disconnected,
                recording_state: RecordingState::Idle,
                gate: None,
                recording,
                discarded_batches: 0,
            })),
            lifecycle: tokio::sync::Mutex::new(0),
        })
    }

    /// Install a hook that observes every asynchronous delivery failure.
    pub fn with_failure_hook(self, hook: FailureHook) -> Self {
        self.set_failure_hook(Some(hook));
        self
    }

    /// Replace or remove the failure hook.
    pub fn set_failure_hook(&self, hook: Option<FailureHook>) {
        *self.reporter.hook.write() = hook;
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Activate sample delivery from the channel.
    ///
    /// A closed communication medium is not an error: the call returns `Ok(())` and the
    /// controller stays disconnected. Already connected is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AcquisitionError::Channel` if the channel rejects activation; the
    /// controller then stays disconnected.
    pub async fn connect(&self) -> AppResult<()> {
        let mut next_epoch = self.lifecycle.lock().await;

        if self.is_connected() {
            return Ok(());
        }
        if !self.source.is_channel_open() {
            debug!(
                device = %self.device.id,
                channel = self.source.channel_id(),
                "Channel medium closed, activation skipped"
            );
            return Ok(());
        }

        let epoch = *next_epoch;
        *next_epoch += 1;

        // Open the gate before activation so the first batches are not lost.
        self.shared.lock().gate = Some(epoch);
        let handler = Arc::new(ControllerHandler {
            epoch,
            shared: Arc::clone(&self.shared),
            reporter: Arc::clone(&self.reporter),
        });

        if let Err(err) = self.source.activate(handler).await {
            self.shared.lock().gate = None;
            warn!(device = %self.device.id, error = %err, "Channel activation failed");
            return Err(err.into());
        }

        self.shared.lock().connection = ConnectionState::Connected;
        info!(device = %self.device.id, epoch, "Connected");
        Ok(())
    }

    /// Deactivate sample delivery. Idempotent and infallible.
    ///
    /// No sample is appended after this returns, even from callbacks that were
    /// already in flight.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let mut shared = self.shared.lock();
            if shared.connection == ConnectionState::Disconnected {
                return;
            }
            shared.gate = None;
            shared.connection = ConnectionState::Disconnected;
        }

        if let Err(err) = self.source.deactivate().await {
            warn!(device = %self.device.id, error = %err, "Channel deactivation failed");
        }
        info!(device = %self.device.id, "Disconnected");
    }

    // -------------------------------------------------------------------------
    // Recording control
    // -------------------------------------------------------------------------

    /// Begin accepting batches, optionally clearing the recording first.
    ///
    /// The reset and the state change happen atomically with respect to delivery.
    pub fn start(&self, reset_first: bool) {
        let mut shared = self.shared.lock();
        if reset_first {
            shared.recording.reset_recording();
        }
        shared.recording_state = RecordingState::Recording;
        info!(device = %self.device.id, reset_first, "Recording started");
    }

    /// Stop accepting batches. Later batches are discarded, not queued.
    pub fn stop(&self) {
        let mut shared = self.shared.lock();
        shared.recording_state = RecordingState::Idle;
        info!(
            device = %self.device.id,
            samples = shared.recording.len(),
            "Recording stopped"
        );
    }

    /// Clear the recording and apply `scan_delay_ms` (or the default delay) together with
    /// the default interval.
    pub fn new_record(&self, scan_delay_ms: Option<u64>) -> AppResult<()> {
        let delay = scan_delay_ms.unwrap_or(self.defaults.scan_delay_ms);
        self.shared
            .lock()
            .recording
            .new_record(delay, self.defaults.scan_interval_ms)?;
        debug!(device = %self.device.id, scan_delay_ms = delay, "New record");
        Ok(())
    }

    /// Clear the recorded samples; timing is unchanged.
    pub fn reset_recording(&self) {
        self.shared.lock().recording.reset_recording();
        debug!(device = %self.device.id, "Recording reset");
    }

    /// Alias of [`reset_recording`](Self::reset_recording).
    pub fn reset(&self) {
        self.reset_recording();
    }

    /// Change the scan delay only. Samples are kept.
    pub fn set_scan_delay(&self, milliseconds: u64) {
        self.shared.lock().recording.set_scan_delay(milliseconds);
    }

    /// Change the scan interval only. Samples are kept.
    pub fn set_scan_interval(&self, milliseconds: u64) -> AppResult<()> {
        self.shared.lock().recording.set_scan_interval(milliseconds)
    }

    /// Route one batch as if delivered by the channel.
    ///
    /// Appends every value in order while recording; otherwise drops the whole batch.
    /// Returns whether the batch was applied.
    pub fn on_sample_batch(&self, values: &[f32]) -> bool {
        self.shared.lock().apply_batch(values)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Whether the channel is delivering into this controller.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Whether delivered batches are being appended.
    pub fn is_recording(&self) -> bool {
        self.recording_state() == RecordingState::Recording
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().connection
    }

    /// Current recording state.
    pub fn recording_state(&self) -> RecordingState {
        self.shared.lock().recording_state
    }

    /// Immutable snapshot of the recording.
    pub fn recording(&self) -> RecordingSnapshot {
        self.shared.lock().recording.snapshot()
    }

    /// Recorded signal values, in arrival order.
    pub fn samples(&self) -> Vec<f32> {
        self.shared.lock().recording.values().collect()
    }

    /// Number of recorded scans.
    pub fn sample_count(&self) -> usize {
        self.shared.lock().recording.len()
    }

    /// Recording name (the device id).
    pub fn name(&self) -> String {
        self.shared.lock().recording.name().to_string()
    }

    /// Current scan delay, in milliseconds.
    pub fn scan_delay(&self) -> u64 {
        self.shared.lock().recording.scan_delay()
    }

    /// Current scan interval, in milliseconds.
    pub fn scan_interval(&self) -> u64 {
        self.shared.lock().recording.scan_interval()
    }

    /// The device this controller governs.
    pub fn device(&self) -> &Arc<ControlDevice> {
        &self.device
    }

    /// Timing applied by `new_record`.
    pub fn defaults(&self) -> RecordingDefaults {
        self.defaults
    }

    /// Number of delivery failures reported since creation.
    pub fn delivery_failures(&self) -> u64 {
        self.reporter.count.load(Ordering::Relaxed)
    }

    /// Number of batches dropped because the controller was idle.
    pub fn discarded_batches(&self) -> u64 {
        self.shared.lock().discarded_batches
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        // The channel may still hold a handler; make it inert.
        self.shared.lock().gate = None;
    }
}

impl fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("AcquisitionController")
            .field("device", &self.device.id)
            .field("connection", &shared.connection)
            .field("recording_state", &shared.recording_state)
            .field("samples", &shared.recording.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockSampleSource;

    fn controller() -> AcquisitionController {
        let source = Arc::new(MockSampleSource::new("mock"));
        AcquisitionController::new(ControlDevice::new("ulad3x-1"), source).unwrap()
    }

    #[test]
    fn initial_state() {
        let c = controller();
        assert_eq!(c.connection_state(), ConnectionState::Disconnected);
        assert_eq!(c.recording_state(), RecordingState::Idle);
        assert_eq!(c.name(), "ulad3x-1");
        assert_eq!(c.scan_delay(), 100);
        assert_eq!(c.scan_interval(), 100);
        assert_eq!(c.sample_count(), 0);
    }

    #[test]
    fn zero_default_interval_rejected() {
        let source = Arc::new(MockSampleSource::new("mock"));
        let defaults = RecordingDefaults {
            scan_delay_ms: 10,
            scan_interval_ms: 0,
        };
        let result =
            AcquisitionController::with_defaults(ControlDevice::new("d"), source, defaults);
        assert!(result.is_err());
    }

    #[test]
    fn batches_only_recorded_while_recording() {
        let c = controller();
        c.start(false);
        assert!(c.on_sample_batch(&[1.0, 2.0, 3.0]));
        assert_eq!(c.samples(), vec![1.0, 2.0, 3.0]);

        c.stop();
        assert!(!c.on_sample_batch(&[4.0]));
        assert_eq!(c.samples(), vec![1.0, 2.0, 3.0]);
        assert_eq!(c.discarded_batches(), 1);
    }

    #[test]
    fn start_with_reset_clears_first() {
        let c = controller();
        c.start(false);
        c.on_sample_batch(&[1.0]);

        c.start(true);
        assert!(c.samples().is_empty());
        assert!(c.is_recording());

        c.on_sample_batch(&[5.0]);
        assert_eq!(c.samples(), vec![5.0]);
    }

    #[test]
    fn new_record_uses_defaults_and_keeps_state() {
        let c = controller();
        c.start(false);
        c.new_record(Some(250)).unwrap();
        assert_eq!(c.scan_delay(), 250);
        assert!(c.is_recording());

        c.on_sample_batch(&[1.0]);
        c.new_record(None).unwrap();
        assert_eq!(c.scan_delay(), 100);
        assert_eq!(c.scan_interval(), 100);
        assert_eq!(c.sample_count(), 0);
        assert!(c.is_recording());
    }

    #[test]
    fn reset_keeps_timing() {
        let c = controller();
        c.set_scan_interval(40).unwrap();
        c.set_scan_delay(7);
        c.start(false);
        c.on_sample_batch(&[1.0, 2.0]);

        c.reset();
        assert_eq!(c.sample_count(), 0);
        assert_eq!(c.scan_delay(), 7);
        assert_eq!(c.scan_interval(), 40);

        c.on_sample_batch(&[3.0]);
        c.reset_recording();
        assert_eq!(c.sample_count(), 0);
    }

    #[test]
    fn set_scan_delay_keeps_samples() {
        let c = controller();
        c.start(false);
        c.on_sample_batch(&[1.0, 2.0]);
        c.set_scan_delay(500);
        assert_eq!(c.samples(), vec![1.0, 2.0]);
        assert_eq!(c.scan_delay(), 500);
    }

    #[test]
    fn zero_interval_setter_rejected() {
        let c = controller();
        assert!(c.set_scan_interval(0).is_err());
        assert_eq!(c.scan_interval(), 100);
    }

    #[test]
    fn recording_snapshot_carries_timestamps() {
        let c = controller();
        c.start(false);
        c.on_sample_batch(&[1.0, 2.0]);
        let snap = c.recording();
        assert_eq!(snap.name, "ulad3x-1");
        let times: Vec<u64> = snap.scans.iter().map(|s| s.retention_time_ms).collect();
        assert_eq!(times, vec![100, 200]);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn delivery_failure_is_logged_and_counted() {
        use crate::error::DeliveryFailureKind;

        let source = Arc::new(MockSampleSource::new("mock"));
        let c = AcquisitionController::new(ControlDevice::new("ulad3x-1"), source.clone()).unwrap();
        c.connect().await.unwrap();
        c.start(false);

        source.fail(DeliveryFailure::new(DeliveryFailureKind::Decode, "bad checksum"));

        assert_eq!(c.delivery_failures(), 1);
        assert!(c.is_recording());
        assert!(logs_contain("bad checksum"));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(RecordingState::Recording.to_string(), "Recording");
    }
}
