//! Mock Device Channel
//!
//! Provides a simulated [`SampleSource`] for testing without a physical detector.
//! Batches can be pushed by hand ([`MockSampleSource::deliver`]) for deterministic tests,
//! or produced continuously by a tokio task ([`MockSampleSource::spawn_generator`]) that
//! renders a synthetic chromatogram (Gaussian peaks on a noisy baseline).
//!
//! All timing uses `tokio::time`, never `std::thread::sleep`.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::{ChannelError, DeliveryFailure};
use crate::hardware::capabilities::{SampleHandler, SampleSource};

// =============================================================================
// SignalPattern - Synthetic chromatogram
// =============================================================================

/// One Gaussian peak of a synthetic chromatogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Peak apex, ms since generator start.
    pub center_ms: f64,
    /// Height above baseline.
    pub height: f32,
    /// Standard deviation, in ms.
    pub width_ms: f64,
}

/// Synthetic detector signal: baseline + peaks + uniform noise.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPattern {
    /// Signal level without peaks.
    pub baseline: f32,
    /// Half-width of the uniform noise.
    pub noise_amplitude: f32,
    /// Peaks added on top of the baseline.
    pub peaks: Vec<Peak>,
    /// RNG seed, so runs are reproducible.
    pub seed: u64,
}

impl Default for SignalPattern {
    fn default() -> Self {
        Self {
            baseline: 0.5,
            noise_amplitude: 0.01,
            peaks: vec![
                Peak {
                    center_ms: 1_500.0,
                    height: 4.0,
                    width_ms: 120.0,
                },
                Peak {
                    center_ms: 3_000.0,
                    height: 9.5,
                    width_ms: 150.0,
                },
                Peak {
                    center_ms: 4_500.0,
                    height: 2.5,
                    width_ms: 200.0,
                },
            ],
            seed: 0x4f,
        }
    }
}

impl SignalPattern {
    /// Flat baseline without noise or peaks.
    pub fn flat(level: f32) -> Self {
        Self {
            baseline: level,
            noise_amplitude: 0.0,
            peaks: Vec::new(),
            seed: 0,
        }
    }

    /// Noise-free signal value at `t_ms`.
    pub fn ideal(&self, t_ms: f64) -> f32 {
        let peaks: f64 = self
            .peaks
            .iter()
            .map(|p| {
                let z = (t_ms - p.center_ms) / p.width_ms;
                p.height as f64 * (-0.5 * z * z).exp()
            })
            .sum();
        self.baseline + peaks as f32
    }

    fn sample(&self, t_ms: f64, rng: &mut StdRng) -> f32 {
        let noise = if self.noise_amplitude > 0.0 {
            rng.gen_range(-self.noise_amplitude..=self.noise_amplitude)
        } else {
            0.0
        };
        self.ideal(t_ms) + noise
    }
}

/// Largest batch the generator produces; larger requests are clamped.
pub const MAX_BATCH_SIZE: usize = 65_536;

/// Longest time the generator waits between batches.
const MAX_BATCH_PERIOD: Duration = Duration::from_secs(3_600);

// =============================================================================
// MockSampleSource - Simulated device channel
// =============================================================================

/// Simulated device channel.
///
/// Simulates:
/// - a communication medium that can be open or closed
/// - activation failures injected by tests
/// - asynchronous batch delivery to the installed handler
///
/// # Example
///
/// ```rust,ignore
/// let source = Arc::new(MockSampleSource::new("ulad3x"));
/// let controller = AcquisitionController::new(device, source.clone())?;
/// controller.connect().await?;
/// controller.start(false);
/// source.deliver(&[1.0, 2.0, 3.0]);
/// ```
pub struct MockSampleSource {
    channel_id: String,
    channel_open: AtomicBool,
    handler: RwLock<Option<Arc<dyn SampleHandler>>>,
    activation_failure: Mutex<Option<ChannelError>>,
    deactivation_failure: Mutex<Option<ChannelError>>,
    activations: AtomicU64,
    delivered_batches: AtomicU64,
}

impl MockSampleSource {
    /// Create a mock channel with the communication medium open.
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_open: AtomicBool::new(true),
            handler: RwLock::new(None),
            activation_failure: Mutex::new(None),
            deactivation_failure: Mutex::new(None),
            activations: AtomicU64::new(0),
            delivered_batches: AtomicU64::new(0),
        }
    }

    /// Create a mock channel whose communication medium is closed.
    pub fn closed(channel_id: impl Into<String>) -> Self {
        let source = Self::new(channel_id);
        source.set_channel_open(false);
        source
    }

    /// Open or close the simulated communication medium.
    pub fn set_channel_open(&self, open: bool) {
        self.channel_open.store(open, Ordering::SeqCst);
    }

    /// Make the next `activate` call fail with `error`.
    pub fn fail_next_activation(&self, error: ChannelError) {
        *self.activation_failure.lock() = Some(error);
    }

    /// Make the next `deactivate` call fail with `error`.
    ///
    /// The handler is still removed, as a real transport stops dispatching even when
    /// its close request reports an error.
    pub fn fail_next_deactivation(&self, error: ChannelError) {
        *self.deactivation_failure.lock() = Some(error);
    }

    /// Whether a handler is currently installed.
    pub fn is_active(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Number of successful activations so far.
    pub fn activation_count(&self) -> u64 {
        self.activations.load(Ordering::SeqCst)
    }

    /// Number of batches handed to a handler so far.
    pub fn delivered_batches(&self) -> u64 {
        self.delivered_batches.load(Ordering::SeqCst)
    }

    /// Current handler, if any. Lets tests simulate callbacks that were already
    /// in flight when the channel was deactivated.
    pub fn current_handler(&self) -> Option<Arc<dyn SampleHandler>> {
        self.handler.read().clone()
    }

    /// Push one batch to the installed handler.
    ///
    /// Returns `false` (and drops the batch) when no handler is installed.
    pub fn deliver(&self, values: &[f32]) -> bool {
        let Some(handler) = self.current_handler() else {
            trace!(channel = %self.channel_id, len = values.len(), "No handler, batch dropped");
            return false;
        };
        handler.on_batch(values);
        self.delivered_batches.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Report an asynchronous delivery failure to the installed handler.
    pub fn fail(&self, failure: DeliveryFailure) -> bool {
        match self.current_handler() {
            Some(handler) => {
                handler.on_failure(failure);
                true
            }
            None => false,
        }
    }

    /// Spawn a task that renders `pattern` and delivers it in batches.
    ///
    /// One sample is produced every `sample_interval`; samples are grouped into batches
    /// of `batch_size` (clamped to `1..=MAX_BATCH_SIZE`). The task runs until the returned
    /// handle is aborted.
    pub fn spawn_generator(
        self: &Arc<Self>,
        pattern: SignalPattern,
        sample_interval: Duration,
        batch_size: usize,
    ) -> JoinHandle<()> {
        let source = Arc::clone(self);
        let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        let sample_interval = sample_interval.max(Duration::from_millis(1));
        let period = sample_interval
            .saturating_mul(batch_size as u32)
            .min(MAX_BATCH_PERIOD);
        let step_ms = sample_interval.as_secs_f64() * 1000.0;

        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(pattern.seed);
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut index: u64 = 0;

            debug!(channel = %source.channel_id, ?period, batch_size, "Mock generator started");
            loop {
                ticker.tick().await;
                let batch: Vec<f32> = (0..batch_size)
                    .map(|i| pattern.sample((index + i as u64) as f64 * step_ms, &mut rng))
                    .collect();
                index += batch_size as u64;
                source.deliver(&batch);
            }
        })
    }
}

#[async_trait]
impl SampleSource for MockSampleSource {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    fn is_channel_open(&self) -> bool {
        self.channel_open.load(Ordering::SeqCst)
    }

    async fn activate(&self, handler: Arc<dyn SampleHandler>) -> Result<(), ChannelError> {
        if let Some(err) = self.activation_failure.lock().take() {
            return Err(err);
        }
        if !self.is_channel_open() {
            return Err(ChannelError::closed(&self.channel_id));
        }
        *self.handler.write() = Some(handler);
        self.activations.fetch_add(1, Ordering::SeqCst);
        debug!(channel = %self.channel_id, "Mock channel activated");
        Ok(())
    }

    async fn deactivate(&self) -> Result<(), ChannelError> {
        if self.handler.write().take().is_some() {
            debug!(channel = %self.channel_id, "Mock channel deactivated");
        }
        match self.deactivation_failure.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
