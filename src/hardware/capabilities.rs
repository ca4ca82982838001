//! Device Channel Capabilities
//!
//! This module defines the boundary between the acquisition core and the device
//! communication layer. The layer itself (protocol library, frame decoding) lives outside
//! this crate; it is represented here only by the two traits it must satisfy:
//!
//! - [`SampleSource`]: a channel that can be activated with a handler and deactivated.
//! - [`SampleHandler`]: the completion handler the channel calls whenever a batch of
//!   decoded samples arrives, or when an asynchronous read fails.
//!
//! # Contract
//!
//! - Handler callbacks may run on any thread, zero or more times, in any order relative
//!   to control calls made on the controller.
//! - Handler callbacks must never block the delivering thread.
//! - After `deactivate()` returns, the source must stop dispatching new batches to the
//!   previously installed handler. Callbacks already in flight may still complete; the
//!   controller suppresses them.
//!
//! # Example
//!
//! ```rust,ignore
//! struct UlanChannel { /* protocol library handle */ }
//!
//! #[async_trait]
//! impl SampleSource for UlanChannel {
//!     fn channel_id(&self) -> &str { "ulan:0x4f" }
//!     fn is_channel_open(&self) -> bool { ulan::is_open() }
//!     async fn activate(&self, handler: Arc<dyn SampleHandler>) -> Result<(), ChannelError> {
//!         self.filter.activate(move |frame| handler.on_batch(&decode(frame)))
//!     }
//!     async fn deactivate(&self) -> Result<(), ChannelError> {
//!         self.filter.deactivate()
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{ChannelError, DeliveryFailure};

/// Completion handler invoked by the channel for every delivered batch.
///
/// # Thread Safety
/// Implementations are shared across threads (`Send + Sync`) and use interior
/// mutability for state.
pub trait SampleHandler: Send + Sync {
    /// A batch of decoded samples arrived, in device order.
    fn on_batch(&self, values: &[f32]);

    /// An asynchronous read or decode failed. Never propagated to control callers.
    fn on_failure(&self, failure: DeliveryFailure);
}

/// Capability: Asynchronous Sample Delivery
///
/// Devices whose communication channel pushes batches of detector samples
/// (chromatography detectors, A/D converters).
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Identifier used in logs and channel errors.
    fn channel_id(&self) -> &str;

    /// Whether the communication medium as a whole is open.
    ///
    /// When this returns `false`, the controller skips activation silently.
    fn is_channel_open(&self) -> bool;

    /// Install `handler` and start delivering batches to it.
    ///
    /// # Returns
    /// - Ok(()) once delivery is enabled (data may arrive later)
    /// - Err if the transport rejects the request or the channel is closed
    async fn activate(&self, handler: Arc<dyn SampleHandler>) -> Result<(), ChannelError>;

    /// Stop delivering batches and drop the installed handler.
    ///
    /// Must be idempotent.
    async fn deactivate(&self) -> Result<(), ChannelError>;
}
