//! # Chroma DAQ Core Library
//!
//! Real-time acquisition core of a chromatography data system. A device channel delivers
//! decoded detector samples asynchronously; an [`AcquisitionController`] routes them into
//! a [`ChromatogramRecording`] under an explicit start/stop/reset protocol while the
//! channel connection is opened and closed asynchronously.
//!
//! ## Crate Structure
//!
//! - **`controller`**: `AcquisitionController`, the per-device state machine bridging
//!   channel callbacks to the recording.
//! - **`recording`**: `ChromatogramRecording`, the append-only, time-indexed scan buffer,
//!   and its immutable `RecordingSnapshot`.
//! - **`hardware`**: the `SampleSource`/`SampleHandler` channel traits, `ControlDevice`,
//!   and `MockSampleSource` for simulation.
//! - **`experiment`**: acquisition metadata, batch naming and the `AcquisitionRun`
//!   executor (auto-stop after a duration or on request).
//! - **`config`**: layered Figment configuration (TOML + environment).
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`error`**: `AcquisitionError` and the channel/delivery error types.
//! - **`validation`**: small validation helpers.

pub mod config;
pub mod controller;
pub mod error;
pub mod experiment;
pub mod hardware;
pub mod logging;
pub mod recording;
pub mod validation;

pub use controller::{AcquisitionController, ConnectionState, RecordingDefaults, RecordingState};
pub use error::{AcquisitionError, AppResult, ChannelError, DeliveryFailure};
pub use recording::{ChromatogramRecording, RecordingSnapshot, Scan};
