//! Acquisition metadata and run execution.
//!
//! - [`Acquisition`]: what is measured and for how long
//! - [`AcquisitionRun`]: drives a controller through one complete acquisition
//! - [`CompletedAcquisition`]: the final recording plus run metadata

pub mod acquisition;
pub mod run_engine;
pub mod state;

pub use acquisition::{Acquisition, AcquisitionBuilder};
pub use run_engine::{AcquisitionRun, RunStopHandle};
pub use state::{AcquisitionState, CompletedAcquisition, StopReason};
