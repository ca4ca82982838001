//! Chromatogram recording buffer.
//!
//! A [`ChromatogramRecording`] is the in-memory, append-only buffer that accumulates
//! detector samples for one acquisition. Every appended value becomes a [`Scan`] whose
//! retention time is derived from the timing configuration in effect at append time:
//!
//! ```text
//! retention_time_ms = scan_delay + index * scan_interval
//! ```
//!
//! Scans are never reordered or removed individually; the only way to drop data is a
//! full clear via [`ChromatogramRecording::reset_recording`] or
//! [`ChromatogramRecording::new_record`].

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::validation::validate_scan_interval;

/// Default delay before the first accepted sample, in milliseconds.
pub const DEFAULT_SCAN_DELAY_MS: u64 = 100;

/// Default nominal spacing between samples, in milliseconds.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 100;

/// One timestamped detector sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    /// Time since acquisition start, in milliseconds.
    pub retention_time_ms: u64,
    /// Detector signal as delivered by the device channel.
    pub signal: f32,
}

/// Append-only, time-indexed buffer of scans with acquisition timing metadata.
#[derive(Debug, Clone)]
pub struct ChromatogramRecording {
    name: String,
    scan_delay_ms: u64,
    scan_interval_ms: u64,
    scans: Vec<Scan>,
}

impl ChromatogramRecording {
    /// Create an empty recording.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `scan_interval_ms` is zero.
    pub fn new(
        name: impl Into<String>,
        scan_delay_ms: u64,
        scan_interval_ms: u64,
    ) -> AppResult<Self> {
        validate_scan_interval(scan_interval_ms)?;
        Ok(Self {
            name: name.into(),
            scan_delay_ms,
            scan_interval_ms,
            scans: Vec::new(),
        })
    }

    /// Reconfigure timing and clear all scans.
    ///
    /// On error the recording is left untouched.
    pub fn new_record(&mut self, scan_delay_ms: u64, scan_interval_ms: u64) -> AppResult<()> {
        validate_scan_interval(scan_interval_ms)?;
        self.scan_delay_ms = scan_delay_ms;
        self.scan_interval_ms = scan_interval_ms;
        self.scans.clear();
        Ok(())
    }

    /// Append one sample at the end of the sequence.
    pub fn append(&mut self, signal: f32) {
        let retention_time_ms = self.next_retention_time();
        self.scans.push(Scan {
            retention_time_ms,
            signal,
        });
    }

    /// Append a batch of samples in order.
    pub fn extend_from_slice(&mut self, signals: &[f32]) {
        self.scans.reserve(signals.len());
        for &signal in signals {
            self.append(signal);
        }
    }

    /// Clear all scans, keeping name and timing.
    pub fn reset_recording(&mut self) {
        self.scans.clear();
    }

    /// Change the scan delay. Existing scans keep their retention times.
    pub fn set_scan_delay(&mut self, scan_delay_ms: u64) {
        self.scan_delay_ms = scan_delay_ms;
    }

    /// Change the scan interval. Existing scans keep their retention times.
    pub fn set_scan_interval(&mut self, scan_interval_ms: u64) -> AppResult<()> {
        validate_scan_interval(scan_interval_ms)?;
        self.scan_interval_ms = scan_interval_ms;
        Ok(())
    }

    /// Recording name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scan delay, in milliseconds.
    pub fn scan_delay(&self) -> u64 {
        self.scan_delay_ms
    }

    /// Scan interval, in milliseconds.
    pub fn scan_interval(&self) -> u64 {
        self.scan_interval_ms
    }

    /// Read-only view of the recorded scans, in append order.
    pub fn scans(&self) -> &[Scan] {
        &self.scans
    }

    /// Iterator over the raw signal values, in append order.
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.scans.iter().map(|scan| scan.signal)
    }

    /// Number of scans.
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Whether no scans are recorded.
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Immutable copy of the current contents.
    pub fn snapshot(&self) -> RecordingSnapshot {
        RecordingSnapshot {
            name: self.name.clone(),
            scan_delay_ms: self.scan_delay_ms,
            scan_interval_ms: self.scan_interval_ms,
            scans: self.scans.clone(),
        }
    }

    fn next_retention_time(&self) -> u64 {
        let index = self.scans.len() as u64;
        self.scan_delay_ms
            .saturating_add(index.saturating_mul(self.scan_interval_ms))
    }
}

/// Point-in-time copy of a recording, safe to hand to presentation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSnapshot {
    /// Display name.
    pub name: String,
    /// Scan delay at snapshot time.
    pub scan_delay_ms: u64,
    /// Scan interval at snapshot time.
    pub scan_interval_ms: u64,
    /// Scans in append order.
    pub scans: Vec<Scan>,
}

impl RecordingSnapshot {
    /// Signal values in append order.
    pub fn values(&self) -> Vec<f32> {
        self.scans.iter().map(|scan| scan.signal).collect()
    }

    /// Number of scans.
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Whether no scans are recorded.
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// Retention time of the last scan, if any.
    pub fn last_retention_time(&self) -> Option<u64> {
        self.scans.last().map(|scan| scan.retention_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> ChromatogramRecording {
        ChromatogramRecording::new("ulad3x-1", DEFAULT_SCAN_DELAY_MS, DEFAULT_SCAN_INTERVAL_MS)
            .unwrap()
    }

    #[test]
    fn zero_interval_rejected_on_creation() {
        assert!(ChromatogramRecording::new("x", 0, 0).is_err());
        assert!(ChromatogramRecording::new("x", 0, 1).is_ok());
    }

    #[test]
    fn append_preserves_order_and_timestamps() {
        let mut rec = recording();
        rec.extend_from_slice(&[1.0, 2.0, 3.0]);

        assert_eq!(rec.values().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
        let times: Vec<u64> = rec.scans().iter().map(|s| s.retention_time_ms).collect();
        assert_eq!(times, vec![100, 200, 300]);
    }

    #[test]
    fn reset_keeps_timing_and_name() {
        let mut rec = recording();
        rec.new_record(250, 50).unwrap();
        rec.extend_from_slice(&[1.0, 2.0]);

        rec.reset_recording();

        assert!(rec.is_empty());
        assert_eq!(rec.scan_delay(), 250);
        assert_eq!(rec.scan_interval(), 50);
        assert_eq!(rec.name(), "ulad3x-1");
    }

    #[test]
    fn new_record_reconfigures_and_clears() {
        let mut rec = recording();
        rec.append(4.2);

        rec.new_record(0, 20).unwrap();

        assert!(rec.is_empty());
        assert_eq!(rec.scan_delay(), 0);
        assert_eq!(rec.scan_interval(), 20);
    }

    #[test]
    fn failed_new_record_leaves_recording_untouched() {
        let mut rec = recording();
        rec.append(4.2);

        assert!(rec.new_record(10, 0).is_err());

        assert_eq!(rec.len(), 1);
        assert_eq!(rec.scan_delay(), DEFAULT_SCAN_DELAY_MS);
        assert_eq!(rec.scan_interval(), DEFAULT_SCAN_INTERVAL_MS);
    }

    #[test]
    fn set_scan_delay_keeps_existing_scans() {
        let mut rec = recording();
        rec.extend_from_slice(&[1.0, 2.0]);

        rec.set_scan_delay(1000);
        rec.append(3.0);

        let times: Vec<u64> = rec.scans().iter().map(|s| s.retention_time_ms).collect();
        assert_eq!(times, vec![100, 200, 1200]);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut rec = recording();
        rec.append(1.0);
        let snap = rec.snapshot();

        rec.append(2.0);

        assert_eq!(snap.values(), vec![1.0]);
        assert_eq!(snap.last_retention_time(), Some(100));
        assert_eq!(rec.len(), 2);
    }
}
