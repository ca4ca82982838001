//! Integration tests for AcquisitionController
//!
//! These tests drive the controller through the mock channel and verify the recording
//! contract: batches are recorded exactly while recording, in arrival order, atomically
//! with respect to stop/reset, and never after disconnect returns.

use chroma_daq::error::{ChannelError, ChannelErrorKind, DeliveryFailure, DeliveryFailureKind};
use chroma_daq::hardware::{ControlDevice, MockSampleSource, SampleSource};
use chroma_daq::{AcquisitionController, AcquisitionError, ConnectionState, RecordingState};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn setup() -> (Arc<MockSampleSource>, AcquisitionController) {
    let source = Arc::new(MockSampleSource::new("mock:ulad3x"));
    let controller =
        AcquisitionController::new(ControlDevice::new("ulad3x"), source.clone()).unwrap();
    (source, controller)
}

// =============================================================================
// Recording contract
// =============================================================================

#[test]
fn test_start_record_stop_discards_later_batches() {
    let (_source, controller) = setup();

    controller.start(false);
    controller.on_sample_batch(&[1.0, 2.0, 3.0]);
    assert_eq!(controller.samples(), vec![1.0, 2.0, 3.0]);

    controller.stop();
    controller.on_sample_batch(&[4.0]);
    assert_eq!(controller.samples(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_start_with_reset_clears_existing_samples() {
    let (_source, controller) = setup();
    controller.start(false);
    controller.on_sample_batch(&[1.0]);
    controller.stop();

    controller.start(true);
    assert!(controller.samples().is_empty());
}

#[test]
fn test_new_record_without_delay_uses_defaults() {
    let (_source, controller) = setup();
    controller.new_record(Some(40)).unwrap();
    controller.start(false);
    controller.on_sample_batch(&[1.0]);

    controller.new_record(None).unwrap();
    assert_eq!(controller.scan_delay(), 100);
    assert_eq!(controller.scan_interval(), 100);
    assert_eq!(controller.sample_count(), 0);
}

#[test]
fn test_recorded_sequence_matches_model() {
    // Random interleavings of control calls and batches, checked against a trivial model.
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..50 {
        let (_source, controller) = setup();
        let mut expected: Vec<f32> = Vec::new();
        let mut recording = false;
        let mut next_value = 0.0f32;

        for _ in 0..200 {
            match rng.gen_range(0..10) {
                0 => {
                    let reset = rng.gen_bool(0.3);
                    controller.start(reset);
                    if reset {
                        expected.clear();
                    }
                    recording = true;
                }
                1 => {
                    controller.stop();
                    recording = false;
                }
                2 => {
                    controller.reset();
                    expected.clear();
                }
                3 => {
                    controller.set_scan_delay(rng.gen_range(0..1000));
                }
                _ => {
                    let len = rng.gen_range(0..8);
                    let batch: Vec<f32> = (0..len)
                        .map(|_| {
                            next_value += 1.0;
                            next_value
                        })
                        .collect();
                    controller.on_sample_batch(&batch);
                    if recording {
                        expected.extend_from_slice(&batch);
                    }
                }
            }
            assert_eq!(controller.is_recording(), recording);
        }

        assert_eq!(controller.samples(), expected);
    }
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_with_closed_medium_is_silent_noop() {
    let source = Arc::new(MockSampleSource::closed("mock"));
    let controller = AcquisitionController::new(ControlDevice::new("d"), source.clone()).unwrap();

    controller.connect().await.unwrap();

    assert!(!controller.is_connected());
    assert_eq!(source.activation_count(), 0);
}

#[tokio::test]
async fn test_connect_failure_propagates() {
    let (source, controller) = setup();
    source.fail_next_activation(ChannelError::new(
        "mock:ulad3x",
        ChannelErrorKind::Rejected,
        "filter already active",
    ));

    let err = controller.connect().await.unwrap_err();
    assert!(matches!(
        err,
        AcquisitionError::Channel(ChannelError {
            kind: ChannelErrorKind::Rejected,
            ..
        })
    ));
    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);

    // Retrying succeeds once the transport accepts.
    controller.connect().await.unwrap();
    assert!(controller.is_connected());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (source, controller) = setup();
    controller.disconnect().await;
    assert!(!controller.is_connected());

    controller.connect().await.unwrap();
    controller.disconnect().await;
    controller.disconnect().await;
    assert!(!controller.is_connected());
    assert!(!source.is_active());
}

#[tokio::test]
async fn test_channel_batches_recorded_in_arrival_order() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    controller.start(false);

    let deliverer = {
        let source = source.clone();
        thread::spawn(move || {
            source.deliver(&[1.0]);
            source.deliver(&[2.0]);
        })
    };
    deliverer.join().unwrap();

    assert_eq!(controller.samples(), vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_recording_without_connection_is_permitted() {
    let (source, controller) = setup();
    controller.start(false);
    assert_eq!(controller.recording_state(), RecordingState::Recording);

    // Channel not connected: nothing arrives.
    assert!(!source.deliver(&[1.0]));
    assert!(controller.samples().is_empty());
}

#[tokio::test]
async fn test_no_samples_after_disconnect_returns() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    controller.start(false);
    source.deliver(&[1.0]);

    // A callback captured before disconnect and completing afterwards.
    let in_flight = source.current_handler().unwrap();
    controller.disconnect().await;
    in_flight.on_batch(&[2.0]);

    assert_eq!(controller.samples(), vec![1.0]);
    assert!(controller.is_recording());
}

#[tokio::test]
async fn test_stale_handler_suppressed_after_reconnect() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    let first = source.current_handler().unwrap();
    controller.disconnect().await;

    controller.connect().await.unwrap();
    controller.start(false);
    first.on_batch(&[9.0]);
    source.deliver(&[1.0]);

    assert_eq!(controller.samples(), vec![1.0]);
    assert_eq!(source.activation_count(), 2);
}

#[tokio::test]
async fn test_deactivation_failure_still_disconnects() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    controller.start(false);
    let in_flight = source.current_handler().unwrap();
    source.fail_next_deactivation(ChannelError::new(
        "mock:ulad3x",
        ChannelErrorKind::Transport,
        "close request timed out",
    ));

    controller.disconnect().await;

    assert_eq!(controller.connection_state(), ConnectionState::Disconnected);
    in_flight.on_batch(&[7.0]);
    assert!(controller.samples().is_empty());

    // The failed close does not prevent a later reconnect.
    controller.connect().await.unwrap();
    assert!(controller.is_connected());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_delivery_stops_at_disconnect() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    controller.start(false);

    let running = Arc::new(AtomicBool::new(true));
    let deliverer = {
        let source = source.clone();
        let running = running.clone();
        thread::spawn(move || {
            let mut value = 0.0f32;
            while running.load(Ordering::SeqCst) {
                value += 1.0;
                source.deliver(&[value]);
                if let Some(handler) = source.current_handler() {
                    handler.on_batch(&[value]);
                }
            }
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    controller.disconnect().await;
    let after_disconnect = controller.sample_count();

    tokio::time::sleep(Duration::from_millis(20)).await;
    running.store(false, Ordering::SeqCst);
    deliverer.join().unwrap();

    assert_eq!(controller.sample_count(), after_disconnect);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_batches_applied_atomically_under_concurrent_control() {
    const BATCH: usize = 16;
    let (_source, controller) = setup();
    let controller = Arc::new(controller);
    controller.start(false);

    let deliverers: Vec<_> = (0..4)
        .map(|t| {
            let controller = controller.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let value = (t * 1000 + i) as f32;
                    controller.on_sample_batch(&[value; BATCH]);
                }
            })
        })
        .collect();

    let toggler = {
        let controller = controller.clone();
        thread::spawn(move || {
            for i in 0..200 {
                controller.stop();
                controller.start(i % 10 == 0);
                if i % 7 == 0 {
                    controller.reset();
                }
            }
        })
    };

    for handle in deliverers {
        handle.join().unwrap();
    }
    toggler.join().unwrap();

    let samples = controller.samples();
    assert_eq!(samples.len() % BATCH, 0);
    for chunk in samples.chunks(BATCH) {
        assert!(chunk.iter().all(|v| *v == chunk[0]), "torn batch: {:?}", chunk);
    }
}

// =============================================================================
// Delivery failures
// =============================================================================

#[tokio::test]
async fn test_delivery_failures_reported_not_propagated() {
    let (source, controller) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let controller = {
        let seen = seen.clone();
        controller.with_failure_hook(Arc::new(move |failure: &DeliveryFailure| {
            seen.lock().push(failure.clone());
        }))
    };

    controller.connect().await.unwrap();
    controller.start(false);
    source.deliver(&[1.0]);
    source.fail(DeliveryFailure::new(DeliveryFailureKind::Read, "frame lost"));
    source.deliver(&[2.0]);

    assert_eq!(controller.delivery_failures(), 1);
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(seen.lock()[0].kind, DeliveryFailureKind::Read);
    assert!(controller.is_recording());
    assert_eq!(controller.samples(), vec![1.0, 2.0]);
}

#[tokio::test]
async fn test_failures_from_stale_handler_not_counted() {
    let (source, controller) = setup();
    controller.connect().await.unwrap();
    let first = source.current_handler().unwrap();
    controller.disconnect().await;

    first.on_failure(DeliveryFailure::new(DeliveryFailureKind::Read, "late read"));
    assert_eq!(controller.delivery_failures(), 0);

    controller.connect().await.unwrap();
    first.on_failure(DeliveryFailure::new(DeliveryFailureKind::Decode, "late frame"));
    assert_eq!(controller.delivery_failures(), 0);

    source.fail(DeliveryFailure::new(DeliveryFailureKind::Read, "current"));
    assert_eq!(controller.delivery_failures(), 1);
}

#[tokio::test]
async fn test_source_trait_object_usage() {
    let source: Arc<dyn SampleSource> = Arc::new(MockSampleSource::new("mock"));
    assert!(source.is_channel_open());
    assert_eq!(source.channel_id(), "mock");

    let controller = AcquisitionController::new(ControlDevice::new("d"), source).unwrap();
    controller.connect().await.unwrap();
    assert!(controller.is_connected());
}
