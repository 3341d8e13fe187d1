//! Hardware integration tests for hrmon-core
//!
//! These tests require actual BLE hardware and a heart-rate sensor that is
//! awake and advertising (wear the strap). Run them with:
//! ```
//! cargo test --package hrmon-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! `HRMON_SCAN_SECS` overrides the scan duration (default 20).

use std::env;
use std::time::Duration;

use hrmon_core::{
    ActionLabel, ActorConfig, Bluetooth, BtleplugBluetooth, DeviceFilter, MeasurementCharacteristic,
    PresentationState, ScanOptions, SensorDevice, Session, decode,
};
use hrmon_core::uuids::{HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

fn bluetooth() -> BtleplugBluetooth {
    let secs = env::var("HRMON_SCAN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    BtleplugBluetooth::with_options(ScanOptions::new().duration(Duration::from_secs(secs)))
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_adapter_available() {
    match bluetooth().availability().await {
        Ok(()) => println!("Bluetooth adapter available"),
        Err(e) => panic!("No usable adapter: {}", e),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_discover_connect_and_read() {
    let bluetooth = bluetooth();
    let device = bluetooth
        .request_device(&DeviceFilter::heart_rate())
        .await
        .expect("no sensor found");
    println!("Found {:?} ({})", device.name(), device.identifier());

    timeout(BLE_TIMEOUT, device.connect_gatt())
        .await
        .expect("connect timed out")
        .expect("connect failed");
    let characteristic = device
        .characteristic(HEART_RATE_SERVICE, HEART_RATE_MEASUREMENT)
        .await
        .expect("measurement characteristic missing");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    characteristic
        .on_value_changed(std::sync::Arc::new(move || {
            let _ = tx.send(());
        }))
        .await
        .unwrap();
    characteristic.start_notifications().await.unwrap();

    for _ in 0..3 {
        timeout(BLE_TIMEOUT, rx.recv())
            .await
            .expect("no notification received");
        let raw = characteristic.read_value().await.unwrap();
        let sample = decode(&raw).expect("sensor sent an invalid frame");
        println!("  {}", sample);
        assert!(sample.bpm > 0);
    }

    characteristic.stop_notifications().await.unwrap();
    device.disconnect().await.unwrap();
}

async fn until_label(states: &mut UnboundedReceiver<PresentationState>, label: ActionLabel) {
    loop {
        let state = timeout(BLE_TIMEOUT, states.recv())
            .await
            .expect("view stalled")
            .expect("view closed");
        for failure in &state.failures {
            println!("  failure: {}", failure);
        }
        if state.label == label && !state.busy {
            return;
        }
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_session_streams_samples() {
    let (view, mut states) = tokio::sync::mpsc::unbounded_channel();
    let session = Session::spawn(bluetooth(), view, ActorConfig::default()).unwrap();

    for label in [ActionLabel::Pair, ActionLabel::Connect, ActionLabel::Start] {
        until_label(&mut states, label).await;
        session.press();
    }
    until_label(&mut states, ActionLabel::Stop).await;

    let sample = loop {
        let state = timeout(BLE_TIMEOUT, states.recv()).await.unwrap().unwrap();
        if let Some(sample) = state.latest {
            break sample;
        }
    };
    println!("Streaming: {}", sample);

    session.press();
    until_label(&mut states, ActionLabel::Start).await;
    session.shutdown().await;
}
