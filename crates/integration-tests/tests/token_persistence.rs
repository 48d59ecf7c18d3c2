//! Token lifecycle across process restarts.
//!
//! Shiprocket sessions are persisted to the profile store and must be
//! adopted by a fresh token manager; Blue Dart JWTs are process-local and
//! must be re-acquired.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use dogeared_core::Carrier;
use dogeared_shipping::orchestrator::ShipmentOptions;
use dogeared_integration_tests::{Harness, pending_order};

fn options(carrier: Carrier) -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(carrier),
        ..ShipmentOptions::default()
    }
}

#[tokio::test]
async fn test_shiprocket_session_survives_a_restart() {
    let mut harness = Harness::start().await;
    let id = harness.seed_order(pending_order("4001")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::Shiprocket))
        .await
        .unwrap();
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);

    harness.restart();

    let snapshot = harness
        .orchestrator
        .track(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert_eq!(snapshot.status, "In Transit");
    // The persisted session was adopted; no second login.
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bluedart_jwt_is_reacquired_after_a_restart() {
    let mut harness = Harness::start().await;
    let id = harness.seed_order(pending_order("4002")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::BlueDart))
        .await
        .unwrap();
    assert_eq!(harness.bluedart.state.login_calls.load(Ordering::SeqCst), 1);

    harness.restart();

    harness
        .orchestrator
        .track(harness.owner, &id, Some(Carrier::BlueDart))
        .await
        .unwrap();
    assert_eq!(harness.bluedart.state.login_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_token_is_shared_across_calls_within_a_process() {
    let harness = Harness::start().await;
    let first = harness.seed_order(pending_order("4003")).await;
    let second = harness.seed_order(pending_order("4004")).await;

    for id in [&first, &second] {
        harness
            .orchestrator
            .create_shipment(harness.owner, id, &options(Carrier::Shiprocket))
            .await
            .unwrap();
    }
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verify_credentials_reports_expiry() {
    let harness = Harness::start().await;
    let profiles = {
        use dogeared_shipping::store::ProfileStore;
        harness.profiles.list(harness.owner).await.unwrap()
    };
    for profile in profiles {
        let expires_at = harness
            .orchestrator
            .verify_credentials(&profile)
            .await
            .unwrap();
        assert!(expires_at > chrono::Utc::now());
    }
}
