//! Retry budget and token refresh behavior, asserted on exact call counts.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use dogeared_core::Carrier;
use dogeared_shipping::ShippingError;
use dogeared_shipping::orchestrator::ShipmentOptions;
use dogeared_integration_tests::{Harness, pending_order};

fn shiprocket() -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(Carrier::Shiprocket),
        ..ShipmentOptions::default()
    }
}

#[tokio::test]
async fn test_server_errors_exhaust_the_retry_budget() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("2001")).await;
    harness
        .shiprocket
        .state
        .break_bookings
        .store(true, Ordering::SeqCst);

    let err = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &shiprocket())
        .await
        .unwrap_err();

    // Initial call plus the configured three retries, then give up.
    assert!(matches!(
        err,
        ShippingError::Transient {
            carrier: Carrier::Shiprocket,
            operation: "waybill.create",
            attempts: 4,
            ..
        }
    ));
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 4);
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stale_token_is_refreshed_and_replayed_once() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("2002")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &shiprocket())
        .await
        .unwrap();
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);

    // The gateway silently drops the session the client is still holding.
    harness.shiprocket.state.revoke_tokens().await;

    let snapshot = harness
        .orchestrator
        .track(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert_eq!(snapshot.status, "In Transit");

    // One 401, one re-login, one replay. Not a retry storm.
    assert_eq!(harness.shiprocket.state.track_calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_401_after_refresh_is_an_auth_error() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("2003")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &shiprocket())
        .await
        .unwrap();

    harness
        .shiprocket
        .state
        .reject_all_tokens
        .store(true, Ordering::SeqCst);
    let track_calls_before = harness.shiprocket.state.track_calls.load(Ordering::SeqCst);

    let err = harness
        .orchestrator
        .track(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShippingError::Auth {
            carrier: Carrier::Shiprocket,
            ..
        }
    ));
    // Exactly one replay after the refresh, then surrender.
    assert_eq!(
        harness.shiprocket.state.track_calls.load(Ordering::SeqCst),
        track_calls_before + 2
    );
}

#[tokio::test]
async fn test_rejected_login_never_reaches_the_business_route() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("2004")).await;
    harness
        .shiprocket
        .state
        .reject_logins
        .store(true, Ordering::SeqCst);

    let err = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &shiprocket())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ShippingError::Auth {
            carrier: Carrier::Shiprocket,
            ..
        }
    ));
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 0);
}
