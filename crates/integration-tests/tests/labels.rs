//! Label retrieval: carrier fetch, cached reuse, local synthesis fallback.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use dogeared_core::Carrier;
use dogeared_shipping::orchestrator::ShipmentOptions;
use dogeared_shipping::order::{LogKind, ShipmentLog};
use dogeared_shipping::store::{ArtifactStore, BookingRecord, ClaimOutcome, OrderStore};
use dogeared_integration_tests::{Harness, pending_order};
use serde_json::json;

fn shiprocket() -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(Carrier::Shiprocket),
        ..ShipmentOptions::default()
    }
}

#[tokio::test]
async fn test_label_is_fetched_from_the_carrier_once() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("5001")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &shiprocket())
        .await
        .unwrap();

    let url = harness
        .orchestrator
        .get_or_generate_label(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert!(url.contains("cdn.shiprocket.test"));
    assert_eq!(harness.shiprocket.state.label_calls.load(Ordering::SeqCst), 1);

    // Second call serves the stored URL without going back out.
    let again = harness
        .orchestrator
        .get_or_generate_label(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert_eq!(again, url);
    assert_eq!(harness.shiprocket.state.label_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_label_is_synthesized_when_the_carrier_has_none() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("5002")).await;

    // A booking that carries no carrier shipment id: there is nothing to
    // fetch, so the label must be synthesized locally.
    let claim = harness
        .orders
        .claim_booking(
            &id,
            Carrier::Shiprocket,
            BookingRecord {
                awb_number: "SRMANUAL1".to_string(),
                shipment_id: None,
                raw_response: json!({}),
                log: ShipmentLog::success(LogKind::WaybillCreate, None, None),
            },
        )
        .await
        .unwrap();
    assert_eq!(claim, ClaimOutcome::Claimed);

    let url = harness
        .orchestrator
        .get_or_generate_label(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert!(url.contains("label-SRMANUAL1.pdf"));
    assert_eq!(harness.shiprocket.state.label_calls.load(Ordering::SeqCst), 0);

    let bytes = harness.artifacts.fetch(&url).await.unwrap().unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_bluedart_label_needs_no_followup_call() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("5003")).await;
    harness
        .orchestrator
        .create_shipment(
            harness.owner,
            &id,
            &ShipmentOptions {
                carrier: Some(Carrier::BlueDart),
                ..ShipmentOptions::default()
            },
        )
        .await
        .unwrap();
    let calls_after_booking = harness.bluedart.state.create_calls.load(Ordering::SeqCst);

    // The inline booking label satisfies the request outright.
    let url = harness
        .orchestrator
        .get_or_generate_label(harness.owner, &id, Some(Carrier::BlueDart))
        .await
        .unwrap();
    assert!(url.starts_with("memory://"));
    assert_eq!(
        harness.bluedart.state.create_calls.load(Ordering::SeqCst),
        calls_after_booking
    );
}
