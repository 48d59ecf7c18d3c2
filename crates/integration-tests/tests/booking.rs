//! Booking flows: AWB assignment, idempotency, validation short-circuit.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use dogeared_core::Carrier;
use dogeared_shipping::ShippingError;
use dogeared_shipping::orchestrator::{ShipmentOptions, ShipmentOutcome};
use dogeared_shipping::order::{LabelStatus, ShipmentStatus};
use dogeared_shipping::store::{ArtifactStore, OrderStore};
use dogeared_integration_tests::fakes::BLUEDART_LABEL_BYTES;
use dogeared_integration_tests::{Harness, invalid_order, pending_order, rejected_order};

fn options(carrier: Carrier) -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(carrier),
        ..ShipmentOptions::default()
    }
}

#[tokio::test]
async fn test_booking_assigns_awb_and_persists_state() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("1001")).await;

    let outcome = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::Shiprocket))
        .await
        .unwrap();

    let ShipmentOutcome::Booked {
        awb_number,
        shipment_id,
    } = outcome
    else {
        panic!("expected a fresh booking");
    };
    assert!(awb_number.starts_with("SR"));
    assert!(shipment_id.is_some());

    let order = harness.orders.find_by_id(&id).await.unwrap().unwrap();
    let shipment = order.provider_shipment(Carrier::Shiprocket).unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Booked);
    assert_eq!(shipment.awb_number.as_deref(), Some(awb_number.as_str()));
    assert!(shipment.raw_response.is_some());
    assert_eq!(shipment.logs.len(), 1);

    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_create_skips_without_touching_the_carrier() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("1002")).await;
    let opts = options(Carrier::Shiprocket);

    let first = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &opts)
        .await
        .unwrap();
    let ShipmentOutcome::Booked { awb_number, .. } = first else {
        panic!("expected a fresh booking");
    };

    let second = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &opts)
        .await
        .unwrap();
    assert_eq!(
        second,
        ShipmentOutcome::Skipped {
            awb_number: awb_number.clone()
        }
    );
    // The skip happens on the stored state alone.
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bluedart_booking_stores_the_inline_label() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("1003")).await;

    let outcome = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::BlueDart))
        .await
        .unwrap();
    let ShipmentOutcome::Booked { awb_number, .. } = outcome else {
        panic!("expected a fresh booking");
    };

    let order = harness.orders.find_by_id(&id).await.unwrap().unwrap();
    let shipment = order.provider_shipment(Carrier::BlueDart).unwrap();
    assert_eq!(shipment.label_status, Some(LabelStatus::Generated));
    let url = shipment.label_url.clone().unwrap();
    assert!(url.contains(&awb_number));

    let stored = harness.artifacts.fetch(&url).await.unwrap().unwrap();
    assert_eq!(stored, BLUEDART_LABEL_BYTES);

    // The audit copy must not carry the label bytes.
    let raw = shipment.raw_response.as_ref().unwrap();
    assert!(raw.pointer("/GenerateWayBillResult/AWBPrintContent").is_none());
}

#[tokio::test]
async fn test_validation_failure_makes_no_network_calls() {
    let harness = Harness::start().await;
    let id = harness.seed_order(invalid_order("1004")).await;

    let err = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::Shiprocket))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(harness.shiprocket.state.login_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.shiprocket.state.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_carrier_rejection_is_recorded_and_retryable() {
    let harness = Harness::start().await;
    let id = harness.seed_order(rejected_order("1005")).await;

    let err = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::Shiprocket))
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        ShippingError::CarrierRejected { carrier: Carrier::Shiprocket, message, .. }
            if message.contains("pincode not serviceable")
    ));

    // The failure is persisted but the order stays bookable.
    let order = harness.orders.find_by_id(&id).await.unwrap().unwrap();
    let shipment = order.provider_shipment(Carrier::Shiprocket).unwrap();
    assert!(shipment.awb_number.is_none());
    assert_eq!(shipment.create_status.as_deref(), Some("failed"));
    assert!(shipment.create_error.is_some());
    assert_eq!(shipment.logs.len(), 1);
}

#[tokio::test]
async fn test_each_carrier_books_independently() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("1006")).await;

    let shiprocket = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::Shiprocket))
        .await
        .unwrap();
    let bluedart = harness
        .orchestrator
        .create_shipment(harness.owner, &id, &options(Carrier::BlueDart))
        .await
        .unwrap();

    assert!(matches!(shiprocket, ShipmentOutcome::Booked { .. }));
    assert!(matches!(bluedart, ShipmentOutcome::Booked { .. }));

    let order = harness.orders.find_by_id(&id).await.unwrap().unwrap();
    assert!(order.booked_awb(Carrier::Shiprocket).is_some());
    assert!(order.booked_awb(Carrier::BlueDart).is_some());
}
