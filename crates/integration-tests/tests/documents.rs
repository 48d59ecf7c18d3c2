//! Invoice and manifest document retrieval.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::Ordering;

use dogeared_core::Carrier;
use dogeared_integration_tests::{Harness, pending_order};
use dogeared_shipping::ShippingError;
use dogeared_shipping::orchestrator::ShipmentOptions;

fn with(carrier: Carrier) -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(carrier),
        ..ShipmentOptions::default()
    }
}

#[tokio::test]
async fn test_invoice_and_manifest_urls_come_from_the_carrier() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("6001")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &with(Carrier::Shiprocket))
        .await
        .unwrap();

    let invoice = harness
        .orchestrator
        .invoice(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert!(invoice.url.contains("cdn.shiprocket.test/invoices/"));

    let manifest = harness
        .orchestrator
        .manifest(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap();
    assert!(manifest.url.contains("cdn.shiprocket.test/manifests/"));

    assert_eq!(
        harness
            .shiprocket
            .state
            .document_calls
            .load(Ordering::SeqCst),
        2
    );
}

#[tokio::test]
async fn test_documents_require_a_booking() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("6002")).await;

    let err = harness
        .orchestrator
        .invoice(harness.owner, &id, Some(Carrier::Shiprocket))
        .await
        .unwrap_err();
    assert!(matches!(err, ShippingError::NotFound(_)));
    assert_eq!(
        harness
            .shiprocket
            .state
            .document_calls
            .load(Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_bluedart_has_no_document_endpoints() {
    let harness = Harness::start().await;
    let id = harness.seed_order(pending_order("6003")).await;
    harness
        .orchestrator
        .create_shipment(harness.owner, &id, &with(Carrier::BlueDart))
        .await
        .unwrap();

    let err = harness
        .orchestrator
        .invoice(harness.owner, &id, Some(Carrier::BlueDart))
        .await
        .unwrap_err();
    assert!(matches!(err, ShippingError::Validation(_)));
}
