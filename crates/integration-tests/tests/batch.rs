//! Bulk operations: partial-failure isolation and skip reporting.

#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use dogeared_core::{Carrier, OrderId};
use dogeared_shipping::orchestrator::ShipmentOptions;
use dogeared_shipping::store::OrderStore;
use dogeared_integration_tests::{Harness, pending_order, rejected_order};

fn shiprocket() -> ShipmentOptions {
    ShipmentOptions {
        carrier: Some(Carrier::Shiprocket),
        ..ShipmentOptions::default()
    }
}

async fn seed_three(harness: &Harness) -> Vec<OrderId> {
    vec![
        harness.seed_order(pending_order("3001")).await,
        harness.seed_order(rejected_order("3002")).await,
        harness.seed_order(pending_order("3003")).await,
    ]
}

#[tokio::test]
async fn test_one_failure_does_not_poison_the_batch() {
    let harness = Harness::start().await;
    let ids = seed_three(&harness).await;

    let outcome = harness
        .batch
        .create_shipments(harness.owner, &ids, &shiprocket())
        .await;

    assert_eq!(outcome.success.len(), 2);
    assert_eq!(outcome.failed.len(), 1);
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.failed[0].order_id, ids[1]);
    assert!(outcome.failed[0].error.contains("pincode not serviceable"));

    // The siblings really booked.
    for id in [&ids[0], &ids[2]] {
        let order = harness.orders.find_by_id(id).await.unwrap().unwrap();
        assert!(order.booked_awb(Carrier::Shiprocket).is_some());
    }
}

#[tokio::test]
async fn test_rerun_reports_booked_orders_as_skips() {
    let harness = Harness::start().await;
    let ids = seed_three(&harness).await;

    harness
        .batch
        .create_shipments(harness.owner, &ids, &shiprocket())
        .await;
    let rerun = harness
        .batch
        .create_shipments(harness.owner, &ids, &shiprocket())
        .await;

    assert!(rerun.success.is_empty());
    assert_eq!(rerun.skipped.len(), 2);
    assert_eq!(rerun.failed.len(), 1);
    assert!(!rerun.is_clean());
}

#[tokio::test]
async fn test_batch_lifecycle_track_pickup_cancel() {
    let harness = Harness::start().await;
    let ids = vec![
        harness.seed_order(pending_order("3004")).await,
        harness.seed_order(pending_order("3005")).await,
    ];
    let booked = harness
        .batch
        .create_shipments(harness.owner, &ids, &shiprocket())
        .await;
    assert!(booked.is_clean());

    let tracked = harness
        .batch
        .track_shipments(harness.owner, &ids, Some(Carrier::Shiprocket))
        .await;
    assert_eq!(tracked.success.len(), 2);
    assert!(tracked.success.iter().all(|s| s.detail == "In Transit"));

    let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
    let pickups = harness
        .batch
        .schedule_pickups(harness.owner, &ids, date, Some(Carrier::Shiprocket))
        .await;
    assert_eq!(pickups.success.len(), 2);
    assert!(pickups.success.iter().all(|s| s.detail == "PK-7001"));

    let cancelled = harness
        .batch
        .cancel_shipments(harness.owner, &ids, Some(Carrier::Shiprocket))
        .await;
    assert_eq!(cancelled.success.len(), 2);

    // Cancelling again is a no-op success, not a failure.
    let again = harness
        .batch
        .cancel_shipments(harness.owner, &ids, Some(Carrier::Shiprocket))
        .await;
    assert!(again.is_clean());
    assert_eq!(again.success.len(), 2);
}

#[tokio::test]
async fn test_unknown_order_fails_only_its_item() {
    let harness = Harness::start().await;
    let known = harness.seed_order(pending_order("3006")).await;
    let ids = vec![known.clone(), OrderId::new("ord_missing")];

    let outcome = harness
        .batch
        .create_shipments(harness.owner, &ids, &shiprocket())
        .await;
    assert_eq!(outcome.success.len(), 1);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].order_id, ids[1]);
    assert!(outcome.failed[0].error.contains("not found"));
}
