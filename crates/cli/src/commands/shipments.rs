//! Shipment subcommands: book, track, pickup, cancel, label.

use chrono::NaiveDate;
use dogeared_core::{Carrier, OrderId};
use dogeared_shipping::batch::BatchOutcome;
use dogeared_shipping::orchestrator::ShipmentOptions;
use tracing::{error, info, warn};

use super::{CliError, Stack, order_ids};

/// Book shipments for the given orders.
pub async fn book(stack: &Stack, orders: &[String], carrier: Option<Carrier>) {
    let ids = order_ids(orders);
    let options = ShipmentOptions {
        carrier,
        ..ShipmentOptions::default()
    };
    let outcome = stack
        .batch
        .create_shipments(stack.owner, &ids, &options)
        .await;
    report(&outcome, "AWB");
}

/// Poll tracking for the given orders.
pub async fn track(stack: &Stack, orders: &[String], carrier: Option<Carrier>) {
    let ids = order_ids(orders);
    let outcome = stack.batch.track_shipments(stack.owner, &ids, carrier).await;
    report(&outcome, "status");
}

/// Register a carrier pickup for the given orders.
pub async fn pickup(stack: &Stack, orders: &[String], date: NaiveDate, carrier: Option<Carrier>) {
    let ids = order_ids(orders);
    let outcome = stack
        .batch
        .schedule_pickups(stack.owner, &ids, date, carrier)
        .await;
    report(&outcome, "confirmation");
}

/// Cancel bookings for the given orders.
pub async fn cancel(stack: &Stack, orders: &[String], carrier: Option<Carrier>) {
    let ids = order_ids(orders);
    let outcome = stack
        .batch
        .cancel_shipments(stack.owner, &ids, carrier)
        .await;
    report(&outcome, "result");
}

/// Fetch or generate the label for one order and print its URL.
pub async fn label(stack: &Stack, order: &str, carrier: Option<Carrier>) -> Result<(), CliError> {
    let id = OrderId::new(order);
    let url = stack
        .orchestrator
        .get_or_generate_label(stack.owner, &id, carrier)
        .await?;
    info!(order = %id, "Label ready: {url}");
    Ok(())
}

/// Print the three outcome buckets, one line per order.
fn report(outcome: &BatchOutcome, detail_name: &str) {
    for item in &outcome.success {
        info!(order = %item.order_id, "OK ({detail_name}: {})", item.detail);
    }
    for item in &outcome.skipped {
        warn!(
            order = %item.order_id,
            "Skipped: already booked as {}",
            item.awb_number
        );
    }
    for item in &outcome.failed {
        error!(order = %item.order_id, "Failed: {}", item.error);
    }
    info!(
        succeeded = outcome.success.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failed.len(),
        "Batch complete"
    );
}
