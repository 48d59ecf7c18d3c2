//! Bulk operations with per-item partial-failure reporting.
//!
//! Every batch call fans out over the orchestrator with bounded
//! concurrency and reports three buckets: `success`, `skipped` and
//! `failed`. One item's error is caught and recorded; siblings are
//! unaffected, and nothing escapes a batch call as an `Err`.

use std::sync::Arc;

use chrono::NaiveDate;
use dogeared_core::{Carrier, OrderId, OwnerId};
use futures::{StreamExt, stream};
use tracing::instrument;

use crate::config::ShippingConfig;
use crate::error::ShippingError;
use crate::orchestrator::{ShipmentOptions, ShipmentOrchestrator, ShipmentOutcome};

/// One order that completed its operation.
#[derive(Debug, Clone)]
pub struct BatchSuccess {
    /// The order.
    pub order_id: OrderId,
    /// Operation-specific detail: the AWB for bookings, the status for
    /// tracking polls, the confirmation for pickups.
    pub detail: String,
}

/// One order skipped because a booking already existed.
#[derive(Debug, Clone)]
pub struct BatchSkip {
    /// The order.
    pub order_id: OrderId,
    /// The pre-existing AWB number.
    pub awb_number: String,
}

/// One order whose operation failed.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// The order.
    pub order_id: OrderId,
    /// The error, rendered for operators.
    pub error: String,
}

/// Per-item results of a bulk operation.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Orders that completed.
    pub success: Vec<BatchSuccess>,
    /// Orders skipped as already booked (never reported as failures).
    pub skipped: Vec<BatchSkip>,
    /// Orders that failed, with their individual errors.
    pub failed: Vec<BatchFailure>,
}

impl BatchOutcome {
    /// Whether every item completed or was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total items reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.success.len() + self.skipped.len() + self.failed.len()
    }

    /// Whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one item produced, before bucketing.
enum ItemOutcome {
    Done(String),
    Skipped(String),
}

/// Fans bulk operations out over the orchestrator.
pub struct BatchController {
    orchestrator: Arc<ShipmentOrchestrator>,
    concurrency: usize,
}

impl std::fmt::Debug for BatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchController")
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl BatchController {
    /// Create a controller with the configured fan-out cap.
    ///
    /// A concurrency of 1 degrades to sequential processing.
    #[must_use]
    pub fn new(orchestrator: Arc<ShipmentOrchestrator>, config: &ShippingConfig) -> Self {
        Self {
            orchestrator,
            concurrency: config.batch_concurrency.max(1),
        }
    }

    /// Book shipments for many orders.
    #[instrument(skip_all, fields(%owner, orders = order_ids.len()))]
    pub async fn create_shipments(
        &self,
        owner: OwnerId,
        order_ids: &[OrderId],
        options: &ShipmentOptions,
    ) -> BatchOutcome {
        self.run(order_ids, |id| async move {
            match self
                .orchestrator
                .create_shipment(owner, &id, options)
                .await?
            {
                ShipmentOutcome::Booked { awb_number, .. } => Ok(ItemOutcome::Done(awb_number)),
                ShipmentOutcome::Skipped { awb_number } => Ok(ItemOutcome::Skipped(awb_number)),
            }
        })
        .await
    }

    /// Poll tracking for many orders.
    #[instrument(skip_all, fields(%owner, orders = order_ids.len()))]
    pub async fn track_shipments(
        &self,
        owner: OwnerId,
        order_ids: &[OrderId],
        carrier: Option<Carrier>,
    ) -> BatchOutcome {
        self.run(order_ids, |id| async move {
            let snapshot = self.orchestrator.track(owner, &id, carrier).await?;
            Ok(ItemOutcome::Done(snapshot.status))
        })
        .await
    }

    /// Register pickups for many orders on one date.
    #[instrument(skip_all, fields(%owner, orders = order_ids.len(), %pickup_date))]
    pub async fn schedule_pickups(
        &self,
        owner: OwnerId,
        order_ids: &[OrderId],
        pickup_date: NaiveDate,
        carrier: Option<Carrier>,
    ) -> BatchOutcome {
        self.run(order_ids, |id| async move {
            let confirmation = self
                .orchestrator
                .schedule_pickup(owner, &id, pickup_date, carrier)
                .await?;
            Ok(ItemOutcome::Done(
                confirmation
                    .confirmation
                    .unwrap_or_else(|| "registered".to_string()),
            ))
        })
        .await
    }

    /// Cancel bookings for many orders.
    #[instrument(skip_all, fields(%owner, orders = order_ids.len()))]
    pub async fn cancel_shipments(
        &self,
        owner: OwnerId,
        order_ids: &[OrderId],
        carrier: Option<Carrier>,
    ) -> BatchOutcome {
        self.run(order_ids, |id| async move {
            self.orchestrator.cancel(owner, &id, carrier).await?;
            Ok(ItemOutcome::Done("cancelled".to_string()))
        })
        .await
    }

    /// Fan `op` out over the orders with bounded concurrency and bucket
    /// the per-item results.
    async fn run<'a, F, Fut>(&'a self, order_ids: &[OrderId], op: F) -> BatchOutcome
    where
        F: Fn(OrderId) -> Fut,
        Fut: std::future::Future<Output = Result<ItemOutcome, ShippingError>> + 'a,
    {
        let results: Vec<(OrderId, Result<ItemOutcome, ShippingError>)> =
            stream::iter(order_ids.iter().cloned())
                .map(|id| {
                    let fut = op(id.clone());
                    async move { (id, fut.await) }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        bucket(results)
    }
}

/// Sort per-item results into the three outcome buckets.
///
/// `AlreadyBooked` is not a failure: an operator re-running a batch over
/// orders that partly succeeded last time must see those as skips.
fn bucket(results: Vec<(OrderId, Result<ItemOutcome, ShippingError>)>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (order_id, result) in results {
        match result {
            Ok(ItemOutcome::Done(detail)) => {
                outcome.success.push(BatchSuccess { order_id, detail });
            }
            Ok(ItemOutcome::Skipped(awb_number)) => {
                outcome.skipped.push(BatchSkip {
                    order_id,
                    awb_number,
                });
            }
            Err(ShippingError::AlreadyBooked { awb }) => {
                outcome.skipped.push(BatchSkip {
                    order_id,
                    awb_number: awb,
                });
            }
            Err(err) => {
                outcome.failed.push(BatchFailure {
                    order_id,
                    error: err.to_string(),
                });
            }
        }
    }
    outcome
}
