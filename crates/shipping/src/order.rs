//! The shipping-facing slice of an order.
//!
//! Orders are owned by the catalog/checkout subsystem; this layer reads the
//! commercial and address fields and writes the per-provider shipment
//! sub-documents. [`ProviderShipment`] is a dedicated value type with
//! explicit transition methods so the booking state machine cannot be
//! bypassed by free-form field assignment.

use chrono::{DateTime, Utc};
use dogeared_core::{Address, Carrier, Money, OrderId, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ShippingError;

/// An order as seen by the shipping layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Human-facing order number (printed on labels).
    pub number: String,
    /// Order total.
    pub amount: Money,
    /// Line items (titles and SKUs appear on synthesized labels).
    pub items: Vec<OrderItem>,
    /// Payment state, used to derive the collect-on-delivery amount.
    pub payment: PaymentInfo,
    /// Shipping address, dimensions and provider state.
    pub shipping: ShippingDetails,
}

impl Order {
    /// The provider sub-document for `carrier`, if one exists.
    #[must_use]
    pub const fn provider_shipment(&self, carrier: Carrier) -> Option<&ProviderShipment> {
        match carrier {
            Carrier::Shiprocket => self.shipping.shiprocket.as_ref(),
            Carrier::BlueDart => self.shipping.bluedart.as_ref(),
        }
    }

    /// Mutable access to the provider sub-document, creating it lazily.
    pub fn provider_shipment_mut(&mut self, carrier: Carrier) -> &mut ProviderShipment {
        let slot = match carrier {
            Carrier::Shiprocket => &mut self.shipping.shiprocket,
            Carrier::BlueDart => &mut self.shipping.bluedart,
        };
        slot.get_or_insert_with(ProviderShipment::default)
    }

    /// The AWB number already booked for `carrier`, if any.
    #[must_use]
    pub fn booked_awb(&self, carrier: Carrier) -> Option<&str> {
        self.provider_shipment(carrier)
            .and_then(|s| s.awb_number.as_deref())
    }
}

/// A single order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Stock-keeping unit.
    pub sku: String,
    /// Book title.
    pub title: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Per-unit price.
    pub unit_price: Money,
}

/// Payment state as reported by the payment subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaymentInfo {
    /// Payment status.
    pub status: PaymentStatus,
    /// Amount captured online so far.
    #[serde(default)]
    pub paid_amount: Money,
}

/// Shipping address, physical dimensions and per-provider state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingDetails {
    /// Consignee address block.
    #[serde(flatten)]
    pub consignee: Address,
    /// Actual weight in kilograms, when captured at packing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<Decimal>,
    /// Package length in centimeters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_cm: Option<Decimal>,
    /// Package breadth in centimeters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadth_cm: Option<Decimal>,
    /// Package height in centimeters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<Decimal>,
    /// Provider chosen for this order, when one was picked at checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Carrier>,
    /// Shiprocket booking state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shiprocket: Option<ProviderShipment>,
    /// Blue Dart booking state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bluedart: Option<ProviderShipment>,
}

/// Booking lifecycle state for one (order, provider) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// No booking attempted or last attempt failed.
    #[default]
    None,
    /// AWB issued and persisted.
    Booked,
    /// Terminal: booking cancelled with the carrier.
    Cancelled,
}

/// Label generation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    /// A label URL is stored on the order.
    Generated,
    /// The last label attempt failed.
    Failed,
}

/// Kind tag for audit log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    /// Shipment creation attempt.
    #[serde(rename = "waybill.create")]
    WaybillCreate,
    /// Tracking poll.
    #[serde(rename = "track")]
    Track,
    /// Pickup registration.
    #[serde(rename = "pickup")]
    Pickup,
    /// Cancellation attempt.
    #[serde(rename = "cancel")]
    Cancel,
    /// Label generation.
    #[serde(rename = "label")]
    Label,
}

/// One append-only audit entry on a provider sub-document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentLog {
    /// Operation this entry records.
    pub kind: LogKind,
    /// When the operation ran.
    pub at: DateTime<Utc>,
    /// Request payload sent to the carrier, when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<serde_json::Value>,
    /// Response payload from the carrier, when captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Error message, for failed operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShipmentLog {
    /// Entry recording a successful operation.
    #[must_use]
    pub fn success(
        kind: LogKind,
        request: Option<serde_json::Value>,
        response: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind,
            at: Utc::now(),
            request,
            response,
            error: None,
        }
    }

    /// Entry recording a failed operation.
    #[must_use]
    pub fn failure(kind: LogKind, request: Option<serde_json::Value>, error: String) -> Self {
        Self {
            kind,
            at: Utc::now(),
            request,
            response: None,
            error: Some(error),
        }
    }
}

/// Normalized tracking state from a carrier tracking poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSnapshot {
    /// Carrier-reported status string, retained verbatim.
    pub status: String,
    /// Last known location, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Timestamp of the carrier's last scan event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Whether the carrier reports the shipment delivered.
    #[serde(default)]
    pub delivered: bool,
}

/// Per-provider booking state stored on the order.
///
/// Created lazily on the first booking attempt; `logs` is append-only and
/// never shrinks. All mutation goes through the transition methods below,
/// which enforce the booking state machine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderShipment {
    /// Carrier-issued AWB number. Set at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub awb_number: Option<String>,
    /// Carrier-internal shipment/order id, when issued alongside the AWB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipment_id: Option<String>,
    /// Booking lifecycle state.
    #[serde(default)]
    pub status: ShipmentStatus,
    /// When the booking succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// `"failed"` after an unsuccessful booking attempt; cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_status: Option<String>,
    /// Error from the last failed booking attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_error: Option<String>,
    /// URL of the stored label artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_url: Option<String>,
    /// Label generation state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_status: Option<LabelStatus>,
    /// Append-only audit trail.
    #[serde(default)]
    pub logs: Vec<ShipmentLog>,
    /// Latest tracking snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tracking: Option<TrackingSnapshot>,
    /// When a pickup was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_scheduled_at: Option<DateTime<Utc>>,
    /// When the booking was cancelled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<DateTime<Utc>>,
    /// Full raw booking response, kept for audit/debugging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl ProviderShipment {
    /// Whether an AWB has been issued.
    #[must_use]
    pub fn is_booked(&self) -> bool {
        self.awb_number.as_deref().is_some_and(|awb| !awb.is_empty())
    }

    /// Transition `NONE -> BOOKED`.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::AlreadyBooked`] if an AWB already exists;
    /// the existing booking is never overwritten.
    pub fn mark_booked(
        &mut self,
        awb_number: String,
        shipment_id: Option<String>,
        raw_response: serde_json::Value,
        log: ShipmentLog,
    ) -> Result<(), ShippingError> {
        if let Some(existing) = self.awb_number.as_deref().filter(|a| !a.is_empty()) {
            return Err(ShippingError::AlreadyBooked {
                awb: existing.to_string(),
            });
        }
        self.awb_number = Some(awb_number);
        self.shipment_id = shipment_id;
        self.status = ShipmentStatus::Booked;
        self.created_at = Some(Utc::now());
        self.create_status = None;
        self.create_error = None;
        self.raw_response = Some(raw_response);
        self.logs.push(log);
        Ok(())
    }

    /// Record a failed booking attempt without touching the AWB.
    ///
    /// The order stays retryable: `awb_number` remains empty and a later
    /// `mark_booked` is permitted.
    pub fn mark_create_failed(&mut self, error: String, log: ShipmentLog) {
        self.create_status = Some("failed".to_string());
        self.create_error = Some(error);
        self.logs.push(log);
    }

    /// Transition `BOOKED -> CANCELLED` (terminal).
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Validation`] if no booking exists to cancel.
    pub fn mark_cancelled(&mut self, log: ShipmentLog) -> Result<(), ShippingError> {
        if !self.is_booked() {
            return Err(ShippingError::Validation(
                "cannot cancel: no shipment booked".to_string(),
            ));
        }
        self.status = ShipmentStatus::Cancelled;
        self.canceled_at = Some(Utc::now());
        self.logs.push(log);
        Ok(())
    }

    /// Record a tracking poll (non-terminal self-transition while booked).
    pub fn record_tracking(&mut self, snapshot: TrackingSnapshot, log: ShipmentLog) {
        self.last_tracking = Some(snapshot);
        self.logs.push(log);
    }

    /// Record a registered pickup.
    pub fn record_pickup(&mut self, scheduled_at: DateTime<Utc>, log: ShipmentLog) {
        self.pickup_scheduled_at = Some(scheduled_at);
        self.logs.push(log);
    }

    /// Record the outcome of a label generation attempt.
    pub fn record_label(&mut self, url: Option<String>, status: LabelStatus, log: ShipmentLog) {
        self.label_url = url;
        self.label_status = Some(status);
        self.logs.push(log);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booked() -> ProviderShipment {
        let mut shipment = ProviderShipment::default();
        shipment
            .mark_booked(
                "7X998877".to_string(),
                Some("SR-1".to_string()),
                json!({"awb": "7X998877"}),
                ShipmentLog::success(LogKind::WaybillCreate, None, None),
            )
            .unwrap();
        shipment
    }

    #[test]
    fn test_mark_booked_sets_state() {
        let shipment = booked();
        assert!(shipment.is_booked());
        assert_eq!(shipment.status, ShipmentStatus::Booked);
        assert_eq!(shipment.awb_number.as_deref(), Some("7X998877"));
        assert!(shipment.created_at.is_some());
        assert_eq!(shipment.logs.len(), 1);
    }

    #[test]
    fn test_second_booking_is_rejected() {
        let mut shipment = booked();
        let err = shipment
            .mark_booked(
                "OTHER".to_string(),
                None,
                json!({}),
                ShipmentLog::success(LogKind::WaybillCreate, None, None),
            )
            .unwrap_err();
        assert!(matches!(err, ShippingError::AlreadyBooked { awb } if awb == "7X998877"));
        // The original booking is untouched.
        assert_eq!(shipment.awb_number.as_deref(), Some("7X998877"));
    }

    #[test]
    fn test_failed_create_keeps_order_retryable() {
        let mut shipment = ProviderShipment::default();
        shipment.mark_create_failed(
            "pincode not serviceable".to_string(),
            ShipmentLog::failure(LogKind::WaybillCreate, None, "pincode".to_string()),
        );
        assert!(!shipment.is_booked());
        assert_eq!(shipment.create_status.as_deref(), Some("failed"));

        // A later booking succeeds and clears the failure markers.
        shipment
            .mark_booked(
                "7X1".to_string(),
                None,
                json!({}),
                ShipmentLog::success(LogKind::WaybillCreate, None, None),
            )
            .unwrap();
        assert!(shipment.create_status.is_none());
        assert!(shipment.create_error.is_none());
        assert_eq!(shipment.logs.len(), 2);
    }

    #[test]
    fn test_cancel_requires_booking() {
        let mut shipment = ProviderShipment::default();
        let err = shipment
            .mark_cancelled(ShipmentLog::success(LogKind::Cancel, None, None))
            .unwrap_err();
        assert!(matches!(err, ShippingError::Validation(_)));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut shipment = booked();
        shipment
            .mark_cancelled(ShipmentLog::success(LogKind::Cancel, None, None))
            .unwrap();
        assert_eq!(shipment.status, ShipmentStatus::Cancelled);
        assert!(shipment.canceled_at.is_some());
    }

    #[test]
    fn test_logs_are_append_only_across_transitions() {
        let mut shipment = booked();
        shipment.record_tracking(
            TrackingSnapshot {
                status: "In Transit".to_string(),
                location: Some("Nagpur Hub".to_string()),
                last_update: None,
                delivered: false,
            },
            ShipmentLog::success(LogKind::Track, None, None),
        );
        shipment.record_pickup(Utc::now(), ShipmentLog::success(LogKind::Pickup, None, None));
        assert_eq!(shipment.logs.len(), 3);
    }

    #[test]
    fn test_log_kind_wire_tags() {
        let json = serde_json::to_string(&LogKind::WaybillCreate).unwrap();
        assert_eq!(json, "\"waybill.create\"");
    }
}
