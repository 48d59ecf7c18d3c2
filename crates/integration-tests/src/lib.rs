//! End-to-end tests for the shipping layer against fake carrier gateways.
//!
//! The fakes in [`fakes`] serve the real Shiprocket and Blue Dart routes on
//! ephemeral local ports and count every hit, so tests can assert not just
//! on outcomes but on the exact number of network calls (idempotency, retry
//! budgets, token replay). [`harness::Harness`] wires the full stack -
//! in-memory stores, token manager, orchestrator, batch layer - against
//! them.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

pub mod fakes;
pub mod harness;

use dogeared_core::{Address, Money, OrderId, PaymentStatus};
use dogeared_shipping::order::{Order, OrderItem, PaymentInfo, ShippingDetails};

pub use harness::Harness;

/// A valid consignee address in Bengaluru.
#[must_use]
pub fn consignee() -> Address {
    Address {
        name: "Asha Rao".to_string(),
        phone: "9876543210".to_string(),
        email: Some("asha@example.in".to_string()),
        address: "22 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
    }
}

/// A pending (cash-on-delivery) order that passes validation.
#[must_use]
pub fn pending_order(id: &str) -> Order {
    Order {
        id: OrderId::new(id),
        number: format!("DG-{id}"),
        amount: Money::from(750),
        items: vec![OrderItem {
            sku: "BK-1097".to_string(),
            title: "The Remains of the Day".to_string(),
            quantity: 1,
            unit_price: Money::from(750),
        }],
        payment: PaymentInfo {
            status: PaymentStatus::Pending,
            paid_amount: Money::ZERO,
        },
        shipping: ShippingDetails {
            consignee: consignee(),
            weight_kg: None,
            length_cm: None,
            breadth_cm: None,
            height_cm: None,
            provider: None,
            shiprocket: None,
            bluedart: None,
        },
    }
}

/// A fully paid order (prepaid shipment).
#[must_use]
pub fn paid_order(id: &str) -> Order {
    let mut order = pending_order(id);
    order.payment = PaymentInfo {
        status: PaymentStatus::Paid,
        paid_amount: order.amount,
    };
    order
}

/// An order whose number makes the fake Shiprocket reject the booking.
#[must_use]
pub fn rejected_order(id: &str) -> Order {
    let mut order = pending_order(id);
    order.number = format!("DG-REJECT-{id}");
    order
}

/// An order that fails field validation before any network call.
#[must_use]
pub fn invalid_order(id: &str) -> Order {
    let mut order = pending_order(id);
    order.shipping.consignee.pincode = "56".to_string();
    order
}
