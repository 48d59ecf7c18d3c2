//! Status enums shared across components.

use serde::{Deserialize, Serialize};

/// Payment status of an order as reported by the payment subsystem.
///
/// The shipment layer only reads this to derive the collect-on-delivery
/// amount; payment capture itself lives outside this repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment captured yet; full amount is collected on delivery.
    #[default]
    Pending,
    /// Part of the amount was captured online; the balance is collected
    /// on delivery.
    PartiallyPaid,
    /// Fully paid online; nothing to collect.
    Paid,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::PartiallyPaid => write!(f, "partially_paid"),
            Self::Paid => write!(f, "paid"),
        }
    }
}
