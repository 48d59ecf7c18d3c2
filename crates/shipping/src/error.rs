//! Unified error handling for the shipping layer.

use dogeared_core::Carrier;
use thiserror::Error;

/// Error type covering every failure mode of the shipping layer.
///
/// The variants map onto distinct handling policies:
///
/// - [`Validation`](Self::Validation) - malformed shipment fields; never
///   retried, surfaced verbatim to the caller.
/// - [`Auth`](Self::Auth) - credential exchange failed; requires operator
///   intervention, never retried automatically.
/// - [`Transient`](Self::Transient) - 5xx/timeout after retries were
///   exhausted; becomes a failed batch item, never a crash.
/// - [`CarrierRejected`](Self::CarrierRejected) - the carrier accepted the
///   call but rejected the business content; surfaced with the carrier's
///   own message, not retried.
/// - [`AlreadyBooked`](Self::AlreadyBooked) - not actually an error; the
///   batch layer converts it to a `skipped` result.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// Shipment fields failed validation before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Carrier credential exchange failed.
    #[error("{carrier} authentication failed: {message}")]
    Auth {
        /// Carrier whose login flow failed.
        carrier: Carrier,
        /// Carrier-reported or transport-level failure detail.
        message: String,
    },

    /// Transient carrier failure (5xx or timeout) with retries exhausted.
    #[error("{carrier} {operation} failed after {attempts} attempts: {message}")]
    Transient {
        /// Carrier that failed.
        carrier: Carrier,
        /// Logical operation name (e.g. `waybill.create`).
        operation: &'static str,
        /// Total calls made, including the first.
        attempts: u32,
        /// Last observed failure detail.
        message: String,
    },

    /// The carrier rejected the business content of an accepted call.
    #[error("{carrier} rejected request{}: {message}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    CarrierRejected {
        /// Carrier that rejected the request.
        carrier: Carrier,
        /// Carrier error code, when one was present in the envelope.
        code: Option<String>,
        /// The carrier's own error message.
        message: String,
    },

    /// A shipment already exists for this order and provider.
    #[error("shipment already booked with AWB {awb}")]
    AlreadyBooked {
        /// The existing AWB number.
        awb: String,
    },

    /// Order/profile/artifact store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// Requested entity was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Label rendering or persistence failed.
    #[error("label error: {0}")]
    Label(String),

    /// Credential encryption/decryption failed.
    #[error("credential cipher error: {0}")]
    Crypto(String),
}

impl ShippingError {
    /// Whether this error came from the pre-network validation pass.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether this error is a transient carrier failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether this error should be reported as a `skipped` batch item
    /// rather than a failure.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::AlreadyBooked { .. })
    }

    /// Rebuild an error out of a `moka` cache failure, which hands back
    /// the original error behind an `Arc`.
    #[must_use]
    pub fn from_shared(err: &std::sync::Arc<Self>) -> Self {
        match err.as_ref() {
            Self::Auth { carrier, message } => Self::Auth {
                carrier: *carrier,
                message: message.clone(),
            },
            other => Self::Store(other.to_string()),
        }
    }
}
