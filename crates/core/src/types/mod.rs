//! Core types for Dogeared.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod carrier;
pub mod id;
pub mod money;
pub mod status;

pub use address::Address;
pub use carrier::{Carrier, CarrierParseError};
pub use id::*;
pub use money::Money;
pub use status::PaymentStatus;
