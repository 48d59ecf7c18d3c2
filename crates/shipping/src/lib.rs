//! Dogeared shipping - carrier integration layer.
//!
//! Books, tracks, and cancels shipments against two carrier APIs
//! (Shiprocket and Blue Dart), normalizes their request/response shapes,
//! and persists booking state onto orders.
//!
//! # Architecture
//!
//! - [`config`] - environment-driven configuration with secret validation
//! - [`crypto`] - at-rest encryption for carrier passwords and license keys
//! - [`profile`] - per-admin carrier credential profiles
//! - [`token`] - token cache hiding the two carriers' auth lifecycles
//! - [`carriers`] - per-carrier HTTP clients with retry and normalization
//! - [`store`] - order/profile/artifact store traits + in-memory backends
//! - [`orchestrator`] - idempotent order-to-carrier booking authority
//! - [`label`] - shipping label storage and local PDF synthesis
//! - [`batch`] - bulk operations with per-item partial-failure reporting
//!
//! # Idempotency
//!
//! At most one AWB number is ever persisted per (order, provider). The
//! orchestrator guards on the existing sub-document and the order store's
//! [`store::OrderStore::claim_booking`] compare-and-set closes the race
//! between concurrent create calls for the same order.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod batch;
pub mod carriers;
pub mod config;
pub mod crypto;
pub mod error;
pub mod label;
pub mod orchestrator;
pub mod order;
pub mod profile;
pub mod request;
pub mod retry;
pub mod store;
pub mod token;

pub use batch::{BatchController, BatchFailure, BatchOutcome, BatchSkip, BatchSuccess};
pub use config::{ConfigError, ShippingConfig};
pub use error::ShippingError;
pub use label::LabelRenderer;
pub use orchestrator::{ShipmentOptions, ShipmentOrchestrator, ShipmentOutcome};
pub use token::TokenManager;
