//! Dogeared Core - Shared types library.
//!
//! This crate provides common types used across all Dogeared components:
//! - `shipping` - Carrier integration layer (booking, tracking, labels)
//! - `cli` - Command-line tools for operators
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, addresses, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
