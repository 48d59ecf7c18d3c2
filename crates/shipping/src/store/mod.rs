//! Collaborator store interfaces.
//!
//! The durable backends for orders, profiles and artifacts live outside
//! this repository; the shipping layer consumes them through these async
//! traits. In-memory reference implementations ship in [`memory`] and back
//! the CLI fixtures and the test suites.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dogeared_core::{Carrier, OrderId, OwnerId, ProfileId};

use crate::error::ShippingError;
use crate::order::{LabelStatus, Order, ShipmentLog, TrackingSnapshot};
use crate::profile::{CarrierProfile, PersistedSession};

pub use memory::{MemoryArtifactStore, MemoryOrderStore, MemoryProfileStore};

/// Outcome of the conditional booking write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The booking was persisted; no AWB existed before.
    Claimed,
    /// Another booking already holds the slot; nothing was written.
    AlreadyBooked {
        /// The pre-existing AWB number.
        awb: String,
    },
}

/// The fields persisted atomically on a successful booking.
#[derive(Debug, Clone)]
pub struct BookingRecord {
    /// Carrier-issued AWB number.
    pub awb_number: String,
    /// Carrier-internal shipment id, when issued.
    pub shipment_id: Option<String>,
    /// Full raw booking response, for audit.
    pub raw_response: serde_json::Value,
    /// The `waybill.create` log entry.
    pub log: ShipmentLog,
}

/// A non-booking write to the provider sub-document.
///
/// Each variant carries its log entry so field write and audit append
/// happen in the same store operation.
#[derive(Debug, Clone)]
pub enum ShipmentUpdate {
    /// Persist a tracking poll result.
    Tracking {
        snapshot: TrackingSnapshot,
        log: ShipmentLog,
    },
    /// Persist a registered pickup.
    PickupScheduled {
        scheduled_at: DateTime<Utc>,
        log: ShipmentLog,
    },
    /// Persist a cancellation (terminal).
    Cancelled { log: ShipmentLog },
    /// Persist the outcome of a label attempt.
    Label {
        url: Option<String>,
        status: LabelStatus,
        log: ShipmentLog,
    },
    /// Persist a failed booking attempt without touching the AWB.
    CreateFailed { error: String, log: ShipmentLog },
}

/// Order persistence as consumed by the shipping layer.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load one order.
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, ShippingError>;

    /// List orders for a provider, filtered on booking state.
    async fn find_with_provider(
        &self,
        carrier: Carrier,
        booked: bool,
    ) -> Result<Vec<Order>, ShippingError>;

    /// Conditionally persist a booking: set the AWB only if none exists.
    ///
    /// This is the compare-and-set that closes the race between two
    /// concurrent create calls for the same order. Implementations must
    /// make the absence check and the write atomic.
    async fn claim_booking(
        &self,
        id: &OrderId,
        carrier: Carrier,
        record: BookingRecord,
    ) -> Result<ClaimOutcome, ShippingError>;

    /// Apply a non-booking update plus its log entry atomically.
    async fn apply_update(
        &self,
        id: &OrderId,
        carrier: Carrier,
        update: ShipmentUpdate,
    ) -> Result<(), ShippingError>;
}

/// Carrier profile persistence.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The active profile for an owner and carrier, if one is set.
    async fn active_profile(
        &self,
        owner: OwnerId,
        carrier: Carrier,
    ) -> Result<Option<CarrierProfile>, ShippingError>;

    /// Load one profile.
    async fn get(&self, id: ProfileId) -> Result<Option<CarrierProfile>, ShippingError>;

    /// All profiles belonging to an owner.
    async fn list(&self, owner: OwnerId) -> Result<Vec<CarrierProfile>, ShippingError>;

    /// Insert or replace a profile.
    async fn upsert(&self, profile: CarrierProfile) -> Result<(), ShippingError>;

    /// Mark `id` active and clear the flag on all sibling profiles of the
    /// same (owner, carrier) in the same critical section.
    async fn set_active(
        &self,
        owner: OwnerId,
        carrier: Carrier,
        id: ProfileId,
    ) -> Result<(), ShippingError>;

    /// Delete a profile. Historical orders keep denormalized snapshots, so
    /// deletion is permitted even when orders reference the profile.
    async fn delete(&self, id: ProfileId) -> Result<bool, ShippingError>;

    /// Persist a Shiprocket session token next to the profile record.
    async fn save_session_token(
        &self,
        id: ProfileId,
        session: PersistedSession,
    ) -> Result<(), ShippingError>;

    /// Load the persisted Shiprocket session token, if any.
    async fn load_session_token(
        &self,
        id: ProfileId,
    ) -> Result<Option<PersistedSession>, ShippingError>;

    /// Drop the persisted session token (after an observed 401).
    async fn clear_session_token(&self, id: ProfileId) -> Result<(), ShippingError>;
}

/// A stored artifact reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Durable URL of the uploaded artifact.
    pub url: String,
}

/// Durable object storage for label documents.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload a document buffer, returning its durable URL.
    async fn upload_buffer(
        &self,
        bytes: Vec<u8>,
        name: &str,
        folder: &str,
    ) -> Result<StoredArtifact, ShippingError>;

    /// Fetch a previously uploaded artifact by URL.
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, ShippingError>;
}
