//! In-memory reference implementations of the store traits.
//!
//! Backing for the CLI's JSON fixtures and the test suites. Durable
//! database/object-storage backends belong to the excluded storage layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dogeared_core::{Carrier, OrderId, OwnerId, ProfileId};
use tokio::sync::RwLock;

use crate::error::ShippingError;
use crate::order::Order;
use crate::profile::{CarrierProfile, PersistedSession};

use super::{
    ArtifactStore, BookingRecord, ClaimOutcome, OrderStore, ProfileStore, ShipmentUpdate,
    StoredArtifact,
};

/// In-memory order store.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl MemoryOrderStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given orders.
    #[must_use]
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        Self {
            orders: RwLock::new(
                orders
                    .into_iter()
                    .map(|order| (order.id.clone(), order))
                    .collect(),
            ),
        }
    }

    /// Insert or replace an order.
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, ShippingError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_with_provider(
        &self,
        carrier: Carrier,
        booked: bool,
    ) -> Result<Vec<Order>, ShippingError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| {
                order.shipping.provider == Some(carrier)
                    && order
                        .provider_shipment(carrier)
                        .is_some_and(crate::order::ProviderShipment::is_booked)
                        == booked
            })
            .cloned()
            .collect())
    }

    async fn claim_booking(
        &self,
        id: &OrderId,
        carrier: Carrier,
        record: BookingRecord,
    ) -> Result<ClaimOutcome, ShippingError> {
        // The write lock makes the absence check and the booking write one
        // atomic step.
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| ShippingError::NotFound(format!("order {id}")))?;

        if let Some(awb) = order.booked_awb(carrier) {
            return Ok(ClaimOutcome::AlreadyBooked {
                awb: awb.to_string(),
            });
        }

        order.shipping.provider = Some(carrier);
        order.provider_shipment_mut(carrier).mark_booked(
            record.awb_number,
            record.shipment_id,
            record.raw_response,
            record.log,
        )?;
        Ok(ClaimOutcome::Claimed)
    }

    async fn apply_update(
        &self,
        id: &OrderId,
        carrier: Carrier,
        update: ShipmentUpdate,
    ) -> Result<(), ShippingError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(id)
            .ok_or_else(|| ShippingError::NotFound(format!("order {id}")))?;
        let shipment = order.provider_shipment_mut(carrier);

        match update {
            ShipmentUpdate::Tracking { snapshot, log } => shipment.record_tracking(snapshot, log),
            ShipmentUpdate::PickupScheduled { scheduled_at, log } => {
                shipment.record_pickup(scheduled_at, log);
            }
            ShipmentUpdate::Cancelled { log } => shipment.mark_cancelled(log)?,
            ShipmentUpdate::Label { url, status, log } => shipment.record_label(url, status, log),
            ShipmentUpdate::CreateFailed { error, log } => shipment.mark_create_failed(error, log),
        }
        Ok(())
    }
}

/// In-memory profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    inner: RwLock<ProfileStoreInner>,
}

#[derive(Debug, Default)]
struct ProfileStoreInner {
    profiles: HashMap<ProfileId, CarrierProfile>,
    sessions: HashMap<ProfileId, PersistedSession>,
}

impl MemoryProfileStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn active_profile(
        &self,
        owner: OwnerId,
        carrier: Carrier,
    ) -> Result<Option<CarrierProfile>, ShippingError> {
        Ok(self
            .inner
            .read()
            .await
            .profiles
            .values()
            .find(|p| p.owner == owner && p.carrier == carrier && p.active)
            .cloned())
    }

    async fn get(&self, id: ProfileId) -> Result<Option<CarrierProfile>, ShippingError> {
        Ok(self.inner.read().await.profiles.get(&id).cloned())
    }

    async fn list(&self, owner: OwnerId) -> Result<Vec<CarrierProfile>, ShippingError> {
        let mut profiles: Vec<_> = self
            .inner
            .read()
            .await
            .profiles
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect();
        profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(profiles)
    }

    async fn upsert(&self, profile: CarrierProfile) -> Result<(), ShippingError> {
        self.inner
            .write()
            .await
            .profiles
            .insert(profile.id, profile);
        Ok(())
    }

    async fn set_active(
        &self,
        owner: OwnerId,
        carrier: Carrier,
        id: ProfileId,
    ) -> Result<(), ShippingError> {
        let mut inner = self.inner.write().await;
        if !inner
            .profiles
            .get(&id)
            .is_some_and(|p| p.owner == owner && p.carrier == carrier)
        {
            return Err(ShippingError::NotFound(format!("profile {id}")));
        }
        // One critical section: clear every sibling, then set the flag.
        for profile in inner.profiles.values_mut() {
            if profile.owner == owner && profile.carrier == carrier {
                profile.active = profile.id == id;
                profile.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete(&self, id: ProfileId) -> Result<bool, ShippingError> {
        let mut inner = self.inner.write().await;
        inner.sessions.remove(&id);
        Ok(inner.profiles.remove(&id).is_some())
    }

    async fn save_session_token(
        &self,
        id: ProfileId,
        session: PersistedSession,
    ) -> Result<(), ShippingError> {
        self.inner.write().await.sessions.insert(id, session);
        Ok(())
    }

    async fn load_session_token(
        &self,
        id: ProfileId,
    ) -> Result<Option<PersistedSession>, ShippingError> {
        Ok(self.inner.read().await.sessions.get(&id).cloned())
    }

    async fn clear_session_token(&self, id: ProfileId) -> Result<(), ShippingError> {
        self.inner.write().await.sessions.remove(&id);
        Ok(())
    }
}

/// In-memory artifact store with fake `memory://` URLs.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryArtifactStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn upload_buffer(
        &self,
        bytes: Vec<u8>,
        name: &str,
        folder: &str,
    ) -> Result<StoredArtifact, ShippingError> {
        let url = format!("memory://{folder}/{name}");
        self.artifacts.write().await.insert(url.clone(), bytes);
        Ok(StoredArtifact { url })
    }

    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>, ShippingError> {
        Ok(self.artifacts.read().await.get(url).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::order::{LogKind, PaymentInfo, ShipmentLog, ShippingDetails};
    use dogeared_core::{Address, Money};
    use serde_json::json;

    fn order(id: &str) -> Order {
        Order {
            id: OrderId::new(id),
            number: format!("DG-{id}"),
            amount: Money::from(500),
            items: vec![],
            payment: PaymentInfo::default(),
            shipping: ShippingDetails {
                consignee: Address::default(),
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

    fn record(awb: &str) -> BookingRecord {
        BookingRecord {
            awb_number: awb.to_string(),
            shipment_id: None,
            raw_response: json!({"awb": awb}),
            log: ShipmentLog::success(LogKind::WaybillCreate, None, None),
        }
    }

    #[tokio::test]
    async fn test_claim_booking_is_first_writer_wins() {
        let store = MemoryOrderStore::with_orders([order("o1")]);
        let id = OrderId::new("o1");

        let first = store
            .claim_booking(&id, Carrier::Shiprocket, record("AWB-1"))
            .await
            .unwrap();
        assert_eq!(first, ClaimOutcome::Claimed);

        let second = store
            .claim_booking(&id, Carrier::Shiprocket, record("AWB-2"))
            .await
            .unwrap();
        assert_eq!(
            second,
            ClaimOutcome::AlreadyBooked {
                awb: "AWB-1".to_string()
            }
        );

        let stored = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.booked_awb(Carrier::Shiprocket), Some("AWB-1"));
    }

    #[tokio::test]
    async fn test_concurrent_claims_converge_on_one_awb() {
        let store = Arc::new(MemoryOrderStore::with_orders([order("o1")]));
        let id = OrderId::new("o1");

        let a = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(
                async move { store.claim_booking(&id, Carrier::BlueDart, record("A")).await },
            )
        };
        let b = {
            let store = Arc::clone(&store);
            let id = id.clone();
            tokio::spawn(
                async move { store.claim_booking(&id, Carrier::BlueDart, record("B")).await },
            )
        };

        let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        let claimed = outcomes
            .iter()
            .filter(|o| matches!(o, ClaimOutcome::Claimed))
            .count();
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_claims_per_provider_are_independent() {
        let store = MemoryOrderStore::with_orders([order("o1")]);
        let id = OrderId::new("o1");

        store
            .claim_booking(&id, Carrier::Shiprocket, record("SR-1"))
            .await
            .unwrap();
        let bluedart = store
            .claim_booking(&id, Carrier::BlueDart, record("BD-1"))
            .await
            .unwrap();
        assert_eq!(bluedart, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn test_find_with_provider_splits_booked_from_pending() {
        let mut booked = order("o1");
        booked.shipping.provider = Some(Carrier::Shiprocket);
        let mut pending = order("o2");
        pending.shipping.provider = Some(Carrier::Shiprocket);
        let store = MemoryOrderStore::with_orders([booked, pending, order("o3")]);
        store
            .claim_booking(&OrderId::new("o1"), Carrier::Shiprocket, record("SR-1"))
            .await
            .unwrap();

        let booked = store
            .find_with_provider(Carrier::Shiprocket, true)
            .await
            .unwrap();
        assert_eq!(booked.len(), 1);
        assert_eq!(booked[0].id, OrderId::new("o1"));

        let pending = store
            .find_with_provider(Carrier::Shiprocket, false)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, OrderId::new("o2"));
    }

    #[tokio::test]
    async fn test_set_active_clears_siblings() {
        let store = MemoryProfileStore::new();
        let owner = OwnerId::new(1);

        let mut first = CarrierProfile::new(
            owner,
            "first",
            crate::profile::ProfileCredentials::Shiprocket {
                email: "a@dogeared.in".to_string(),
                password: crate::crypto::EncryptedSecret::from_stored("ct"),
            },
            Address::default(),
        );
        first.active = true;
        let second = CarrierProfile::new(
            owner,
            "second",
            crate::profile::ProfileCredentials::Shiprocket {
                email: "b@dogeared.in".to_string(),
                password: crate::crypto::EncryptedSecret::from_stored("ct"),
            },
            Address::default(),
        );
        let second_id = second.id;

        store.upsert(first.clone()).await.unwrap();
        store.upsert(second).await.unwrap();
        store
            .set_active(owner, Carrier::Shiprocket, second_id)
            .await
            .unwrap();

        let active = store
            .active_profile(owner, Carrier::Shiprocket)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second_id);

        let actives = store
            .list(owner)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.active)
            .count();
        assert_eq!(actives, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_profile_and_session() {
        let store = MemoryProfileStore::new();
        let profile = CarrierProfile::new(
            OwnerId::new(1),
            "doomed",
            crate::profile::ProfileCredentials::Shiprocket {
                email: "a@dogeared.in".to_string(),
                password: crate::crypto::EncryptedSecret::from_stored("ct"),
            },
            Address::default(),
        );
        let id = profile.id;
        store.upsert(profile).await.unwrap();
        store
            .save_session_token(
                id,
                PersistedSession {
                    token: "tok".into(),
                    expires_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        assert!(store.delete(id).await.unwrap());
        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.load_session_token(id).await.unwrap().is_none());
        // Second delete finds nothing.
        assert!(!store.delete(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_artifact_roundtrip() {
        let store = MemoryArtifactStore::new();
        let stored = store
            .upload_buffer(b"%PDF-1.4".to_vec(), "label-1.pdf", "labels")
            .await
            .unwrap();
        assert_eq!(stored.url, "memory://labels/label-1.pdf");
        assert_eq!(
            store.fetch(&stored.url).await.unwrap(),
            Some(b"%PDF-1.4".to_vec())
        );
    }
}
