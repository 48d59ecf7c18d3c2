//! A fully wired shipping stack pointed at the fake gateways.

use std::sync::Arc;

use dogeared_core::{Address, OrderId, OwnerId};
use dogeared_shipping::batch::BatchController;
use dogeared_shipping::config::ShippingConfig;
use dogeared_shipping::crypto::SecretCipher;
use dogeared_shipping::orchestrator::ShipmentOrchestrator;
use dogeared_shipping::order::Order;
use dogeared_shipping::profile::{CarrierProfile, ProfileCredentials};
use dogeared_shipping::store::{
    MemoryArtifactStore, MemoryOrderStore, MemoryProfileStore, ProfileStore,
};
use dogeared_shipping::token::TokenManager;

use crate::fakes::{FakeBlueDart, FakeShiprocket};

/// The full stack under test: fakes, stores, orchestrator, batch layer.
pub struct Harness {
    /// Fake Shiprocket gateway.
    pub shiprocket: FakeShiprocket,
    /// Fake Blue Dart gateway.
    pub bluedart: FakeBlueDart,
    /// Owner the seeded profiles belong to.
    pub owner: OwnerId,
    /// Order store shared across restarts.
    pub orders: Arc<MemoryOrderStore>,
    /// Profile store shared across restarts.
    pub profiles: Arc<MemoryProfileStore>,
    /// Artifact store shared across restarts.
    pub artifacts: Arc<MemoryArtifactStore>,
    /// Shipping configuration pointed at the fakes.
    pub config: Arc<ShippingConfig>,
    /// Credential cipher matching the configured key.
    pub cipher: SecretCipher,
    /// Orchestrator under test.
    pub orchestrator: Arc<ShipmentOrchestrator>,
    /// Batch layer under test.
    pub batch: BatchController,
}

impl Harness {
    /// Start both fakes and wire a stack with one active profile per
    /// carrier.
    pub async fn start() -> Self {
        let shiprocket = FakeShiprocket::start().await;
        let bluedart = FakeBlueDart::start().await;
        let config = Arc::new(ShippingConfig::for_tests(
            &shiprocket.base_url,
            &bluedart.base_url,
        ));
        let cipher = SecretCipher::new(config.credential_key.clone());
        let owner = OwnerId::new(1);

        let orders = Arc::new(MemoryOrderStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        seed_profiles(&profiles, owner, &cipher).await;

        let (orchestrator, batch) = build_stack(
            &orders,
            &profiles,
            &artifacts,
            &config,
            &cipher,
        );
        Self {
            shiprocket,
            bluedart,
            owner,
            orders,
            profiles,
            artifacts,
            config,
            cipher,
            orchestrator,
            batch,
        }
    }

    /// Rebuild the orchestrator and batch layer over the same stores,
    /// simulating a process restart. The token cache starts empty; only
    /// store-persisted state survives.
    pub fn restart(&mut self) {
        let (orchestrator, batch) = build_stack(
            &self.orders,
            &self.profiles,
            &self.artifacts,
            &self.config,
            &self.cipher,
        );
        self.orchestrator = orchestrator;
        self.batch = batch;
    }

    /// Insert an order into the shared store.
    pub async fn seed_order(&self, order: Order) -> OrderId {
        let id = order.id.clone();
        self.orders.insert(order).await;
        id
    }
}

fn build_stack(
    orders: &Arc<MemoryOrderStore>,
    profiles: &Arc<MemoryProfileStore>,
    artifacts: &Arc<MemoryArtifactStore>,
    config: &Arc<ShippingConfig>,
    cipher: &SecretCipher,
) -> (Arc<ShipmentOrchestrator>, BatchController) {
    let http = config.http_client().expect("http client");
    let tokens = Arc::new(TokenManager::new(
        http.clone(),
        Arc::clone(profiles) as _,
        cipher.clone(),
        Arc::clone(config),
    ));
    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        Arc::clone(orders) as _,
        Arc::clone(profiles) as _,
        Arc::clone(artifacts) as _,
        tokens,
        cipher.clone(),
        http,
        Arc::clone(config),
    ));
    let batch = BatchController::new(Arc::clone(&orchestrator), config);
    (orchestrator, batch)
}

async fn seed_profiles(profiles: &MemoryProfileStore, owner: OwnerId, cipher: &SecretCipher) {
    let consignor = Address {
        name: "Dogeared Books".to_string(),
        phone: "8012345678".to_string(),
        email: None,
        address: "4 Paper Mill Lane".to_string(),
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        pincode: "411001".to_string(),
    };

    let shiprocket = CarrierProfile::new(
        owner,
        "Shiprocket test",
        ProfileCredentials::Shiprocket {
            email: "ops@dogeared.in".to_string(),
            password: cipher.encrypt("sr-password").expect("encrypt"),
        },
        consignor.clone(),
    );
    let bluedart = CarrierProfile::new(
        owner,
        "Blue Dart test",
        ProfileCredentials::BlueDart {
            client_id: "dg-client".to_string(),
            client_secret: cipher.encrypt("bd-secret").expect("encrypt"),
            login_id: "BOM80912".to_string(),
            license_key: cipher.encrypt("bd-license").expect("encrypt"),
            customer_code: "299901".to_string(),
            area_code: "BOM".to_string(),
        },
        consignor,
    );

    for profile in [shiprocket, bluedart] {
        let id = profile.id;
        let carrier = profile.carrier;
        profiles.upsert(profile).await.expect("upsert profile");
        profiles
            .set_active(owner, carrier, id)
            .await
            .expect("activate profile");
    }
}
