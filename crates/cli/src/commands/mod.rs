//! Command implementations and the shared service stack.

pub mod fixtures;
pub mod profiles;
pub mod shipments;

use std::sync::Arc;

use dogeared_core::{OrderId, OwnerId};
use dogeared_shipping::batch::BatchController;
use dogeared_shipping::config::{ConfigError, ShippingConfig};
use dogeared_shipping::crypto::SecretCipher;
use dogeared_shipping::error::ShippingError;
use dogeared_shipping::orchestrator::ShipmentOrchestrator;
use dogeared_shipping::store::{
    MemoryArtifactStore, MemoryOrderStore, MemoryProfileStore, ProfileStore,
};
use dogeared_shipping::token::TokenManager;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A shipping operation failed.
    #[error(transparent)]
    Shipping(#[from] ShippingError),

    /// A fixture file could not be read.
    #[error("Fixture error ({path}): {message}")]
    Fixture {
        /// Offending file.
        path: String,
        /// Failure detail.
        message: String,
    },
}

/// The wired-up shipping stack the commands run against.
///
/// Orders and profiles come from JSON fixtures into the in-memory stores;
/// carrier clients talk to whatever the environment's base URLs point at.
pub struct Stack {
    /// Owner the profiles were loaded under.
    pub owner: OwnerId,
    /// Profile store, for listing.
    pub profiles: Arc<MemoryProfileStore>,
    /// Orchestrator for single-order operations.
    pub orchestrator: Arc<ShipmentOrchestrator>,
    /// Batch fan-out for multi-order commands.
    pub batch: BatchController,
}

impl Stack {
    /// Load config from the environment and fixtures from disk, then wire
    /// the stack.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` for bad environment configuration and
    /// `CliError::Fixture` for unreadable fixture files.
    pub async fn build(
        owner: i32,
        orders_file: &str,
        profiles_file: &str,
    ) -> Result<Self, CliError> {
        let owner = OwnerId::new(owner);
        let config = Arc::new(ShippingConfig::from_env()?);
        let cipher = SecretCipher::new(config.credential_key.clone());

        let orders = Arc::new(MemoryOrderStore::with_orders(fixtures::load_orders(
            orders_file,
        )?));
        let profile_store = Arc::new(MemoryProfileStore::new());
        for (profile, active) in fixtures::load_profiles(profiles_file, owner, &cipher)? {
            let id = profile.id;
            let carrier = profile.carrier;
            profile_store.upsert(profile).await?;
            if active {
                profile_store.set_active(owner, carrier, id).await?;
            }
        }

        let http = config.http_client()?;
        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            Arc::clone(&profile_store) as _,
            cipher.clone(),
            Arc::clone(&config),
        ));
        let orchestrator = Arc::new(ShipmentOrchestrator::new(
            orders,
            Arc::clone(&profile_store) as _,
            Arc::new(MemoryArtifactStore::new()),
            tokens,
            cipher,
            http,
            Arc::clone(&config),
        ));
        let batch = BatchController::new(Arc::clone(&orchestrator), &config);

        Ok(Self {
            owner,
            profiles: profile_store,
            orchestrator,
            batch,
        })
    }
}

/// Parse order id arguments.
pub fn order_ids(raw: &[String]) -> Vec<OrderId> {
    raw.iter().map(OrderId::new).collect()
}
