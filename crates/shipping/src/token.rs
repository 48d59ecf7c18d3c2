//! Carrier auth token cache.
//!
//! Hides the two carriers' very different auth lifecycles behind one
//! interface:
//!
//! - **Blue Dart**: client id + secret exchanged for a JWT valid ~24 h,
//!   cached in-process only, refreshed 5 minutes before expiry.
//! - **Shiprocket**: email + password exchanged for a token valid ~10 days,
//!   persisted on the profile record (survives restarts), refreshed
//!   15 minutes before expiry.
//!
//! Concurrent callers observing a missing/expired token converge on a
//! single login through `moka`'s `try_get_with`. Rotating a profile's
//! secret changes the cache key (credential fingerprint), implicitly
//! invalidating stale tokens.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dogeared_core::{Carrier, ProfileId};
use moka::future::Cache;
use secrecy::SecretString;
use tracing::{debug, instrument, warn};

use crate::carriers::{bluedart, shiprocket};
use crate::config::ShippingConfig;
use crate::crypto::SecretCipher;
use crate::error::ShippingError;
use crate::profile::{CarrierProfile, PersistedSession, ProfileCredentials};
use crate::store::ProfileStore;

/// Validity buffer before expiry under which a Blue Dart JWT is refreshed.
const BLUEDART_REFRESH_BUFFER_MINS: i64 = 5;
/// Validity buffer before expiry under which a Shiprocket token is refreshed.
const SHIPROCKET_REFRESH_BUFFER_MINS: i64 = 15;

/// A carrier session token with its absolute expiry.
#[derive(Clone)]
pub struct AuthToken {
    /// Opaque bearer credential.
    pub token: SecretString,
    /// Absolute expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Carrier that issued the token.
    pub carrier: Carrier,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("carrier", &self.carrier)
            .finish()
    }
}

impl AuthToken {
    /// Whether the token is still usable under the carrier's buffer window.
    ///
    /// A token is valid only while `now < expires_at - buffer`, so an
    /// in-flight request cannot race the expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - refresh_buffer(self.carrier)
    }

    /// [`Self::is_valid_at`] against the current clock.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Buffer window before expiry under which a token is treated as invalid.
fn refresh_buffer(carrier: Carrier) -> TimeDelta {
    match carrier {
        Carrier::BlueDart => TimeDelta::minutes(BLUEDART_REFRESH_BUFFER_MINS),
        Carrier::Shiprocket => TimeDelta::minutes(SHIPROCKET_REFRESH_BUFFER_MINS),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TokenKey {
    carrier: Carrier,
    profile: ProfileId,
    /// Fingerprint of the secret material; rotation changes the key.
    fingerprint: u64,
}

impl TokenKey {
    fn for_profile(profile: &CarrierProfile) -> Self {
        Self {
            carrier: profile.carrier,
            profile: profile.id,
            fingerprint: profile.credentials.fingerprint(),
        }
    }
}

/// Process-wide token cache, one entry per (carrier, profile, credentials).
///
/// Constructed once at startup and passed explicitly to the carrier
/// clients; tokens are safely discardable so there is no teardown.
pub struct TokenManager {
    http: reqwest::Client,
    cache: Cache<TokenKey, AuthToken>,
    profiles: Arc<dyn ProfileStore>,
    cipher: SecretCipher,
    config: Arc<ShippingConfig>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("cached_tokens", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a token manager.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        profiles: Arc<dyn ProfileStore>,
        cipher: SecretCipher,
        config: Arc<ShippingConfig>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            // Entries also carry their own expiry; the TTL is just an
            // upper bound on cache residency.
            .time_to_live(Duration::from_secs(60 * 60 * 24 * 11))
            .build();
        Self {
            http,
            cache,
            profiles,
            cipher,
            config,
        }
    }

    /// Produce a valid bearer token for the profile, logging in only when
    /// no usable cached (or persisted) token exists.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Auth`] when the credential exchange fails;
    /// auth failures are never retried automatically.
    #[instrument(skip(self, profile), fields(carrier = %profile.carrier, profile_id = %profile.id))]
    pub async fn bearer_token(
        &self,
        profile: &CarrierProfile,
    ) -> Result<SecretString, ShippingError> {
        let key = TokenKey::for_profile(profile);

        if let Some(cached) = self.cache.get(&key).await {
            if cached.is_valid() {
                return Ok(cached.token);
            }
            self.cache.invalidate(&key).await;
        }

        // Shiprocket tokens outlive the process; adopt a persisted session
        // before paying for a fresh login.
        if profile.carrier == Carrier::Shiprocket
            && let Some(session) = self.profiles.load_session_token(profile.id).await?
        {
            let token = AuthToken {
                token: session.token,
                expires_at: session.expires_at,
                carrier: Carrier::Shiprocket,
            };
            if token.is_valid() {
                debug!("adopting persisted session token");
                self.cache.insert(key, token.clone()).await;
                return Ok(token.token);
            }
            self.profiles.clear_session_token(profile.id).await?;
        }

        let token = self
            .cache
            .try_get_with(key, self.login(profile))
            .await
            .map_err(|e| ShippingError::from_shared(&e))?;
        Ok(token.token)
    }

    /// Drop the cached (and, for Shiprocket, persisted) token.
    ///
    /// Called by carrier clients after an observed 401 so the next
    /// [`Self::bearer_token`] re-authenticates.
    #[instrument(skip(self, profile), fields(carrier = %profile.carrier, profile_id = %profile.id))]
    pub async fn invalidate(&self, profile: &CarrierProfile) -> Result<(), ShippingError> {
        self.cache.invalidate(&TokenKey::for_profile(profile)).await;
        if profile.carrier == Carrier::Shiprocket {
            self.profiles.clear_session_token(profile.id).await?;
        }
        Ok(())
    }

    /// Perform a login round-trip and report the resulting token expiry.
    ///
    /// Bypasses the cache; used by operator tooling to check a profile's
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Auth`] when the credentials are rejected.
    pub async fn verify_credentials(
        &self,
        profile: &CarrierProfile,
    ) -> Result<DateTime<Utc>, ShippingError> {
        let token = self.login(profile).await?;
        Ok(token.expires_at)
    }

    /// Run the carrier's login flow and persist the token where required.
    async fn login(&self, profile: &CarrierProfile) -> Result<AuthToken, ShippingError> {
        match &profile.credentials {
            ProfileCredentials::Shiprocket { email, password } => {
                let password = self.cipher.decrypt(password)?;
                let token = shiprocket::login(
                    &self.http,
                    &self.config.shiprocket_base_url,
                    email,
                    &password,
                )
                .await?;
                // Persist so the ~10 day session survives restarts.
                if let Err(e) = self
                    .profiles
                    .save_session_token(
                        profile.id,
                        PersistedSession {
                            token: token.token.clone(),
                            expires_at: token.expires_at,
                        },
                    )
                    .await
                {
                    warn!(error = %e, "failed to persist session token");
                }
                Ok(token)
            }
            ProfileCredentials::BlueDart {
                client_id,
                client_secret,
                ..
            } => {
                let client_secret = self.cipher.decrypt(client_secret)?;
                bluedart::login(
                    &self.http,
                    &self.config.bluedart_base_url,
                    client_id,
                    &client_secret,
                )
                .await
            }
        }
    }
}
