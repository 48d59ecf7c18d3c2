//! Carrier credential profiles.
//!
//! A profile bundles one carrier account: identifiers, encrypted secret
//! material, default package dimensions, and the consignor address shipments
//! are booked from. Profiles are created by admins; the token manager and
//! orchestrator only read them.

use chrono::{DateTime, Utc};
use dogeared_core::{Address, Carrier, OwnerId, ProfileId};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptedSecret;

/// One carrier account an admin can book shipments under.
///
/// Invariant (enforced by the profile store): at most one profile per
/// (owner, carrier) is `active` at any time.
#[derive(Debug, Clone)]
pub struct CarrierProfile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Admin who owns this profile.
    pub owner: OwnerId,
    /// Carrier this profile authenticates against.
    pub carrier: Carrier,
    /// Display label shown to operators.
    pub label: String,
    /// Whether this is the profile used for new bookings.
    pub active: bool,
    /// Carrier-specific identifiers and encrypted secrets.
    pub credentials: ProfileCredentials,
    /// Fallback package dimensions when an order carries none.
    pub defaults: PackageDefaults,
    /// Address shipments are picked up from.
    pub consignor: Address,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last edited.
    pub updated_at: DateTime<Utc>,
}

impl CarrierProfile {
    /// Create a fresh inactive profile.
    #[must_use]
    pub fn new(
        owner: OwnerId,
        label: impl Into<String>,
        credentials: ProfileCredentials,
        consignor: Address,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProfileId::generate(),
            owner,
            carrier: credentials.carrier(),
            label: label.into(),
            active: false,
            credentials,
            defaults: PackageDefaults::default(),
            consignor,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Carrier-specific credential material, tagged per carrier.
///
/// Secrets are stored encrypted; decryption happens only inside the token
/// manager right before a login call.
#[derive(Debug, Clone)]
pub enum ProfileCredentials {
    /// Shiprocket API user: email + password exchanged for a ~10 day token.
    Shiprocket {
        /// API user email.
        email: String,
        /// API user password, encrypted at rest.
        password: EncryptedSecret,
    },
    /// Blue Dart account: JWT client pair plus per-request profile block.
    BlueDart {
        /// API gateway client ID.
        client_id: String,
        /// API gateway client secret, encrypted at rest.
        client_secret: EncryptedSecret,
        /// Login ID used in the per-request `Profile` block.
        login_id: String,
        /// License key used in the per-request `Profile` block, encrypted
        /// at rest.
        license_key: EncryptedSecret,
        /// Customer code shipments are booked under.
        customer_code: String,
        /// Origin area code.
        area_code: String,
    },
}

impl ProfileCredentials {
    /// Carrier these credentials belong to.
    #[must_use]
    pub const fn carrier(&self) -> Carrier {
        match self {
            Self::Shiprocket { .. } => Carrier::Shiprocket,
            Self::BlueDart { .. } => Carrier::BlueDart,
        }
    }

    /// Stable fingerprint of the secret material.
    ///
    /// Used as part of the token cache key so that rotating a password or
    /// license key implicitly invalidates cached tokens.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::hash::DefaultHasher::new();
        match self {
            Self::Shiprocket { email, password } => {
                email.hash(&mut hasher);
                password.as_str().hash(&mut hasher);
            }
            Self::BlueDart {
                client_id,
                client_secret,
                license_key,
                ..
            } => {
                client_id.hash(&mut hasher);
                client_secret.as_str().hash(&mut hasher);
                license_key.as_str().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

/// Fallback package dimensions applied when an order has none of its own.
///
/// Sized for a single paperback mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDefaults {
    /// Actual weight in kilograms.
    pub weight_kg: Decimal,
    /// Length in centimeters.
    pub length_cm: Decimal,
    /// Breadth in centimeters.
    pub breadth_cm: Decimal,
    /// Height in centimeters.
    pub height_cm: Decimal,
}

impl Default for PackageDefaults {
    fn default() -> Self {
        Self {
            weight_kg: Decimal::new(5, 1), // 0.5 kg
            length_cm: Decimal::from(20),
            breadth_cm: Decimal::from(15),
            height_cm: Decimal::from(3),
        }
    }
}

/// A persisted Shiprocket session token.
///
/// Shiprocket tokens live ~10 days, so they are written back to the profile
/// store after each login and survive process restarts.
#[derive(Clone)]
pub struct PersistedSession {
    /// The bearer token.
    pub token: SecretString,
    /// Absolute expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedSession")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shiprocket_credentials(password: &str) -> ProfileCredentials {
        ProfileCredentials::Shiprocket {
            email: "ops@dogeared.in".to_string(),
            password: EncryptedSecret::from_stored(password),
        }
    }

    #[test]
    fn test_new_profile_inherits_carrier() {
        let profile = CarrierProfile::new(
            OwnerId::new(1),
            "Primary Shiprocket",
            shiprocket_credentials("ct1"),
            Address::default(),
        );
        assert_eq!(profile.carrier, Carrier::Shiprocket);
        assert!(!profile.active);
    }

    #[test]
    fn test_fingerprint_changes_with_secret() {
        let a = shiprocket_credentials("ct1").fingerprint();
        let b = shiprocket_credentials("ct2").fingerprint();
        assert_ne!(a, b);
        assert_eq!(a, shiprocket_credentials("ct1").fingerprint());
    }

    #[test]
    fn test_default_package_is_paperback_mailer() {
        let defaults = PackageDefaults::default();
        assert_eq!(defaults.weight_kg, Decimal::new(5, 1));
        assert_eq!(defaults.length_cm, Decimal::from(20));
        assert_eq!(defaults.breadth_cm, Decimal::from(15));
        assert_eq!(defaults.height_cm, Decimal::from(3));
    }

    #[test]
    fn test_persisted_session_debug_redacts_token() {
        let session = PersistedSession {
            token: SecretString::from("jwt-abc"),
            expires_at: Utc::now(),
        };
        let output = format!("{session:?}");
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("jwt-abc"));
    }
}
