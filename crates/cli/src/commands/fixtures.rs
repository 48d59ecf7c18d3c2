//! JSON fixture loading for orders and carrier profiles.
//!
//! The CLI runs against in-memory stores seeded from two JSON files. Orders
//! deserialize straight into the shipping layer's `Order`; profiles carry
//! plaintext secrets in the file and are encrypted on load with the
//! configured credential key.

use dogeared_core::{Address, OwnerId};
use dogeared_shipping::crypto::SecretCipher;
use dogeared_shipping::order::Order;
use dogeared_shipping::profile::{CarrierProfile, PackageDefaults, ProfileCredentials};
use serde::Deserialize;

use super::CliError;

/// One profile entry as written in `profiles.json`.
#[derive(Debug, Deserialize)]
pub struct ProfileFixture {
    /// Display label.
    pub label: String,
    /// Whether this profile should be activated after load.
    #[serde(default)]
    pub active: bool,
    /// Pickup address.
    pub consignor: Address,
    /// Fallback package dimensions; the paperback-mailer defaults apply
    /// when omitted.
    #[serde(default)]
    pub defaults: Option<PackageDefaults>,
    /// Carrier account, with secrets in plaintext.
    pub credentials: CredentialFixture,
}

/// Plaintext credential material, distinguished by shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CredentialFixture {
    /// Shiprocket API user.
    Shiprocket {
        /// API user email.
        email: String,
        /// API user password.
        password: String,
    },
    /// Blue Dart account.
    BlueDart {
        /// API gateway client ID.
        client_id: String,
        /// API gateway client secret.
        client_secret: String,
        /// Login ID for the per-request profile block.
        login_id: String,
        /// License key for the per-request profile block.
        license_key: String,
        /// Customer code shipments are booked under.
        customer_code: String,
        /// Origin area code.
        area_code: String,
    },
}

/// Load orders from a JSON fixture file.
///
/// # Errors
///
/// Returns `CliError::Fixture` when the file is unreadable or malformed.
pub fn load_orders(path: &str) -> Result<Vec<Order>, CliError> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|e| fixture_error(path, &e))
}

/// Load profiles from a JSON fixture file, encrypting their secrets.
///
/// Returns each profile together with its requested active flag; the caller
/// applies activation through the store so the single-active invariant
/// holds.
///
/// # Errors
///
/// Returns `CliError::Fixture` for unreadable or malformed files and
/// propagates encryption failures.
pub fn load_profiles(
    path: &str,
    owner: OwnerId,
    cipher: &SecretCipher,
) -> Result<Vec<(CarrierProfile, bool)>, CliError> {
    let text = read(path)?;
    let fixtures: Vec<ProfileFixture> =
        serde_json::from_str(&text).map_err(|e| fixture_error(path, &e))?;

    fixtures
        .into_iter()
        .map(|fixture| {
            let credentials = encrypt_credentials(fixture.credentials, cipher)?;
            let mut profile =
                CarrierProfile::new(owner, fixture.label, credentials, fixture.consignor);
            if let Some(defaults) = fixture.defaults {
                profile.defaults = defaults;
            }
            Ok((profile, fixture.active))
        })
        .collect()
}

fn encrypt_credentials(
    fixture: CredentialFixture,
    cipher: &SecretCipher,
) -> Result<ProfileCredentials, CliError> {
    Ok(match fixture {
        CredentialFixture::Shiprocket { email, password } => ProfileCredentials::Shiprocket {
            email,
            password: cipher.encrypt(&password)?,
        },
        CredentialFixture::BlueDart {
            client_id,
            client_secret,
            login_id,
            license_key,
            customer_code,
            area_code,
        } => ProfileCredentials::BlueDart {
            client_id,
            client_secret: cipher.encrypt(&client_secret)?,
            login_id,
            license_key: cipher.encrypt(&license_key)?,
            customer_code,
            area_code,
        },
    })
}

fn read(path: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| fixture_error(path, &e))
}

fn fixture_error(path: &str, err: &dyn std::fmt::Display) -> CliError {
    CliError::Fixture {
        path: path.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn cipher() -> SecretCipher {
        SecretCipher::new(SecretString::from("fixture-test-passphrase-32-chars"))
    }

    #[test]
    fn test_profile_fixture_shapes_disambiguate() {
        let json = r#"[
            {
                "label": "Primary Shiprocket",
                "active": true,
                "consignor": {
                    "name": "Dogeared Books",
                    "phone": "9876543210",
                    "address": "14 Church Street",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "pincode": "560001"
                },
                "credentials": {
                    "email": "ops@dogeared.in",
                    "password": "hunter2"
                }
            },
            {
                "label": "Blue Dart main",
                "consignor": {
                    "name": "Dogeared Books",
                    "phone": "9876543210",
                    "address": "14 Church Street",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "pincode": "560001"
                },
                "credentials": {
                    "client_id": "dg-client",
                    "client_secret": "dg-secret",
                    "login_id": "BOM80912",
                    "license_key": "lic-key",
                    "customer_code": "299901",
                    "area_code": "BOM"
                }
            }
        ]"#;
        let fixtures: Vec<ProfileFixture> = serde_json::from_str(json).unwrap();
        assert!(matches!(
            fixtures[0].credentials,
            CredentialFixture::Shiprocket { .. }
        ));
        assert!(fixtures[0].active);
        assert!(matches!(
            fixtures[1].credentials,
            CredentialFixture::BlueDart { .. }
        ));
        assert!(!fixtures[1].active);
    }

    #[test]
    fn test_encrypted_secrets_open_with_same_cipher() {
        use secrecy::ExposeSecret;

        let c = cipher();
        let credentials = encrypt_credentials(
            CredentialFixture::Shiprocket {
                email: "ops@dogeared.in".to_string(),
                password: "hunter2".to_string(),
            },
            &c,
        )
        .unwrap();
        let ProfileCredentials::Shiprocket { password, .. } = credentials else {
            panic!("expected shiprocket credentials");
        };
        assert_eq!(c.decrypt(&password).unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn test_missing_file_is_a_fixture_error() {
        let err = load_orders("/nonexistent/orders.json").unwrap_err();
        assert!(matches!(err, CliError::Fixture { .. }));
    }
}
