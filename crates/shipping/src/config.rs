//! Shipping configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHIPPING_CREDENTIAL_KEY` - Master passphrase for credential encryption
//!   (min 32 chars, high entropy)
//!
//! ## Optional
//! - `SHIPROCKET_BASE_URL` - Shiprocket API base (default: `https://apiv2.shiprocket.in`)
//! - `BLUEDART_BASE_URL` - Blue Dart API gateway base (default: `https://apigateway.bluedart.com`)
//! - `SHIPPING_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHIPPING_RETRY_MAX` - Retry cap for 5xx/timeout (default: 3)
//! - `SHIPPING_RETRY_BASE_MS` - Backoff base delay in milliseconds (default: 1000)
//! - `SHIPPING_BATCH_CONCURRENCY` - Bulk operation fan-out cap (default: 4)
//! - `SHIPPING_COD_CODE` - Pins a fixed COD product code; unset derives
//!   prepaid-vs-COD from payment status
//! - `SHIPPING_SHIPPER_CODE_OVERRIDES` - JSON object mapping Blue Dart login
//!   IDs to substitute shipper customer codes (default: `{}`)
//! - `SHIPPING_LABEL_FOLDER` - Artifact-store folder for labels (default: `labels`)

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::retry::RetryConfig;

const MIN_CREDENTIAL_KEY_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_SHIPROCKET_BASE_URL: &str = "https://apiv2.shiprocket.in";
const DEFAULT_BLUEDART_BASE_URL: &str = "https://apigateway.bluedart.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_CONCURRENCY: usize = 4;
const DEFAULT_LABEL_FOLDER: &str = "labels";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Shipping layer configuration.
#[derive(Debug, Clone)]
pub struct ShippingConfig {
    /// Master passphrase for at-rest credential encryption.
    pub credential_key: SecretString,
    /// Shiprocket API base URL (overridable for sandbox/tests).
    pub shiprocket_base_url: String,
    /// Blue Dart API gateway base URL (overridable for sandbox/tests).
    pub bluedart_base_url: String,
    /// Per-request timeout for carrier HTTP calls.
    pub http_timeout: Duration,
    /// Retry policy for transient carrier failures.
    pub retry: RetryConfig,
    /// Concurrency cap for bulk operation fan-out.
    pub batch_concurrency: usize,
    /// Fixed COD product code; `None` derives it from payment status.
    pub cod_code: Option<String>,
    /// Blue Dart shipper-customer-code substitution table, keyed by login ID.
    ///
    /// Certain carrier accounts require booking under a different shipper
    /// code than the nominal login ID. This is deployment configuration,
    /// empty by default.
    pub shipper_code_overrides: HashMap<String, String>,
    /// Artifact-store folder where labels are uploaded.
    pub label_folder: String,
}

impl ShippingConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let credential_key = get_validated_secret("SHIPPING_CREDENTIAL_KEY")?;
        validate_key_length(&credential_key, "SHIPPING_CREDENTIAL_KEY")?;

        let shiprocket_base_url = get_base_url("SHIPROCKET_BASE_URL", DEFAULT_SHIPROCKET_BASE_URL)?;
        let bluedart_base_url = get_base_url("BLUEDART_BASE_URL", DEFAULT_BLUEDART_BASE_URL)?;

        let http_timeout = Duration::from_secs(parse_env_or(
            "SHIPPING_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        let retry = RetryConfig {
            max_retries: parse_env_or("SHIPPING_RETRY_MAX", RetryConfig::DEFAULT_MAX_RETRIES)?,
            base_delay: Duration::from_millis(parse_env_or(
                "SHIPPING_RETRY_BASE_MS",
                RetryConfig::DEFAULT_BASE_DELAY_MS,
            )?),
            ..RetryConfig::default()
        };
        let batch_concurrency =
            parse_env_or("SHIPPING_BATCH_CONCURRENCY", DEFAULT_BATCH_CONCURRENCY)?;

        let cod_code = get_optional_env("SHIPPING_COD_CODE");
        let shipper_code_overrides = get_json_map("SHIPPING_SHIPPER_CODE_OVERRIDES")?;
        let label_folder =
            get_env_or_default("SHIPPING_LABEL_FOLDER", DEFAULT_LABEL_FOLDER);

        Ok(Self {
            credential_key,
            shiprocket_base_url,
            bluedart_base_url,
            http_timeout,
            retry,
            batch_concurrency,
            cod_code,
            shipper_code_overrides,
            label_folder,
        })
    }

    /// Base URL for the given carrier.
    #[must_use]
    pub fn base_url(&self, carrier: dogeared_core::Carrier) -> &str {
        match carrier {
            dogeared_core::Carrier::Shiprocket => &self.shiprocket_base_url,
            dogeared_core::Carrier::BlueDart => &self.bluedart_base_url,
        }
    }

    /// Shipper customer code to book under for a Blue Dart login ID.
    ///
    /// Returns the configured substitution if one exists, otherwise the
    /// profile's nominal customer code.
    #[must_use]
    pub fn shipper_code<'a>(&'a self, login_id: &str, nominal: &'a str) -> &'a str {
        self.shipper_code_overrides
            .get(login_id)
            .map_or(nominal, String::as_str)
    }

    /// Build the shared HTTP client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClient` if the TLS backend cannot be
    /// initialized.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }

    /// Construct a configuration suitable for tests: no env access, zeroed
    /// backoff delays, local base URLs.
    #[must_use]
    pub fn for_tests(shiprocket_base_url: &str, bluedart_base_url: &str) -> Self {
        Self {
            credential_key: SecretString::from("kQ9#vTx2!mFz8@bWc4$nJr6^pLd0&gHs"),
            shiprocket_base_url: shiprocket_base_url.to_string(),
            bluedart_base_url: bluedart_base_url.to_string(),
            http_timeout: Duration::from_secs(5),
            retry: RetryConfig::immediate(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            cod_code: None,
            shipper_code_overrides: HashMap::new(),
            label_folder: DEFAULT_LABEL_FOLDER.to_string(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Get a base URL override, validating that it parses as an absolute URL.
fn get_base_url(key: &str, default: &str) -> Result<String, ConfigError> {
    let raw = get_env_or_default(key, default);
    let parsed = url::Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme: {}", parsed.scheme()),
        ));
    }
    // Carrier paths are joined with a leading slash; strip any trailing one.
    Ok(raw.trim_end_matches('/').to_string())
}

/// Parse a JSON object env var into a string-to-string map.
fn get_json_map(key: &str) -> Result<HashMap<String, String>, ConfigError> {
    match get_optional_env(key) {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(HashMap::new()),
    }
}

/// Validate that the credential key meets minimum length requirements.
fn validate_key_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_CREDENTIAL_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_CREDENTIAL_KEY_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
