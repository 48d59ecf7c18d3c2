//! Per-carrier HTTP clients.
//!
//! Each client translates the normalized [`ShipmentRequest`] into its
//! carrier's wire format and maps responses back into the shared types
//! below. Everything HTTP-shaped is handled here: bearer headers, the
//! transient-failure retry loop, and the single 401 refresh-and-replay.
//!
//! Carrier-specific quirks stay inside the respective module; nothing
//! upstream of [`CarrierApi`] sees a raw carrier payload except as the
//! opaque `raw` audit value.

pub mod bluedart;
pub mod shiprocket;

use async_trait::async_trait;
use dogeared_core::Carrier;
use reqwest::StatusCode;
use secrecy::SecretString;
use tracing::warn;

use crate::error::ShippingError;
use crate::order::TrackingSnapshot;
use crate::profile::CarrierProfile;
use crate::request::{PickupRequest, ShipmentRequest};
use crate::retry::RetryConfig;
use crate::token::TokenManager;

pub use bluedart::BlueDartClient;
pub use shiprocket::ShiprocketClient;

/// A shipping label as handed back by a carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelArtifact {
    /// The carrier hosts the document and returns a URL.
    Url(String),
    /// The carrier embeds the document bytes in its response.
    Bytes(Vec<u8>),
}

/// Normalized result of a successful booking call.
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    /// Carrier-issued AWB number.
    pub awb_number: String,
    /// Carrier-internal shipment/order id, when issued.
    pub shipment_id: Option<String>,
    /// Label returned inline with the booking, when the carrier does that.
    pub label: Option<LabelArtifact>,
    /// Full raw response body, kept for audit.
    pub raw: serde_json::Value,
}

/// Normalized result of a pickup registration.
#[derive(Debug, Clone)]
pub struct PickupConfirmation {
    /// Carrier confirmation/token number, when issued.
    pub confirmation: Option<String>,
    /// Full raw response body.
    pub raw: serde_json::Value,
}

/// A carrier-hosted document (invoice, manifest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// URL of the hosted document.
    pub url: String,
}

/// The operations every carrier integration provides.
///
/// Implementations receive the profile on every call rather than at
/// construction so one client instance serves all profiles of its carrier.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Which carrier this client talks to.
    fn carrier(&self) -> Carrier;

    /// Book a shipment, returning the issued AWB.
    async fn create_shipment(
        &self,
        profile: &CarrierProfile,
        request: &ShipmentRequest,
    ) -> Result<BookingConfirmation, ShippingError>;

    /// Poll tracking state for an AWB.
    async fn track(
        &self,
        profile: &CarrierProfile,
        awb: &str,
    ) -> Result<TrackingSnapshot, ShippingError>;

    /// Register a pickup for one or more booked shipments.
    async fn schedule_pickup(
        &self,
        profile: &CarrierProfile,
        request: &PickupRequest,
    ) -> Result<PickupConfirmation, ShippingError>;

    /// Cancel a booked shipment.
    async fn cancel(
        &self,
        profile: &CarrierProfile,
        awb: &str,
    ) -> Result<serde_json::Value, ShippingError>;

    /// Fetch the carrier-hosted label for a booked shipment.
    ///
    /// Returns `Ok(None)` when this carrier has no label endpoint (Blue
    /// Dart returns its label inline at booking time instead).
    async fn fetch_label(
        &self,
        profile: &CarrierProfile,
        awb: &str,
        shipment_id: Option<&str>,
    ) -> Result<Option<LabelArtifact>, ShippingError>;

    /// Fetch the carrier-hosted invoice document for carrier ids.
    async fn invoice(
        &self,
        profile: &CarrierProfile,
        ids: &[String],
    ) -> Result<DocumentRef, ShippingError>;

    /// Generate and fetch a pickup manifest for carrier ids.
    async fn manifest(
        &self,
        profile: &CarrierProfile,
        ids: &[String],
    ) -> Result<DocumentRef, ShippingError>;
}

/// Static dispatch over the two carrier clients.
///
/// The orchestrator holds one of each and picks by the resolved carrier;
/// the enum keeps that lookup infallible.
#[derive(Debug, Clone)]
pub enum CarrierClient {
    /// Shiprocket client.
    Shiprocket(ShiprocketClient),
    /// Blue Dart client.
    BlueDart(BlueDartClient),
}

impl CarrierClient {
    /// The client as a trait object.
    #[must_use]
    pub fn api(&self) -> &dyn CarrierApi {
        match self {
            Self::Shiprocket(client) => client,
            Self::BlueDart(client) => client,
        }
    }
}

/// A carrier HTTP response after the retry loop: final status plus parsed
/// body. Non-2xx statuses are NOT an error here; business-level rejection
/// mapping is carrier-specific and happens in the caller.
pub(crate) struct CarrierResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl CarrierResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Send an authenticated carrier request with the shared failure policy:
///
/// - 5xx and transport errors retry with exponential backoff, up to
///   `retry.max_retries` retries after the initial call;
/// - a single 401 triggers token invalidation and one replay, outside the
///   retry budget; a second 401 is an auth failure;
/// - any other status is returned to the caller for business-level mapping.
///
/// `build` constructs a fresh request from the current bearer token on
/// every attempt.
pub(crate) async fn send_with_retry<F>(
    tokens: &TokenManager,
    retry: &RetryConfig,
    profile: &CarrierProfile,
    operation: &'static str,
    build: F,
) -> Result<CarrierResponse, ShippingError>
where
    F: Fn(&SecretString) -> reqwest::RequestBuilder + Send + Sync,
{
    let carrier = profile.carrier;
    let mut replayed = false;
    let mut failures: u32 = 0;

    loop {
        let token = tokens.bearer_token(profile).await?;
        let last_error = match build(&token).send().await {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::UNAUTHORIZED {
                    if replayed {
                        return Err(ShippingError::Auth {
                            carrier,
                            message: format!("{operation}: token rejected after refresh"),
                        });
                    }
                    // One refresh-and-replay, not counted against retries.
                    replayed = true;
                    tokens.invalidate(profile).await?;
                    continue;
                }
                if !status.is_server_error() {
                    let body = parse_body(response).await;
                    return Ok(CarrierResponse { status, body });
                }
                format!("HTTP {status}")
            }
            Err(e) => e.to_string(),
        };

        failures += 1;
        if failures > retry.max_retries {
            return Err(ShippingError::Transient {
                carrier,
                operation,
                attempts: failures,
                message: last_error,
            });
        }
        warn!(
            %carrier,
            operation,
            attempt = failures,
            error = %last_error,
            "transient carrier failure, retrying"
        );
        retry.wait(failures).await;
    }
}

/// Parse a response body as JSON, falling back to the raw text.
async fn parse_body(response: reqwest::Response) -> serde_json::Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}
