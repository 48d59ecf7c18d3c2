//! Shiprocket API client.
//!
//! Auth is email + password exchanged at `/v1/external/auth/login` for a
//! bearer token valid ~10 days; the token manager persists it across
//! restarts. Bookings go through the forward-shipment endpoint, which
//! creates the order and assigns the AWB in one call.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use dogeared_core::Carrier;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::ShippingConfig;
use crate::error::ShippingError;
use crate::order::TrackingSnapshot;
use crate::profile::CarrierProfile;
use crate::request::{PaymentMode, PickupRequest, ShipmentRequest};
use crate::token::{AuthToken, TokenManager};

use super::{
    BookingConfirmation, CarrierApi, CarrierResponse, DocumentRef, LabelArtifact,
    PickupConfirmation, send_with_retry,
};

/// Documented lifetime of a Shiprocket token.
const TOKEN_TTL_DAYS: i64 = 10;

/// Scan timestamps come back as naive IST-local strings.
const SCAN_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Exchange credentials for a bearer token.
///
/// Kept as a free function so the token manager can drive logins without
/// owning a full client.
pub(crate) async fn login(
    http: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &SecretString,
) -> Result<AuthToken, ShippingError> {
    let response = http
        .post(format!("{base_url}/v1/external/auth/login"))
        .json(&json!({
            "email": email,
            "password": password.expose_secret(),
        }))
        .send()
        .await
        .map_err(|e| ShippingError::Auth {
            carrier: Carrier::Shiprocket,
            message: e.to_string(),
        })?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(ShippingError::Auth {
            carrier: Carrier::Shiprocket,
            message: parse_error(&body, &format!("login failed with HTTP {status}")),
        });
    }
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| ShippingError::Auth {
            carrier: Carrier::Shiprocket,
            message: "login response carried no token".to_string(),
        })?;

    Ok(AuthToken {
        token: SecretString::from(token.to_string()),
        expires_at: Utc::now() + TimeDelta::days(TOKEN_TTL_DAYS),
        carrier: Carrier::Shiprocket,
    })
}

/// Shiprocket carrier client.
#[derive(Clone)]
pub struct ShiprocketClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    config: Arc<ShippingConfig>,
}

impl std::fmt::Debug for ShiprocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShiprocketClient")
            .field("base_url", &self.config.shiprocket_base_url)
            .finish_non_exhaustive()
    }
}

impl ShiprocketClient {
    /// Create a client against the configured base URL.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
        config: Arc<ShippingConfig>,
    ) -> Self {
        Self {
            http,
            tokens,
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.shiprocket_base_url)
    }

    async fn post(
        &self,
        profile: &CarrierProfile,
        operation: &'static str,
        path: &str,
        payload: Value,
    ) -> Result<CarrierResponse, ShippingError> {
        let url = self.url(path);
        send_with_retry(&self.tokens, &self.config.retry, profile, operation, |token| {
            self.http
                .post(&url)
                .bearer_auth(token.expose_secret())
                .json(&payload)
        })
        .await
    }

    /// Map an order into the forward-shipment wire payload.
    fn booking_payload(&self, request: &ShipmentRequest) -> Value {
        // The configured COD code, when pinned, only replaces the COD leg;
        // prepaid shipments always book as "Prepaid".
        let payment_method = match request.payment_mode {
            PaymentMode::Cod => self
                .config
                .cod_code
                .clone()
                .unwrap_or_else(|| "COD".to_string()),
            PaymentMode::Prepaid => "Prepaid".to_string(),
        };
        let items: Vec<Value> = request
            .items
            .iter()
            .map(|item| {
                json!({
                    "name": item.title,
                    "sku": item.sku,
                    "units": item.quantity,
                    "selling_price": item.unit_price.amount(),
                })
            })
            .collect();

        json!({
            "order_id": request.order_ref,
            "order_date": Utc::now().format("%Y-%m-%d %H:%M").to_string(),
            "billing_customer_name": request.consignee.name,
            "billing_last_name": "",
            "billing_address": request.consignee.address,
            "billing_city": request.consignee.city,
            "billing_state": request.consignee.state,
            "billing_pincode": request.consignee.pincode,
            "billing_country": "India",
            "billing_email": request.consignee.email,
            "billing_phone": request.consignee.phone,
            "shipping_is_billing": true,
            "order_items": items,
            "payment_method": payment_method,
            "sub_total": request.declared_value.amount(),
            "length": request.package.length_cm,
            "breadth": request.package.breadth_cm,
            "height": request.package.height_cm,
            "weight": request.package.weight_kg,
        })
    }
}

#[async_trait]
impl CarrierApi for ShiprocketClient {
    fn carrier(&self) -> Carrier {
        Carrier::Shiprocket
    }

    #[instrument(skip_all, fields(order_ref = %request.order_ref))]
    async fn create_shipment(
        &self,
        profile: &CarrierProfile,
        request: &ShipmentRequest,
    ) -> Result<BookingConfirmation, ShippingError> {
        let payload = self.booking_payload(request);
        let response = self
            .post(
                profile,
                "waybill.create",
                "/v1/external/shipments/create/forward-shipment",
                payload,
            )
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "shipment creation failed"));
        }

        let envelope = &response.body;
        let payload = envelope.get("payload").unwrap_or(&Value::Null);
        let awb = payload
            .get("awb_code")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ShippingError::CarrierRejected {
                carrier: Carrier::Shiprocket,
                code: None,
                message: parse_error(envelope, "no AWB assigned"),
            })?;
        let shipment_id = payload
            .get("shipment_id")
            .map(json_id)
            .filter(|id| !id.is_empty());
        let label = payload
            .get("label_url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(|u| LabelArtifact::Url(u.to_string()));

        debug!(awb, "shipment booked");
        Ok(BookingConfirmation {
            awb_number: awb.to_string(),
            shipment_id,
            label,
            raw: response.body.clone(),
        })
    }

    #[instrument(skip_all, fields(awb))]
    async fn track(
        &self,
        profile: &CarrierProfile,
        awb: &str,
    ) -> Result<TrackingSnapshot, ShippingError> {
        let url = self.url(&format!("/v1/external/courier/track/awb/{awb}"));
        let response = send_with_retry(
            &self.tokens,
            &self.config.retry,
            profile,
            "track",
            |token| self.http.get(&url).bearer_auth(token.expose_secret()),
        )
        .await?;
        if !response.is_success() {
            return Err(rejected(&response, "tracking query failed"));
        }
        Ok(parse_tracking(&response.body))
    }

    #[instrument(skip_all)]
    async fn schedule_pickup(
        &self,
        profile: &CarrierProfile,
        request: &PickupRequest,
    ) -> Result<PickupConfirmation, ShippingError> {
        if request.shipment_ids.is_empty() {
            return Err(ShippingError::Validation(
                "pickup requires at least one shipment id".to_string(),
            ));
        }
        let payload = json!({
            "shipment_id": request.shipment_ids,
            "pickup_date": request.pickup_date.format("%Y-%m-%d").to_string(),
        });
        let response = self
            .post(profile, "pickup", "/v1/external/courier/generate/pickup", payload)
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "pickup registration failed"));
        }
        let confirmation = response
            .body
            .pointer("/response/pickup_token_number")
            .map(json_id)
            .filter(|t| !t.is_empty());
        Ok(PickupConfirmation {
            confirmation,
            raw: response.body,
        })
    }

    #[instrument(skip_all, fields(awb))]
    async fn cancel(
        &self,
        profile: &CarrierProfile,
        awb: &str,
    ) -> Result<Value, ShippingError> {
        let payload = json!({ "awbs": [awb] });
        let response = self
            .post(
                profile,
                "cancel",
                "/v1/external/orders/cancel/shipment/awbs",
                payload,
            )
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "cancellation failed"));
        }
        Ok(response.body)
    }

    #[instrument(skip_all, fields(awb))]
    async fn fetch_label(
        &self,
        profile: &CarrierProfile,
        awb: &str,
        shipment_id: Option<&str>,
    ) -> Result<Option<LabelArtifact>, ShippingError> {
        let Some(shipment_id) = shipment_id else {
            // Without the carrier shipment id there is nothing to fetch;
            // the caller falls back to local synthesis.
            return Ok(None);
        };
        let payload = json!({ "shipment_id": [shipment_id] });
        let response = self
            .post(profile, "label", "/v1/external/courier/generate/label", payload)
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "label generation failed"));
        }
        Ok(response
            .body
            .get("label_url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(|u| LabelArtifact::Url(u.to_string())))
    }

    async fn invoice(
        &self,
        profile: &CarrierProfile,
        ids: &[String],
    ) -> Result<DocumentRef, ShippingError> {
        let payload = json!({ "ids": ids });
        let response = self
            .post(profile, "invoice", "/v1/external/orders/print/invoice", payload)
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "invoice generation failed"));
        }
        document_url(&response.body, "invoice_url")
    }

    async fn manifest(
        &self,
        profile: &CarrierProfile,
        ids: &[String],
    ) -> Result<DocumentRef, ShippingError> {
        let payload = json!({ "shipment_id": ids });
        let response = self
            .post(profile, "manifest", "/v1/external/manifests/generate", payload)
            .await?;
        if !response.is_success() {
            return Err(rejected(&response, "manifest generation failed"));
        }
        document_url(&response.body, "manifest_url")
    }
}

/// Pull a document URL field out of a 2xx envelope.
fn document_url(body: &Value, field: &str) -> Result<DocumentRef, ShippingError> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(|u| DocumentRef { url: u.to_string() })
        .ok_or_else(|| ShippingError::CarrierRejected {
            carrier: Carrier::Shiprocket,
            code: None,
            message: parse_error(body, &format!("response carried no {field}")),
        })
}

/// Render a numeric-or-string id field as text.
fn json_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a non-2xx, non-retryable response to a business rejection.
fn rejected(response: &CarrierResponse, fallback: &str) -> ShippingError {
    ShippingError::CarrierRejected {
        carrier: Carrier::Shiprocket,
        code: Some(response.status.as_u16().to_string()),
        message: parse_error(&response.body, fallback),
    }
}

/// Extract the most specific error message from a response envelope.
///
/// Precedence: top-level `message`, then the first entry of the `errors`
/// field-map, then `error`, then the fallback.
fn parse_error(body: &Value, fallback: &str) -> String {
    if let Some(message) = body.get("message").and_then(Value::as_str)
        && !message.is_empty()
    {
        return message.to_string();
    }
    if let Some(errors) = body.get("errors").and_then(Value::as_object) {
        for (field, messages) in errors {
            let detail = match messages {
                Value::Array(list) => list.first().and_then(Value::as_str).map(str::to_string),
                Value::String(s) => Some(s.clone()),
                _ => None,
            };
            if let Some(detail) = detail {
                return format!("{field}: {detail}");
            }
        }
    }
    if let Some(error) = body.get("error").and_then(Value::as_str)
        && !error.is_empty()
    {
        return error.to_string();
    }
    fallback.to_string()
}

/// Normalize the tracking envelope into a [`TrackingSnapshot`].
fn parse_tracking(body: &Value) -> TrackingSnapshot {
    let track = body.pointer("/tracking_data/shipment_track/0");
    let status = track
        .and_then(|t| t.get("current_status"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let activity = body.pointer("/tracking_data/shipment_track_activities/0");
    let location = activity
        .and_then(|a| a.get("location"))
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    let last_update = activity
        .and_then(|a| a.get("date"))
        .and_then(Value::as_str)
        .and_then(|raw| NaiveDateTime::parse_from_str(raw, SCAN_TIMESTAMP_FORMAT).ok())
        .map(|naive| naive.and_utc());
    let delivered = status.eq_ignore_ascii_case("delivered");

    TrackingSnapshot {
        status,
        location,
        last_update,
        delivered,
    }
}
