//! Blue Dart API gateway client.
//!
//! Auth is a client-id/client-secret exchange for a JWT valid ~24 hours,
//! sent on every call in the `JWTToken` header. Business calls additionally
//! carry a per-request `Profile` block with the login ID and license key.
//! Bookings return the label PDF inline (`AWBPrintContent`), so there is no
//! separate label endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{NaiveDateTime, TimeDelta, Utc};
use dogeared_core::Carrier;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::ShippingConfig;
use crate::crypto::SecretCipher;
use crate::error::ShippingError;
use crate::order::TrackingSnapshot;
use crate::profile::{CarrierProfile, ProfileCredentials};
use crate::request::{PaymentMode, PickupRequest, ShipmentRequest};
use crate::token::{AuthToken, TokenManager};

use super::{
    BookingConfirmation, CarrierApi, CarrierResponse, DocumentRef, LabelArtifact,
    PickupConfirmation, send_with_retry,
};

/// Documented lifetime of a Blue Dart JWT.
const TOKEN_TTL_HOURS: i64 = 24;

/// Status timestamps come back as `01-Mar-2025` + `14:30` pairs.
const STATUS_TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Exchange the JWT client pair for a bearer token.
pub(crate) async fn login(
    http: &reqwest::Client,
    base_url: &str,
    client_id: &str,
    client_secret: &SecretString,
) -> Result<AuthToken, ShippingError> {
    let response = http
        .get(format!("{base_url}/in/transportation/token/v1/login"))
        .header("ClientID", client_id)
        .header("clientSecret", client_secret.expose_secret())
        .send()
        .await
        .map_err(|e| ShippingError::Auth {
            carrier: Carrier::BlueDart,
            message: e.to_string(),
        })?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        return Err(ShippingError::Auth {
            carrier: Carrier::BlueDart,
            message: error_message(&body).unwrap_or_else(|| format!("login failed with HTTP {status}")),
        });
    }
    let token = body
        .get("JWTToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ShippingError::Auth {
            carrier: Carrier::BlueDart,
            message: "login response carried no JWT".to_string(),
        })?;

    Ok(AuthToken {
        token: SecretString::from(token.to_string()),
        expires_at: Utc::now() + TimeDelta::hours(TOKEN_TTL_HOURS),
        carrier: Carrier::BlueDart,
    })
}

/// The per-request identity block Blue Dart expects alongside the JWT.
struct RequestProfile {
    login_id: String,
    license_key: SecretString,
    customer_code: String,
    area_code: String,
}

impl RequestProfile {
    fn block(&self) -> Value {
        json!({
            "LoginID": self.login_id,
            "LicenceKey": self.license_key.expose_secret(),
            "Api_type": "S",
        })
    }
}

/// Blue Dart carrier client.
#[derive(Clone)]
pub struct BlueDartClient {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    config: Arc<ShippingConfig>,
    cipher: SecretCipher,
}

impl std::fmt::Debug for BlueDartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlueDartClient")
            .field("base_url", &self.config.bluedart_base_url)
            .finish_non_exhaustive()
    }
}

impl BlueDartClient {
    /// Create a client against the configured gateway.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
        config: Arc<ShippingConfig>,
        cipher: SecretCipher,
    ) -> Self {
        Self {
            http,
            tokens,
            config,
            cipher,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.bluedart_base_url)
    }

    /// Decrypt the profile's license key into the per-request identity block.
    fn request_profile(&self, profile: &CarrierProfile) -> Result<RequestProfile, ShippingError> {
        let ProfileCredentials::BlueDart {
            login_id,
            license_key,
            customer_code,
            area_code,
            ..
        } = &profile.credentials
        else {
            return Err(ShippingError::Validation(
                "profile does not hold Blue Dart credentials".to_string(),
            ));
        };
        Ok(RequestProfile {
            login_id: login_id.clone(),
            license_key: self.cipher.decrypt(license_key)?,
            customer_code: customer_code.clone(),
            area_code: area_code.clone(),
        })
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
                .header("JWTToken", token.expose_secret())
                .json(&payload)
        })
        .await
    }

    /// Map the normalized request into the `GenerateWayBill` payload.
    fn booking_payload(&self, identity: &RequestProfile, request: &ShipmentRequest) -> Value {
        // Certain accounts must book under a substituted shipper code.
        let shipper_code = self
            .config
            .shipper_code(&identity.login_id, &identity.customer_code);
        let sub_product = match request.payment_mode {
            PaymentMode::Cod => self
                .config
                .cod_code
                .clone()
                .unwrap_or_else(|| "C".to_string()),
            PaymentMode::Prepaid => "P".to_string(),
        };
        let commodity = request
            .items
            .iter()
            .map(|item| format!("{} x{}", item.title, item.quantity))
            .collect::<Vec<_>>()
            .join(", ");

        json!({
            "Request": {
                "Consignee": {
                    "ConsigneeName": request.consignee.name,
                    "ConsigneeAddress1": request.consignee.address,
                    "ConsigneeAddress2": request.consignee.city,
                    "ConsigneeAddress3": request.consignee.state,
                    "ConsigneePincode": request.consignee.pincode,
                    "ConsigneeMobile": request.consignee.phone,
                    "ConsigneeEmailID": request.consignee.email,
                },
                "Shipper": {
                    "CustomerCode": shipper_code,
                    "CustomerName": request.consignor.name,
                    "CustomerAddress1": request.consignor.address,
                    "CustomerPincode": request.consignor.pincode,
                    "CustomerMobile": request.consignor.phone,
                    "OriginArea": identity.area_code,
                    "Sender": shipper_code,
                },
                "Services": {
                    "ProductCode": "A",
                    "SubProductCode": sub_product,
                    "PieceCount": 1,
                    "ActualWeight": request.package.chargeable_weight_kg(),
                    "DeclaredValue": request.declared_value.amount(),
                    "CollectableAmount": request.cod_amount.amount(),
                    "CreditReferenceNo": request.order_ref,
                    "Commodity": { "CommodityDetail1": commodity },
                    "Dimensions": [{
                        "Length": request.package.length_cm,
                        "Breadth": request.package.breadth_cm,
                        "Height": request.package.height_cm,
                        "Count": 1,
                    }],
                },
            },
            "Profile": identity.block(),
        })
    }
}

#[async_trait]
impl CarrierApi for BlueDartClient {
    fn carrier(&self) -> Carrier {
        Carrier::BlueDart
    }

    #[instrument(skip_all, fields(order_ref = %request.order_ref))]
    async fn create_shipment(
        &self,
        profile: &CarrierProfile,
        request: &ShipmentRequest,
    ) -> Result<BookingConfirmation, ShippingError> {
        let identity = self.request_profile(profile)?;
        let payload = self.booking_payload(&identity, request);
        let response = self
            .post(
                profile,
                "waybill.create",
                "/in/transportation/waybill/v1/GenerateWayBill",
                payload,
            )
            .await?;
        let result = response
            .body
            .get("GenerateWayBillResult")
            .unwrap_or(&Value::Null);
        if !response.is_success() || is_error(result) {
            return Err(rejected(&response, result, "waybill generation failed"));
        }

        let awb = result
            .get("AWBNo")
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ShippingError::CarrierRejected {
                carrier: Carrier::BlueDart,
                code: None,
                message: "no AWB assigned".to_string(),
            })?;
        let label = result
            .get("AWBPrintContent")
            .and_then(decode_print_content)
            .map(LabelArtifact::Bytes);

        debug!(awb, "waybill generated");
        let awb = awb.to_string();
        // The raw audit copy drops the inline label bytes; they are large
        // and land in the artifact store instead.
        let mut raw = response.body.clone();
        if let Some(result) = raw
            .get_mut("GenerateWayBillResult")
            .and_then(Value::as_object_mut)
        {
            result.remove("AWBPrintContent");
        }
        Ok(BookingConfirmation {
            awb_number: awb,
            shipment_id: None,
            label,
            raw,
        })
    }

    #[instrument(skip_all, fields(awb))]
    async fn track(
        &self,
        profile: &CarrierProfile,
        awb: &str,
    ) -> Result<TrackingSnapshot, ShippingError> {
        let identity = self.request_profile(profile)?;
        let url = self.url("/in/transportation/tracking/v1/shipment");
        let response = send_with_retry(
            &self.tokens,
            &self.config.retry,
            profile,
            "track",
            |token| {
                self.http
                    .get(&url)
                    .header("JWTToken", token.expose_secret())
                    .query(&[
                        ("handler", "tnt"),
                        ("action", "custawbquery"),
                        ("loginid", identity.login_id.as_str()),
                        ("awb", "awbno"),
                        ("numbers", awb),
                        ("lickey", identity.license_key.expose_secret()),
                        ("format", "json"),
                        ("scan", "1"),
                    ])
            },
        )
        .await?;
        if !response.is_success() {
            return Err(rejected(&response, &Value::Null, "tracking query failed"));
        }
        Ok(parse_tracking(&response.body))
    }

    #[instrument(skip_all)]
    async fn schedule_pickup(
        &self,
        profile: &CarrierProfile,
        request: &PickupRequest,
    ) -> Result<PickupConfirmation, ShippingError> {
        if request.awb_numbers.is_empty() {
            return Err(ShippingError::Validation(
                "pickup requires at least one AWB".to_string(),
            ));
        }
        let identity = self.request_profile(profile)?;
        let payload = json!({
            "request": {
                "AreaCode": identity.area_code,
                "CustomerCode": identity.customer_code,
                "CustomerName": request.pickup_address.name,
                "CustomerAddress1": request.pickup_address.address,
                "CustomerPincode": request.pickup_address.pincode,
                "ContactPersonName": request.pickup_address.name,
                "MobileTelNo": request.pickup_address.phone,
                "ShipmentPickupDate": request.pickup_date.format("%Y-%m-%d").to_string(),
                "NumberofPieces": request.awb_numbers.len(),
                "WeightofShipment": request.chargeable_weight_kg,
                "AWBNo": request.awb_numbers,
                "ProductCode": "A",
            },
            "profile": identity.block(),
        });
        let response = self
            .post(
                profile,
                "pickup",
                "/in/transportation/pickup/v1/RegisterPickup",
                payload,
            )
            .await?;
        let result = response
            .body
            .get("RegisterPickupResult")
            .unwrap_or(&Value::Null);
        if !response.is_success() || is_error(result) {
            return Err(rejected(&response, result, "pickup registration failed"));
        }
        let confirmation = result
            .get("TokenNumber")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
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
        let identity = self.request_profile(profile)?;
        let payload = json!({
            "Request": { "AWBNo": awb },
            "Profile": identity.block(),
        });
        let response = self
            .post(
                profile,
                "cancel",
                "/in/transportation/waybill/v1/CancelWaybill",
                payload,
            )
            .await?;
        let result = response
            .body
            .get("CancelWaybillResult")
            .unwrap_or(&Value::Null);
        if !response.is_success() || is_error(result) {
            return Err(rejected(&response, result, "cancellation failed"));
        }
        Ok(response.body)
    }

    async fn fetch_label(
        &self,
        _profile: &CarrierProfile,
        _awb: &str,
        _shipment_id: Option<&str>,
    ) -> Result<Option<LabelArtifact>, ShippingError> {
        // The label arrives inline with the booking response; there is no
        // separate retrieval endpoint.
        Ok(None)
    }

    async fn invoice(
        &self,
        _profile: &CarrierProfile,
        _ids: &[String],
    ) -> Result<DocumentRef, ShippingError> {
        Err(ShippingError::Validation(
            "Blue Dart exposes no invoice document endpoint".to_string(),
        ))
    }

    async fn manifest(
        &self,
        _profile: &CarrierProfile,
        _ids: &[String],
    ) -> Result<DocumentRef, ShippingError> {
        Err(ShippingError::Validation(
            "Blue Dart exposes no manifest document endpoint".to_string(),
        ))
    }
}

/// Whether a gateway result block reports a business error.
fn is_error(result: &Value) -> bool {
    result.get("IsError").and_then(Value::as_bool) == Some(true)
}

/// First status line of a gateway result block, when present.
fn error_message(result: &Value) -> Option<String> {
    result
        .pointer("/Status/0/StatusInformation")
        .or_else(|| result.get("error-response").and_then(|e| e.pointer("/0/StatusInformation")))
        .or_else(|| result.get("Message"))
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Map a failed gateway call to a business rejection.
fn rejected(response: &CarrierResponse, result: &Value, fallback: &str) -> ShippingError {
    ShippingError::CarrierRejected {
        carrier: Carrier::BlueDart,
        code: Some(response.status.as_u16().to_string()),
        message: error_message(result)
            .or_else(|| error_message(&response.body))
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Decode `AWBPrintContent`, which arrives either as a JSON byte array or
/// as a base64 string depending on the gateway version.
fn decode_print_content(content: &Value) -> Option<Vec<u8>> {
    match content {
        Value::Array(numbers) => {
            let bytes: Option<Vec<u8>> = numbers
                .iter()
                .map(|n| n.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            bytes.filter(|b| !b.is_empty())
        }
        Value::String(encoded) => BASE64.decode(encoded).ok().filter(|b| !b.is_empty()),
        _ => None,
    }
}

/// Normalize the tracking envelope into a [`TrackingSnapshot`].
fn parse_tracking(body: &Value) -> TrackingSnapshot {
    let shipment = body.pointer("/ShipmentData/Shipment/0");
    let status = shipment
        .and_then(|s| s.get("Status"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let delivered = shipment
        .and_then(|s| s.get("StatusType"))
        .and_then(Value::as_str)
        == Some("DL");
    let scan = shipment.and_then(|s| s.pointer("/Scans/ScanDetail/0"));
    let location = scan
        .and_then(|s| s.get("ScannedLocation"))
        .and_then(Value::as_str)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    let last_update = shipment.and_then(|s| {
        let date = s.get("StatusDate").and_then(Value::as_str)?;
        let time = s.get("StatusTime").and_then(Value::as_str)?;
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), STATUS_TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    });

    TrackingSnapshot {
        status,
        location,
        last_update,
        delivered,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_print_content_byte_array() {
        let content = json!([37, 80, 68, 70]);
        assert_eq!(decode_print_content(&content).unwrap(), b"%PDF");
    }

    #[test]
    fn test_decode_print_content_base64() {
        let content = json!(BASE64.encode(b"%PDF-1.4"));
        assert_eq!(decode_print_content(&content).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_decode_print_content_rejects_junk() {
        assert!(decode_print_content(&json!(null)).is_none());
        assert!(decode_print_content(&json!([])).is_none());
        assert!(decode_print_content(&json!([300])).is_none());
    }

    #[test]
    fn test_error_message_from_status_block() {
        let result = json!({
            "IsError": true,
            "Status": [{"StatusInformation": "ServiceArea not serviceable"}],
        });
        assert!(is_error(&result));
        assert_eq!(
            error_message(&result).unwrap(),
            "ServiceArea not serviceable"
        );
    }

    #[test]
    fn test_is_error_defaults_false() {
        assert!(!is_error(&json!({})));
        assert!(!is_error(&json!({"IsError": false})));
    }

    #[test]
    fn test_parse_tracking_normalizes_envelope() {
        let body = json!({
            "ShipmentData": {
                "Shipment": [{
                    "Status": "Shipment Delivered",
                    "StatusType": "DL",
                    "StatusDate": "14-Mar-2025",
                    "StatusTime": "16:45",
                    "Scans": {
                        "ScanDetail": [{"ScannedLocation": "Pune Hub"}],
                    },
                }],
            }
        });
        let snapshot = parse_tracking(&body);
        assert_eq!(snapshot.status, "Shipment Delivered");
        assert!(snapshot.delivered);
        assert_eq!(snapshot.location.as_deref(), Some("Pune Hub"));
        assert!(snapshot.last_update.is_some());
    }

    #[test]
    fn test_parse_tracking_undelivered_is_not_delivered() {
        let body = json!({
            "ShipmentData": {
                "Shipment": [{"Status": "Shipment Undelivered", "StatusType": "UD"}],
            }
        });
        assert!(!parse_tracking(&body).delivered);
    }
}
