//! In-process fake carrier gateways.
//!
//! Each fake binds an ephemeral local port, serves the routes the real
//! clients call, and counts every hit per route so tests can assert on the
//! exact number of network calls. Behavior switches (reject logins, force
//! 503s, rotate the valid token) let tests drive the failure paths.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// Shared behavior switches and hit counters for one fake gateway.
#[derive(Debug, Default)]
pub struct GatewayState {
    /// Hits on the login route.
    pub login_calls: AtomicUsize,
    /// Hits on the booking route.
    pub create_calls: AtomicUsize,
    /// Hits on the tracking route.
    pub track_calls: AtomicUsize,
    /// Hits on the pickup route.
    pub pickup_calls: AtomicUsize,
    /// Hits on the cancellation route.
    pub cancel_calls: AtomicUsize,
    /// Hits on the label route (Shiprocket only).
    pub label_calls: AtomicUsize,
    /// Hits on the invoice and manifest routes (Shiprocket only).
    pub document_calls: AtomicUsize,
    /// When set, logins fail with HTTP 401.
    pub reject_logins: AtomicBool,
    /// When set, bookings fail with HTTP 503.
    pub break_bookings: AtomicBool,
    /// When set, every business call gets a 401 even with a fresh token.
    pub reject_all_tokens: AtomicBool,
    token_seq: AtomicUsize,
    current_token: Mutex<Option<String>>,
    awb_seq: AtomicUsize,
}

impl GatewayState {
    /// Invalidate every token issued so far without telling the client.
    ///
    /// The next business call with a previously issued token gets a 401;
    /// a fresh login issues a token the gateway accepts again.
    pub async fn revoke_tokens(&self) {
        *self.current_token.lock().await = None;
    }

    async fn issue_token(&self, prefix: &str) -> String {
        let n = self.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("{prefix}-{n}");
        *self.current_token.lock().await = Some(token.clone());
        token
    }

    async fn accepts(&self, presented: Option<&str>) -> bool {
        if self.reject_all_tokens.load(Ordering::SeqCst) {
            return false;
        }
        match (&*self.current_token.lock().await, presented) {
            (Some(current), Some(presented)) => current == presented,
            _ => false,
        }
    }

    fn next_awb(&self, prefix: &str) -> String {
        let n = self.awb_seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n:06}")
    }
}

async fn bind() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    (listener, format!("http://{addr}"))
}

fn serve(listener: tokio::net::TcpListener, router: Router) {
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
}

// ---------------------------------------------------------------------------
// Shiprocket
// ---------------------------------------------------------------------------

/// A fake Shiprocket API.
#[derive(Debug, Clone)]
pub struct FakeShiprocket {
    /// Base URL to point the shipping config at.
    pub base_url: String,
    /// Counters and behavior switches.
    pub state: Arc<GatewayState>,
}

impl FakeShiprocket {
    /// Bind and serve on an ephemeral local port.
    pub async fn start() -> Self {
        let state = Arc::new(GatewayState::default());
        let router = Router::new()
            .route("/v1/external/auth/login", post(sr_login))
            .route(
                "/v1/external/shipments/create/forward-shipment",
                post(sr_create),
            )
            .route("/v1/external/courier/track/awb/{awb}", get(sr_track))
            .route("/v1/external/courier/generate/pickup", post(sr_pickup))
            .route("/v1/external/orders/cancel/shipment/awbs", post(sr_cancel))
            .route("/v1/external/courier/generate/label", post(sr_label))
            .route("/v1/external/orders/print/invoice", post(sr_invoice))
            .route("/v1/external/manifests/generate", post(sr_manifest))
            .with_state(Arc::clone(&state));
        let (listener, base_url) = bind().await;
        serve(listener, router);
        Self { base_url, state }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn sr_login(
    State(state): State<Arc<GatewayState>>,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if state.reject_logins.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        );
    }
    let token = state.issue_token("sr-token").await;
    (StatusCode::OK, Json(json!({"token": token})))
}

async fn sr_create(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    if state.break_bookings.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "upstream unavailable"})),
        );
    }
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    let order_ref = body.get("order_id").and_then(Value::as_str).unwrap_or("");
    if order_ref.contains("REJECT") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "pincode not serviceable"})),
        );
    }
    let awb = state.next_awb("SR");
    let shipment_id = 420_000 + state.awb_seq.load(Ordering::SeqCst);
    (
        StatusCode::OK,
        Json(json!({
            "payload": {
                "awb_code": awb,
                "shipment_id": shipment_id,
            }
        })),
    )
}

async fn sr_track(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(_awb): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.track_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "tracking_data": {
                "shipment_track": [{"current_status": "In Transit"}],
                "shipment_track_activities": [{
                    "date": "2026-08-20 11:05:00",
                    "location": "Nagpur Hub",
                }],
            }
        })),
    )
}

async fn sr_pickup(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.pickup_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"response": {"pickup_token_number": "PK-7001"}})),
    )
}

async fn sr_cancel(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.cancel_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    (StatusCode::OK, Json(json!({"message": "cancelled"})))
}

async fn sr_label(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.label_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    let id = body
        .pointer("/shipment_id/0")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (
        StatusCode::OK,
        Json(json!({
            "label_url": format!("https://cdn.shiprocket.test/labels/{id}.pdf")
        })),
    )
}

async fn sr_invoice(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.document_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    let id = body
        .pointer("/ids/0")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (
        StatusCode::OK,
        Json(json!({
            "invoice_url": format!("https://cdn.shiprocket.test/invoices/{id}.pdf")
        })),
    )
}

async fn sr_manifest(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.document_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(bearer(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized"})),
        );
    }
    let id = body
        .pointer("/shipment_id/0")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (
        StatusCode::OK,
        Json(json!({
            "manifest_url": format!("https://cdn.shiprocket.test/manifests/{id}.pdf")
        })),
    )
}

// ---------------------------------------------------------------------------
// Blue Dart
// ---------------------------------------------------------------------------

/// A fake Blue Dart API gateway.
#[derive(Debug, Clone)]
pub struct FakeBlueDart {
    /// Base URL to point the shipping config at.
    pub base_url: String,
    /// Counters and behavior switches.
    pub state: Arc<GatewayState>,
}

/// Inline label bytes the fake returns on every booking.
pub const BLUEDART_LABEL_BYTES: &[u8] = b"%PDF-1.4 fake bluedart label";

impl FakeBlueDart {
    /// Bind and serve on an ephemeral local port.
    pub async fn start() -> Self {
        let state = Arc::new(GatewayState::default());
        let router = Router::new()
            .route("/in/transportation/token/v1/login", get(bd_login))
            .route(
                "/in/transportation/waybill/v1/GenerateWayBill",
                post(bd_create),
            )
            .route("/in/transportation/tracking/v1/shipment", get(bd_track))
            .route(
                "/in/transportation/pickup/v1/RegisterPickup",
                post(bd_pickup),
            )
            .route(
                "/in/transportation/waybill/v1/CancelWaybill",
                post(bd_cancel),
            )
            .with_state(Arc::clone(&state));
        let (listener, base_url) = bind().await;
        serve(listener, router);
        Self { base_url, state }
    }
}

fn jwt(headers: &HeaderMap) -> Option<&str> {
    headers.get("JWTToken").and_then(|v| v.to_str().ok())
}

async fn bd_login(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if state.reject_logins.load(Ordering::SeqCst) || headers.get("ClientID").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error-response": [{"StatusInformation": "Invalid client credentials"}]
            })),
        );
    }
    let token = state.issue_token("bd-jwt").await;
    (StatusCode::OK, Json(json!({"JWTToken": token})))
}

async fn bd_create(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    if state.break_bookings.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"Message": "gateway timeout"})),
        );
    }
    if !state.accepts(jwt(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Message": "Invalid JWT"})),
        );
    }
    let awb = state.next_awb("79");
    let print_content: Vec<u8> = BLUEDART_LABEL_BYTES.to_vec();
    (
        StatusCode::OK,
        Json(json!({
            "GenerateWayBillResult": {
                "IsError": false,
                "AWBNo": awb,
                "AWBPrintContent": print_content,
            }
        })),
    )
}

async fn bd_track(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.track_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(jwt(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Message": "Invalid JWT"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "ShipmentData": {
                "Shipment": [{
                    "Status": "In Transit",
                    "StatusType": "IT",
                    "StatusDate": "20-Aug-2026",
                    "StatusTime": "11:05",
                    "Scans": {"ScanDetail": [{"ScannedLocation": "Pune Hub"}]},
                }],
            }
        })),
    )
}

async fn bd_pickup(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.pickup_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(jwt(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Message": "Invalid JWT"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "RegisterPickupResult": {"IsError": false, "TokenNumber": "TOK-31337"}
        })),
    )
}

async fn bd_cancel(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.cancel_calls.fetch_add(1, Ordering::SeqCst);
    if !state.accepts(jwt(&headers)).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Message": "Invalid JWT"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"CancelWaybillResult": {"IsError": false}})),
    )
}
