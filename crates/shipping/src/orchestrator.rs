//! Single authority for order-to-carrier interactions.
//!
//! Every booking, tracking poll, pickup, cancellation and label request
//! flows through [`ShipmentOrchestrator`]. It owns carrier selection,
//! profile resolution, the idempotency guard, and the persistence of every
//! outcome; the carrier clients never touch the order store themselves.
//!
//! # Idempotency
//!
//! Two layers guard against double booking. An entry check on the loaded
//! order short-circuits to `Skipped` without a carrier call; the order
//! store's [`OrderStore::claim_booking`] compare-and-set then closes the
//! remaining race, so a concurrent winner downgrades this call's result to
//! `Skipped` and the carrier-issued duplicate AWB is simply not persisted.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use dogeared_core::{Carrier, OrderId, OwnerId};
use tracing::{info, instrument, warn};

use crate::carriers::{
    BlueDartClient, CarrierApi, CarrierClient, DocumentRef, LabelArtifact, PickupConfirmation,
    ShiprocketClient,
};
use crate::config::ShippingConfig;
use crate::crypto::SecretCipher;
use crate::error::ShippingError;
use crate::label::{LabelRenderer, LabelSheet};
use crate::order::{LabelStatus, LogKind, Order, ShipmentLog, ShipmentStatus, TrackingSnapshot};
use crate::profile::CarrierProfile;
use crate::request::{self, DimensionOverride, PickupRequest};
use crate::store::{
    ArtifactStore, BookingRecord, ClaimOutcome, OrderStore, ProfileStore, ShipmentUpdate,
};
use crate::token::TokenManager;

/// Per-call options for shipment creation.
#[derive(Debug, Clone, Default)]
pub struct ShipmentOptions {
    /// Carrier to book with; falls back to the order's provider field.
    pub carrier: Option<Carrier>,
    /// Explicit dimension overrides, beating order and profile values.
    pub dimensions: DimensionOverride,
}

/// Result of a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShipmentOutcome {
    /// A new booking was made and persisted.
    Booked {
        /// Carrier-issued AWB number.
        awb_number: String,
        /// Carrier-internal shipment id, when issued.
        shipment_id: Option<String>,
    },
    /// A booking already existed; nothing was booked.
    Skipped {
        /// The pre-existing AWB number.
        awb_number: String,
    },
}

/// Orchestrates order-to-carrier operations and their persistence.
pub struct ShipmentOrchestrator {
    orders: Arc<dyn OrderStore>,
    profiles: Arc<dyn ProfileStore>,
    tokens: Arc<TokenManager>,
    shiprocket: CarrierClient,
    bluedart: CarrierClient,
    labels: LabelRenderer,
}

impl std::fmt::Debug for ShipmentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipmentOrchestrator").finish_non_exhaustive()
    }
}

impl ShipmentOrchestrator {
    /// Wire up the orchestrator and both carrier clients.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        profiles: Arc<dyn ProfileStore>,
        artifacts: Arc<dyn ArtifactStore>,
        tokens: Arc<TokenManager>,
        cipher: SecretCipher,
        http: reqwest::Client,
        config: Arc<ShippingConfig>,
    ) -> Self {
        let shiprocket = CarrierClient::Shiprocket(ShiprocketClient::new(
            http.clone(),
            Arc::clone(&tokens),
            Arc::clone(&config),
        ));
        let bluedart = CarrierClient::BlueDart(BlueDartClient::new(
            http,
            Arc::clone(&tokens),
            Arc::clone(&config),
            cipher,
        ));
        let labels = LabelRenderer::new(artifacts, config.label_folder.clone());
        Self {
            orders,
            profiles,
            tokens,
            shiprocket,
            bluedart,
            labels,
        }
    }

    fn client(&self, carrier: Carrier) -> &dyn CarrierApi {
        match carrier {
            Carrier::Shiprocket => self.shiprocket.api(),
            Carrier::BlueDart => self.bluedart.api(),
        }
    }

    async fn load(&self, id: &OrderId) -> Result<Order, ShippingError> {
        self.orders
            .find_by_id(id)
            .await?
            .ok_or_else(|| ShippingError::NotFound(format!("order {id}")))
    }

    async fn active_profile(
        &self,
        owner: OwnerId,
        carrier: Carrier,
    ) -> Result<CarrierProfile, ShippingError> {
        self.profiles
            .active_profile(owner, carrier)
            .await?
            .ok_or_else(|| ShippingError::NotFound(format!("no active {carrier} profile")))
    }

    /// Book a shipment for an order. Idempotent: an existing booking for
    /// the resolved carrier results in `Skipped`, never a second AWB.
    ///
    /// On carrier failure the order is marked `create_status = "failed"`
    /// with an error log entry, the AWB slot stays empty (retryable), and
    /// the error is re-raised.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing order or active profile, `Validation` for
    /// bad shipment fields (no network call was made), plus any carrier
    /// error from the booking call itself.
    #[instrument(skip(self, options), fields(%order_id, %owner))]
    pub async fn create_shipment(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        options: &ShipmentOptions,
    ) -> Result<ShipmentOutcome, ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, options.carrier)?;
        let profile = self.active_profile(owner, carrier).await?;

        // Entry guard: never book twice for the same (order, provider).
        if let Some(awb) = order.booked_awb(carrier) {
            return Ok(ShipmentOutcome::Skipped {
                awb_number: awb.to_string(),
            });
        }

        let shipment_request = request::build_request(
            &order,
            profile.consignor.clone(),
            &options.dimensions,
            &profile.defaults,
        );
        shipment_request.validate()?;
        let request_json = serde_json::to_value(&shipment_request).ok();

        let confirmation = match self
            .client(carrier)
            .create_shipment(&profile, &shipment_request)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(err) => {
                let log = ShipmentLog::failure(
                    LogKind::WaybillCreate,
                    request_json,
                    err.to_string(),
                );
                let update = ShipmentUpdate::CreateFailed {
                    error: err.to_string(),
                    log,
                };
                if let Err(store_err) = self.orders.apply_update(order_id, carrier, update).await {
                    warn!(error = %store_err, "failed to persist booking failure");
                }
                return Err(err);
            }
        };

        let record = BookingRecord {
            awb_number: confirmation.awb_number.clone(),
            shipment_id: confirmation.shipment_id.clone(),
            raw_response: confirmation.raw.clone(),
            log: ShipmentLog::success(
                LogKind::WaybillCreate,
                request_json,
                Some(confirmation.raw.clone()),
            ),
        };
        match self.orders.claim_booking(order_id, carrier, record).await? {
            ClaimOutcome::Claimed => {
                info!(awb = %confirmation.awb_number, %carrier, "shipment booked");
                if let Some(label) = confirmation.label {
                    // Best effort: a label hiccup must not fail the booking.
                    self.persist_booking_label(order_id, carrier, &confirmation.awb_number, label)
                        .await;
                }
                Ok(ShipmentOutcome::Booked {
                    awb_number: confirmation.awb_number,
                    shipment_id: confirmation.shipment_id,
                })
            }
            ClaimOutcome::AlreadyBooked { awb } => {
                warn!(
                    winner = %awb,
                    duplicate = %confirmation.awb_number,
                    "lost booking race, discarding duplicate AWB"
                );
                Ok(ShipmentOutcome::Skipped { awb_number: awb })
            }
        }
    }

    /// Poll and persist tracking state for a booked order.
    ///
    /// # Errors
    ///
    /// `NotFound` when the order or booking is missing, plus carrier errors.
    #[instrument(skip(self), fields(%order_id, %owner))]
    pub async fn track(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<TrackingSnapshot, ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, carrier)?;
        let profile = self.active_profile(owner, carrier).await?;
        let awb = booked_awb(&order, carrier)?;

        let snapshot = self.client(carrier).track(&profile, &awb).await?;
        let log = ShipmentLog::success(
            LogKind::Track,
            None,
            serde_json::to_value(&snapshot).ok(),
        );
        self.orders
            .apply_update(
                order_id,
                carrier,
                ShipmentUpdate::Tracking {
                    snapshot: snapshot.clone(),
                    log,
                },
            )
            .await?;
        Ok(snapshot)
    }

    /// Register a carrier pickup for one booked order.
    ///
    /// The payload carries the chargeable weight, which governs what the
    /// carrier bills the pickup at.
    ///
    /// # Errors
    ///
    /// `NotFound` when the order or booking is missing, plus carrier errors.
    #[instrument(skip(self), fields(%order_id, %owner, %pickup_date))]
    pub async fn schedule_pickup(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        pickup_date: NaiveDate,
        carrier: Option<Carrier>,
    ) -> Result<PickupConfirmation, ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, carrier)?;
        let profile = self.active_profile(owner, carrier).await?;
        let awb = booked_awb(&order, carrier)?;
        let shipment_ids = order
            .provider_shipment(carrier)
            .and_then(|s| s.shipment_id.clone())
            .into_iter()
            .collect();

        let package =
            request::resolve_package(&DimensionOverride::default(), &order, &profile.defaults);
        let pickup = PickupRequest {
            pickup_address: profile.consignor.clone(),
            pickup_date,
            awb_numbers: vec![awb],
            shipment_ids,
            chargeable_weight_kg: package.chargeable_weight_kg(),
        };
        let confirmation = self
            .client(carrier)
            .schedule_pickup(&profile, &pickup)
            .await?;

        let scheduled_at = pickup_date.and_time(NaiveTime::MIN).and_utc();
        let log = ShipmentLog::success(
            LogKind::Pickup,
            serde_json::to_value(&pickup).ok(),
            Some(confirmation.raw.clone()),
        );
        self.orders
            .apply_update(
                order_id,
                carrier,
                ShipmentUpdate::PickupScheduled { scheduled_at, log },
            )
            .await?;
        Ok(confirmation)
    }

    /// Cancel a booked shipment with the carrier.
    ///
    /// Success persists the terminal `Cancelled` state; failure leaves the
    /// booking untouched. Cancelling an already-cancelled shipment is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` when the order or booking is missing, plus carrier errors.
    #[instrument(skip(self), fields(%order_id, %owner))]
    pub async fn cancel(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<(), ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, carrier)?;
        let profile = self.active_profile(owner, carrier).await?;
        let awb = booked_awb(&order, carrier)?;
        if order
            .provider_shipment(carrier)
            .is_some_and(|s| s.status == ShipmentStatus::Cancelled)
        {
            return Ok(());
        }

        let raw = self.client(carrier).cancel(&profile, &awb).await?;
        let log = ShipmentLog::success(LogKind::Cancel, None, Some(raw));
        self.orders
            .apply_update(order_id, carrier, ShipmentUpdate::Cancelled { log })
            .await?;
        info!(%awb, %carrier, "shipment cancelled");
        Ok(())
    }

    /// Return the stored label URL, generating and storing one if needed.
    ///
    /// Precedence: stored URL (idempotent) > carrier-hosted document >
    /// locally synthesized PDF.
    ///
    /// # Errors
    ///
    /// `NotFound("shipment not booked")` when there is no booking to label
    /// (distinct from a missing label, which is generated on the spot);
    /// `Label` when rendering or storage fails.
    #[instrument(skip(self), fields(%order_id, %owner))]
    pub async fn get_or_generate_label(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<String, ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, carrier)?;
        let profile = self.active_profile(owner, carrier).await?;
        let awb = booked_awb(&order, carrier)?;

        let shipment = order
            .provider_shipment(carrier)
            .ok_or_else(|| ShippingError::NotFound("shipment not booked".to_string()))?;
        if let (Some(url), Some(LabelStatus::Generated)) =
            (shipment.label_url.clone(), shipment.label_status)
        {
            return Ok(url);
        }

        let artifact = match self
            .client(carrier)
            .fetch_label(&profile, &awb, shipment.shipment_id.as_deref())
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(error = %e, "carrier label fetch failed, synthesizing locally");
                None
            }
        };
        let stored = match artifact {
            Some(LabelArtifact::Url(url)) => Ok(url),
            Some(LabelArtifact::Bytes(bytes)) => {
                self.labels.store(&awb, bytes).await.map(|a| a.url)
            }
            None => {
                let sheet = LabelSheet::for_order(&order, &profile.consignor, &profile.defaults, &awb);
                match self.labels.synthesize(&sheet) {
                    Ok(bytes) => self.labels.store(&awb, bytes).await.map(|a| a.url),
                    Err(e) => Err(e),
                }
            }
        };

        match stored {
            Ok(url) => {
                let log = ShipmentLog::success(
                    LogKind::Label,
                    None,
                    Some(serde_json::Value::String(url.clone())),
                );
                self.orders
                    .apply_update(
                        order_id,
                        carrier,
                        ShipmentUpdate::Label {
                            url: Some(url.clone()),
                            status: LabelStatus::Generated,
                            log,
                        },
                    )
                    .await?;
                Ok(url)
            }
            Err(err) => {
                let log = ShipmentLog::failure(LogKind::Label, None, err.to_string());
                let update = ShipmentUpdate::Label {
                    url: None,
                    status: LabelStatus::Failed,
                    log,
                };
                if let Err(store_err) = self.orders.apply_update(order_id, carrier, update).await {
                    warn!(error = %store_err, "failed to persist label failure");
                }
                Err(err)
            }
        }
    }

    /// Login round-trip for a profile, reporting token expiry.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Auth`] when credentials are rejected.
    pub async fn verify_credentials(
        &self,
        profile: &CarrierProfile,
    ) -> Result<chrono::DateTime<chrono::Utc>, ShippingError> {
        self.tokens.verify_credentials(profile).await
    }

    /// Fetch the carrier-hosted invoice document for a booked order.
    ///
    /// # Errors
    ///
    /// `NotFound` when the order or booking is missing; `Validation` when
    /// the carrier has no invoice endpoint.
    #[instrument(skip(self), fields(%order_id, %owner))]
    pub async fn invoice(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<DocumentRef, ShippingError> {
        let (profile, carrier, ids) = self.document_target(owner, order_id, carrier).await?;
        self.client(carrier).invoice(&profile, &ids).await
    }

    /// Generate the carrier's pickup manifest for a booked order.
    ///
    /// # Errors
    ///
    /// Same shape as [`Self::invoice`].
    #[instrument(skip(self), fields(%order_id, %owner))]
    pub async fn manifest(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<DocumentRef, ShippingError> {
        let (profile, carrier, ids) = self.document_target(owner, order_id, carrier).await?;
        self.client(carrier).manifest(&profile, &ids).await
    }

    /// Resolve the profile and carrier ids a document call addresses:
    /// the carrier shipment id when one was issued, the AWB otherwise.
    async fn document_target(
        &self,
        owner: OwnerId,
        order_id: &OrderId,
        carrier: Option<Carrier>,
    ) -> Result<(CarrierProfile, Carrier, Vec<String>), ShippingError> {
        let order = self.load(order_id).await?;
        let carrier = resolve_carrier(&order, carrier)?;
        let profile = self.active_profile(owner, carrier).await?;
        let awb = booked_awb(&order, carrier)?;
        let id = order
            .provider_shipment(carrier)
            .and_then(|s| s.shipment_id.clone())
            .unwrap_or(awb);
        Ok((profile, carrier, vec![id]))
    }

    /// Persist an inline booking label; failures are logged, never raised.
    async fn persist_booking_label(
        &self,
        order_id: &OrderId,
        carrier: Carrier,
        awb: &str,
        label: LabelArtifact,
    ) {
        let stored = match label {
            LabelArtifact::Url(url) => Ok(url),
            LabelArtifact::Bytes(bytes) => self.labels.store(awb, bytes).await.map(|a| a.url),
        };
        let update = match stored {
            Ok(url) => ShipmentUpdate::Label {
                url: Some(url.clone()),
                status: LabelStatus::Generated,
                log: ShipmentLog::success(
                    LogKind::Label,
                    None,
                    Some(serde_json::Value::String(url)),
                ),
            },
            Err(e) => {
                warn!(error = %e, "failed to store inline booking label");
                ShipmentUpdate::Label {
                    url: None,
                    status: LabelStatus::Failed,
                    log: ShipmentLog::failure(LogKind::Label, None, e.to_string()),
                }
            }
        };
        if let Err(e) = self.orders.apply_update(order_id, carrier, update).await {
            warn!(error = %e, "failed to persist booking label state");
        }
    }
}

/// Pick the carrier for an operation: explicit choice, then the order's
/// provider field, then the single booked provider.
fn resolve_carrier(order: &Order, explicit: Option<Carrier>) -> Result<Carrier, ShippingError> {
    if let Some(carrier) = explicit {
        return Ok(carrier);
    }
    if let Some(carrier) = order.shipping.provider {
        return Ok(carrier);
    }
    let booked: Vec<Carrier> = [Carrier::Shiprocket, Carrier::BlueDart]
        .into_iter()
        .filter(|c| {
            order
                .provider_shipment(*c)
                .is_some_and(crate::order::ProviderShipment::is_booked)
        })
        .collect();
    match booked.as_slice() {
        [one] => Ok(*one),
        [] => Err(ShippingError::Validation(
            "no carrier selected for order".to_string(),
        )),
        _ => Err(ShippingError::Validation(
            "order is booked with multiple carriers; specify one".to_string(),
        )),
    }
}

/// The booked AWB for the carrier, or `NotFound` when nothing is booked.
fn booked_awb(order: &Order, carrier: Carrier) -> Result<String, ShippingError> {
    order
        .booked_awb(carrier)
        .map(str::to_string)
        .ok_or_else(|| ShippingError::NotFound("shipment not booked".to_string()))
}
