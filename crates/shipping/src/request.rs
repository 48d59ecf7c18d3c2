//! Normalized shipment request construction and validation.
//!
//! Orders are mapped into one carrier-agnostic [`ShipmentRequest`] here;
//! each carrier client then translates it into its own wire format. All
//! field validation happens on this type BEFORE any network call.

use chrono::NaiveDate;
use dogeared_core::{Address, Money, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ShippingError;
use crate::order::Order;
use crate::profile::PackageDefaults;

/// Carriers price on the greater of actual and volumetric weight;
/// volumetric weight is `L x B x H / 5000` with dimensions in cm.
const VOLUMETRIC_DIVISOR: i64 = 5000;

const MAX_NAME_LEN: usize = 30;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;
const PINCODE_DIGITS: usize = 6;

/// Whether the consignee pays on delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Fully paid online; nothing to collect.
    Prepaid,
    /// Carrier collects the outstanding amount from the consignee.
    Cod,
}

/// Physical package dimensions and weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Actual weight in kilograms.
    pub weight_kg: Decimal,
    /// Length in centimeters.
    pub length_cm: Decimal,
    /// Breadth in centimeters.
    pub breadth_cm: Decimal,
    /// Height in centimeters.
    pub height_cm: Decimal,
}

impl PackageSpec {
    /// Chargeable weight in kilograms: `max(actual, L x B x H / 5000)`.
    #[must_use]
    pub fn chargeable_weight_kg(&self) -> Decimal {
        let volumetric =
            self.length_cm * self.breadth_cm * self.height_cm / Decimal::from(VOLUMETRIC_DIVISOR);
        self.weight_kg.max(volumetric)
    }
}

/// Explicit per-call overrides for package dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimensionOverride {
    /// Override actual weight in kilograms.
    pub weight_kg: Option<Decimal>,
    /// Override length in centimeters.
    pub length_cm: Option<Decimal>,
    /// Override breadth in centimeters.
    pub breadth_cm: Option<Decimal>,
    /// Override height in centimeters.
    pub height_cm: Option<Decimal>,
}

/// A content line carried onto labels and carrier payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentLine {
    /// Stock-keeping unit.
    pub sku: String,
    /// Item title.
    pub title: String,
    /// Quantity.
    pub quantity: u32,
    /// Per-unit price.
    pub unit_price: Money,
}

/// The normalized payload handed to a carrier client.
///
/// Ephemeral: constructed per call, never persisted independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentRequest {
    /// Our reference for the shipment (the order number).
    pub order_ref: String,
    /// Shipper address block.
    pub consignor: Address,
    /// Recipient address block.
    pub consignee: Address,
    /// Package dimensions and weight.
    pub package: PackageSpec,
    /// Declared value of the contents.
    pub declared_value: Money,
    /// Amount the carrier collects on delivery. Zero when prepaid.
    pub cod_amount: Money,
    /// Prepaid-vs-COD handling.
    pub payment_mode: PaymentMode,
    /// Content lines for description fields and labels.
    pub items: Vec<ContentLine>,
}

impl ShipmentRequest {
    /// Validate all field-level rules.
    ///
    /// Must be called (and pass) before any network traffic; validation
    /// failures are deterministic and are never retried.
    ///
    /// # Errors
    ///
    /// Returns [`ShippingError::Validation`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), ShippingError> {
        validate_pincode(&self.consignee.pincode, "consignee pincode")?;
        validate_pincode(&self.consignor.pincode, "consignor pincode")?;
        validate_name(&self.consignee.name, "consignee name")?;
        validate_name(&self.consignor.name, "consignor name")?;
        validate_phone(&self.consignee.phone, "consignee phone")?;

        if !self.declared_value.is_positive() {
            return Err(ShippingError::Validation(
                "declared value must be greater than zero".to_string(),
            ));
        }
        if self.payment_mode == PaymentMode::Cod && self.cod_amount > self.declared_value {
            return Err(ShippingError::Validation(format!(
                "COD amount {} exceeds declared value {}",
                self.cod_amount, self.declared_value
            )));
        }
        Ok(())
    }
}

fn validate_pincode(pincode: &str, field: &str) -> Result<(), ShippingError> {
    if pincode.len() != PINCODE_DIGITS || !pincode.chars().all(|c| c.is_ascii_digit()) {
        return Err(ShippingError::Validation(format!(
            "{field} must be exactly {PINCODE_DIGITS} digits (got {pincode:?})"
        )));
    }
    Ok(())
}

fn validate_name(name: &str, field: &str) -> Result<(), ShippingError> {
    if name.trim().is_empty() {
        return Err(ShippingError::Validation(format!("{field} is required")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ShippingError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if name.contains('<') || name.contains('>') {
        return Err(ShippingError::Validation(format!(
            "{field} must not contain angle brackets"
        )));
    }
    Ok(())
}

fn validate_phone(phone: &str, field: &str) -> Result<(), ShippingError> {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if digits < MIN_PHONE_DIGITS || digits > MAX_PHONE_DIGITS || phone.len() != digits {
        return Err(ShippingError::Validation(format!(
            "{field} must be {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits"
        )));
    }
    Ok(())
}

/// Resolve package dimensions with the documented precedence:
/// explicit override > order's own shipping fields > profile defaults.
///
/// The hardcoded fallback (0.5 kg / 20x15x3 cm) lives in
/// [`PackageDefaults::default`], which profile creation starts from.
#[must_use]
pub fn resolve_package(
    overrides: &DimensionOverride,
    order: &Order,
    defaults: &PackageDefaults,
) -> PackageSpec {
    PackageSpec {
        weight_kg: overrides
            .weight_kg
            .or(order.shipping.weight_kg)
            .unwrap_or(defaults.weight_kg),
        length_cm: overrides
            .length_cm
            .or(order.shipping.length_cm)
            .unwrap_or(defaults.length_cm),
        breadth_cm: overrides
            .breadth_cm
            .or(order.shipping.breadth_cm)
            .unwrap_or(defaults.breadth_cm),
        height_cm: overrides
            .height_cm
            .or(order.shipping.height_cm)
            .unwrap_or(defaults.height_cm),
    }
}

/// Collect-on-delivery amount for an order.
///
/// `paid` orders collect nothing; `partially_paid` orders collect the
/// outstanding balance; `pending` orders collect the full amount.
#[must_use]
pub fn cod_amount(order: &Order) -> Money {
    match order.payment.status {
        PaymentStatus::Paid => Money::ZERO,
        PaymentStatus::PartiallyPaid => order.amount.saturating_sub(order.payment.paid_amount),
        PaymentStatus::Pending => order.amount,
    }
}

/// Payment mode derived from the collectable amount.
#[must_use]
pub fn payment_mode(order: &Order) -> PaymentMode {
    if cod_amount(order).is_positive() {
        PaymentMode::Cod
    } else {
        PaymentMode::Prepaid
    }
}

/// Build the normalized request for an order.
///
/// Declared value defaults to the order amount; COD amount and payment
/// mode derive from payment status.
#[must_use]
pub fn build_request(
    order: &Order,
    consignor: Address,
    overrides: &DimensionOverride,
    defaults: &PackageDefaults,
) -> ShipmentRequest {
    ShipmentRequest {
        order_ref: order.number.clone(),
        consignor,
        consignee: order.shipping.consignee.clone(),
        package: resolve_package(overrides, order, defaults),
        declared_value: order.amount,
        cod_amount: cod_amount(order),
        payment_mode: payment_mode(order),
        items: order
            .items
            .iter()
            .map(|item| ContentLine {
                sku: item.sku.clone(),
                title: item.title.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
    }
}

/// A pickup registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupRequest {
    /// Address the carrier collects from.
    pub pickup_address: Address,
    /// Date the carrier should collect.
    pub pickup_date: NaiveDate,
    /// AWB numbers included in this pickup.
    pub awb_numbers: Vec<String>,
    /// Carrier-internal shipment ids, for carriers that key pickups on them.
    #[serde(default)]
    pub shipment_ids: Vec<String>,
    /// Total chargeable weight of the included shipments.
    pub chargeable_weight_kg: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::order::{PaymentInfo, ShippingDetails};
    use dogeared_core::OrderId;

    fn consignee() -> Address {
        Address {
            name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            email: Some("asha@example.in".to_string()),
            address: "22 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    fn consignor() -> Address {
        Address {
            name: "Dogeared Books".to_string(),
            phone: "8012345678".to_string(),
            email: None,
            address: "4 Paper Mill Lane".to_string(),
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "411001".to_string(),
        }
    }

    fn order(status: PaymentStatus, paid: i64) -> Order {
        Order {
            id: OrderId::new("ord_1"),
            number: "DG-1042".to_string(),
            amount: Money::from(1000),
            items: vec![],
            payment: PaymentInfo {
                status,
                paid_amount: Money::from(paid),
            },
            shipping: ShippingDetails {
                consignee: consignee(),
                weight_kg: None,
                length_cm: None,
                breadth_cm: None,
                height_cm: None,
                provider: None,
                shiprocket: None,
                bluedart: None,
            },
        }
    }

    fn request() -> ShipmentRequest {
        build_request(
            &order(PaymentStatus::Pending, 0),
            consignor(),
            &DimensionOverride::default(),
            &PackageDefaults::default(),
        )
    }

    #[test]
    fn test_chargeable_weight_uses_volumetric_when_larger() {
        let package = PackageSpec {
            weight_kg: Decimal::new(3, 1), // 0.3 kg
            length_cm: Decimal::from(20),
            breadth_cm: Decimal::from(15),
            height_cm: Decimal::from(5),
        };
        // (20 x 15 x 5) / 5000 = 3.0
        assert_eq!(package.chargeable_weight_kg(), Decimal::from(3));
    }

    #[test]
    fn test_chargeable_weight_uses_actual_when_larger() {
        let package = PackageSpec {
            weight_kg: Decimal::from(5),
            length_cm: Decimal::from(20),
            breadth_cm: Decimal::from(15),
            height_cm: Decimal::from(5),
        };
        assert_eq!(package.chargeable_weight_kg(), Decimal::from(5));
    }

    #[test]
    fn test_cod_amount_by_payment_status() {
        assert_eq!(
            cod_amount(&order(PaymentStatus::PartiallyPaid, 400)),
            Money::from(600)
        );
        assert_eq!(cod_amount(&order(PaymentStatus::Paid, 1000)), Money::ZERO);
        assert_eq!(
            cod_amount(&order(PaymentStatus::Pending, 0)),
            Money::from(1000)
        );
    }

    #[test]
    fn test_payment_mode_follows_collectable_amount() {
        assert_eq!(payment_mode(&order(PaymentStatus::Paid, 1000)), PaymentMode::Prepaid);
        assert_eq!(payment_mode(&order(PaymentStatus::Pending, 0)), PaymentMode::Cod);
    }

    #[test]
    fn test_dimension_precedence() {
        let mut ord = order(PaymentStatus::Pending, 0);
        ord.shipping.weight_kg = Some(Decimal::from(2));

        let defaults = PackageDefaults::default();

        // Order value beats profile default.
        let package = resolve_package(&DimensionOverride::default(), &ord, &defaults);
        assert_eq!(package.weight_kg, Decimal::from(2));
        assert_eq!(package.length_cm, defaults.length_cm);

        // Explicit override beats the order value.
        let overrides = DimensionOverride {
            weight_kg: Some(Decimal::from(4)),
            ..DimensionOverride::default()
        };
        let package = resolve_package(&overrides, &ord, &defaults);
        assert_eq!(package.weight_kg, Decimal::from(4));
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_pincode_must_be_six_digits() {
        let mut req = request();
        req.consignee.pincode = "56001".to_string();
        assert!(req.validate().unwrap_err().is_validation());

        req.consignee.pincode = "56OO01".to_string();
        assert!(req.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_name_length_limit() {
        let mut req = request();
        req.consignee.name = "A".repeat(31);
        assert!(req.validate().unwrap_err().is_validation());

        req.consignee.name = "A".repeat(30);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_name_rejects_angle_brackets() {
        let mut req = request();
        req.consignee.name = "<script>alert(1)</script>".to_string();
        assert!(req.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_phone_digit_bounds() {
        let mut req = request();
        req.consignee.phone = "123456789".to_string(); // 9 digits
        assert!(req.validate().is_err());

        req.consignee.phone = "1234567890123456".to_string(); // 16 digits
        assert!(req.validate().is_err());

        req.consignee.phone = "911234567890".to_string(); // 12 digits
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_declared_value_must_be_positive() {
        let mut req = request();
        req.declared_value = Money::ZERO;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_cod_cannot_exceed_declared_value() {
        let mut req = request();
        req.cod_amount = Money::from(2000);
        assert!(req.validate().is_err());

        // Prepaid requests do not apply the COD bound.
        req.payment_mode = PaymentMode::Prepaid;
        req.cod_amount = Money::ZERO;
        assert!(req.validate().is_ok());
    }
}
