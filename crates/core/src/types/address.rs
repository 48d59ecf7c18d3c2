//! Postal address used for consignor and consignee blocks.

use serde::{Deserialize, Serialize};

/// A postal address as stored on orders and carrier profiles.
///
/// Indian addressing: `pincode` is the 6-digit postal index number that
/// carriers key serviceability on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    /// Contact name at this address.
    pub name: String,
    /// Contact phone number (10-15 digits).
    pub phone: String,
    /// Contact email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Street address lines.
    pub address: String,
    /// City.
    pub city: String,
    /// State.
    pub state: String,
    /// 6-digit postal index number.
    pub pincode: String,
}

impl Address {
    /// One-line summary used in logs and label footers.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{}, {}, {} {}", self.address, self.city, self.state, self.pincode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_summary() {
        let addr = Address {
            name: "Meera Pillai".to_string(),
            phone: "9876543210".to_string(),
            email: None,
            address: "14 Lake View Road".to_string(),
            city: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
            pincode: "600033".to_string(),
        };
        assert_eq!(
            addr.summary(),
            "14 Lake View Road, Chennai, Tamil Nadu 600033"
        );
    }
}
