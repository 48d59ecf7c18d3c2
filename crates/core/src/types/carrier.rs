//! Shipping carrier tag.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The shipment providers this system can book with.
///
/// Serialized as the lowercase provider tag stored on orders
/// (`"shiprocket"` / `"bluedart"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Shiprocket,
    #[serde(rename = "bluedart")]
    BlueDart,
}

/// Error returned when parsing an unknown carrier tag.
#[derive(Debug, Error)]
#[error("unknown carrier: {0}")]
pub struct CarrierParseError(pub String);

impl Carrier {
    /// The provider tag stored on orders and used in configuration.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shiprocket => "shiprocket",
            Self::BlueDart => "bluedart",
        }
    }
}

impl std::fmt::Display for Carrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Carrier {
    type Err = CarrierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shiprocket" => Ok(Self::Shiprocket),
            "bluedart" => Ok(Self::BlueDart),
            other => Err(CarrierParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_tags() {
        assert_eq!(Carrier::Shiprocket.to_string(), "shiprocket");
        assert_eq!(Carrier::BlueDart.to_string(), "bluedart");
        assert_eq!("bluedart".parse::<Carrier>().ok(), Some(Carrier::BlueDart));
        assert!("fedex".parse::<Carrier>().is_err());
    }

    #[test]
    fn test_carrier_serde_tags() {
        #[allow(clippy::unwrap_used)]
        let json = serde_json::to_string(&Carrier::BlueDart).unwrap();
        assert_eq!(json, "\"bluedart\"");
    }
}
