//! Strongly-typed keys used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// External product identifier, the lookup key of a resolution.
///
/// Always non-blank once constructed through [`BarcodeValue::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarcodeValue(String);

/// Stock-keeping unit, the local product key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

macro_rules! impl_string_key {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Validate and wrap a raw value. Blank input is rejected.
            pub fn parse(raw: impl Into<String>) -> Result<Self, DomainError> {
                let raw = raw.into();
                if raw.trim().is_empty() {
                    return Err(DomainError::validation(format!("{} must not be empty", $name)));
                }
                Ok(Self(raw))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_string_key!(BarcodeValue, "barcode");
impl_string_key!(Sku, "sku");

impl Sku {
    /// Build a key from a fixed, non-empty prefix and a derived tail.
    pub fn prefixed(prefix: &'static str, tail: &str) -> Self {
        debug_assert!(!prefix.is_empty(), "sku prefix must not be empty");
        Self(format!("{prefix}{tail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barcode_rejects_empty_and_blank() {
        assert!(matches!(BarcodeValue::parse(""), Err(DomainError::Validation(_))));
        assert!(matches!(BarcodeValue::parse("   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn barcode_keeps_raw_value() {
        let b: BarcodeValue = "4006381333931".parse().unwrap();
        assert_eq!(b.as_str(), "4006381333931");
        assert_eq!(b.to_string(), "4006381333931");
    }

    #[test]
    fn sku_serializes_transparently() {
        let sku = Sku::parse("SKU_333931").unwrap();
        let json = serde_json::to_string(&sku).unwrap();
        assert_eq!(json, "\"SKU_333931\"");
    }
}
