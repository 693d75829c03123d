use crate::core::domain::error::ValidationError;
use std::fmt;

/// A USB `vendor:product` identifier, e.g. `046d:c52b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsbId {
    vendor: String,
    product: String,
}

impl UsbId {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let Some((vendor, product)) = value.trim().split_once(':') else {
            return Err(ValidationError::Format(format!(
                "'{}' is not a vendor:product identifier",
                value
            )));
        };
        for part in [vendor, product] {
            if part.len() != 4 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ValidationError::Format(format!(
                    "'{}' is not a vendor:product identifier",
                    value
                )));
            }
        }
        Ok(Self {
            vendor: vendor.to_ascii_lowercase(),
            product: product.to_ascii_lowercase(),
        })
    }

    /// True when a node reports a device with the same vendor and product ids.
    #[must_use]
    pub fn matches(&self, vendid: &str, prodid: &str) -> bool {
        self.vendor.eq_ignore_ascii_case(strip_hex_prefix(vendid))
            && self.product.eq_ignore_ascii_case(strip_hex_prefix(prodid))
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vendor, self.product)
    }
}
