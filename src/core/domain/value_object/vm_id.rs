use crate::core::domain::error::{SwapperError, SwapperResult};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A cluster-unique QEMU VM identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmId(u32);

impl VmId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Parses a user-supplied id (path segment, job payload).
    ///
    /// # Errors
    /// `SwapperError::InvalidArgument` when the input is not an unsigned integer.
    pub fn parse(raw: &str) -> SwapperResult<Self> {
        raw.trim().parse::<u32>().map(Self).map_err(|_| {
            SwapperError::InvalidArgument(format!("expected a numeric VM id, got '{}'", raw))
        })
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for VmId {
    type Err = SwapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u32> for VmId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_ids() {
        assert_eq!(VmId::parse("100").unwrap().get(), 100);
        assert_eq!(VmId::parse(" 203 ").unwrap(), VmId::new(203));
    }

    #[test]
    fn test_reject_non_numeric_ids() {
        for raw in ["", "abc", "-1", "10.5", "100a"] {
            assert!(
                matches!(VmId::parse(raw), Err(SwapperError::InvalidArgument(_))),
                "{} should be rejected",
                raw
            );
        }
    }
}
