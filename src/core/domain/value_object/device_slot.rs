use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two passthrough device families the swapper manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Usb,
    Pci,
}

impl DeviceKind {
    /// Prefix of the hypervisor configuration keys holding this kind of device.
    #[must_use]
    pub const fn slot_prefix(self) -> &'static str {
        match self {
            DeviceKind::Usb => "usb",
            DeviceKind::Pci => "hostpci",
        }
    }

    /// Path segment used by the cluster mapping and node hardware endpoints.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Usb => "usb",
            DeviceKind::Pci => "pci",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hypervisor hardware slot such as `usb0` or `hostpci1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceSlot {
    kind: SlotKind,
    index: u16,
}

// Separate ordering-friendly mirror of `DeviceKind` so slots sort usb before hostpci.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum SlotKind {
    Usb,
    Pci,
}

impl DeviceSlot {
    #[must_use]
    pub const fn new(kind: DeviceKind, index: u16) -> Self {
        let kind = match kind {
            DeviceKind::Usb => SlotKind::Usb,
            DeviceKind::Pci => SlotKind::Pci,
        };
        Self { kind, index }
    }

    /// Parses a configuration key, returning `None` for keys that are not slots.
    #[must_use]
    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::parse(key).ok()
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let (kind, digits) = if let Some(rest) = value.strip_prefix("hostpci") {
            (DeviceKind::Pci, rest)
        } else if let Some(rest) = value.strip_prefix("usb") {
            (DeviceKind::Usb, rest)
        } else {
            return Err(ValidationError::Format(format!(
                "'{}' is not a usb<N> or hostpci<N> slot",
                value
            )));
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::Format(format!(
                "'{}' is not a usb<N> or hostpci<N> slot",
                value
            )));
        }
        let index = digits.parse::<u16>().map_err(|_| {
            ValidationError::ConstraintViolation(format!("slot index of '{}' is out of range", value))
        })?;
        Ok(Self::new(kind, index))
    }

    #[must_use]
    pub const fn kind(&self) -> DeviceKind {
        match self.kind {
            SlotKind::Usb => DeviceKind::Usb,
            SlotKind::Pci => DeviceKind::Pci,
        }
    }

    #[must_use]
    pub const fn index(&self) -> u16 {
        self.index
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind().slot_prefix(), self.index)
    }
}

impl TryFrom<String> for DeviceSlot {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceSlot> for String {
    fn from(slot: DeviceSlot) -> Self {
        slot.to_string()
    }
}
