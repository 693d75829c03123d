//! Typed payloads of the three job queues.

use serde::{Deserialize, Serialize};

pub const REQUESTS_QUEUE: &str = "requests";
pub const ACTIVE_QUEUE: &str = "active";
pub const CACHE_QUEUE: &str = "cache";

/// A swap request; `target` is the raw id as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestJob {
    pub target: String,
}

/// Operations against whichever VM is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActiveJob {
    DeviceSync,
    Stop,
    HangingStop,
}

impl ActiveJob {
    /// Human readable job title used in log lines.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            ActiveJob::DeviceSync => "Sync Devices",
            ActiveJob::Stop => "Stop Machine",
            ActiveJob::HangingStop => "Force-Stop Machine",
        }
    }
}

/// Recurring maintenance work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheJob {
    UpdateCache,
    EventListener,
}
