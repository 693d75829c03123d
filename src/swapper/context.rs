use crate::core::infrastructure::{hypervisor::Hypervisor, kv_store::KvStore};
use std::sync::Arc;
use std::time::Duration;

/// Runtime tunables shared by every service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapperOptions {
    /// Tag a VM must carry to take part in swapping.
    pub tag: String,
    /// Opt-in for the forced-halt operation.
    pub power_halt: bool,
    /// Bearer token for non-local callers; `None` restricts the API to loopback.
    pub api_token: Option<String>,
    pub cache_interval: Duration,
    pub event_interval: Duration,
    pub device_sync_delay: Duration,
    pub shutdown_poll: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for SwapperOptions {
    fn default() -> Self {
        Self {
            tag: "swapper".to_string(),
            power_halt: false,
            api_token: None,
            cache_interval: Duration::from_millis(10_000),
            event_interval: Duration::from_millis(2_500),
            device_sync_delay: Duration::from_millis(2_000),
            shutdown_poll: Duration::from_millis(2_500),
            shutdown_timeout: Duration::from_secs(100),
        }
    }
}

/// Collaborators constructed once at start-up and handed to every component.
#[derive(Clone)]
pub struct SwapperContext {
    pub hypervisor: Arc<dyn Hypervisor>,
    pub kv: Arc<dyn KvStore>,
    pub options: Arc<SwapperOptions>,
}

impl SwapperContext {
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        kv: Arc<dyn KvStore>,
        options: SwapperOptions,
    ) -> Self {
        Self {
            hypervisor,
            kv,
            options: Arc::new(options),
        }
    }
}

impl std::fmt::Debug for SwapperContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapperContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
