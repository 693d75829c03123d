//! Command line and environment settings of the swapper daemon.

use crate::core::domain::error::{SwapperResult, ValidationError};
use crate::core::infrastructure::hypervisor::ProxmoxHypervisor;
use crate::swapper::context::SwapperOptions;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Every flag can also be given through the environment (or a `.env` file).
#[derive(Debug, Clone, Parser)]
#[command(name = "leeca-swapper", version, about)]
pub struct Settings {
    /// Proxmox VE endpoint, e.g. `https://pve.local:8006`
    #[arg(long, env = "PROXMOX_URL")]
    pub proxmox_url: String,

    /// API token id in the form `user@realm!name`
    #[arg(long, env = "PROXMOX_TOKEN_ID", requires = "proxmox_token_secret")]
    pub proxmox_token_id: Option<String>,

    #[arg(long, env = "PROXMOX_TOKEN_SECRET", hide_env_values = true)]
    pub proxmox_token_secret: Option<String>,

    /// Ticket login user in the form `user@realm`
    #[arg(long, env = "PROXMOX_USERNAME", requires = "proxmox_password")]
    pub proxmox_username: Option<String>,

    #[arg(long, env = "PROXMOX_PASSWORD", hide_env_values = true)]
    pub proxmox_password: Option<String>,

    /// Accept self-signed certificates
    #[arg(long, env = "PROXMOX_INSECURE")]
    pub proxmox_insecure: bool,

    /// Requests per second sent to the hypervisor; unlimited when unset
    #[arg(long, env = "PROXMOX_RATE_LIMIT")]
    pub proxmox_rate_limit: Option<u32>,

    /// Cache store, `memory://` or a redb file as `redb:///path/to/cache.redb`
    #[arg(long, env = "KV_URI", default_value = "memory://")]
    pub kv_uri: String,

    /// Bearer token for non-local API callers; without it only localhost is served
    #[arg(long, env = "SWAPPER_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Allow the forced-halt operation
    #[arg(long, env = "POWER_HALT")]
    pub power_halt: bool,

    #[arg(long, env = "SWAPPER_LISTEN", default_value = "0.0.0.0:8555")]
    pub listen: SocketAddr,

    /// Tag a VM must carry to take part in swapping
    #[arg(long, env = "SWAPPER_TAG", default_value = "swapper")]
    pub tag: String,

    #[arg(long, env = "SWAPPER_CACHE_INTERVAL_MS", default_value_t = 10_000)]
    pub cache_interval_ms: u64,

    #[arg(long, env = "SWAPPER_EVENT_INTERVAL_MS", default_value_t = 2_500)]
    pub event_interval_ms: u64,

    #[arg(long, env = "SWAPPER_DEVICE_SYNC_DELAY_MS", default_value_t = 2_000)]
    pub device_sync_delay_ms: u64,

    #[arg(long, env = "SWAPPER_SHUTDOWN_POLL_MS", default_value_t = 2_500)]
    pub shutdown_poll_ms: u64,

    #[arg(long, env = "SWAPPER_SHUTDOWN_TIMEOUT_SECS", default_value_t = 100)]
    pub shutdown_timeout_secs: u64,
}

impl Settings {
    /// Runtime tunables derived from the settings.
    ///
    /// # Errors
    /// `Validation` when an interval is zero or the tag is blank.
    pub fn options(&self) -> SwapperResult<SwapperOptions> {
        let tag = self.tag.trim();
        if tag.is_empty() {
            return Err(ValidationError::Field {
                field: "tag".to_string(),
                message: "participation tag must not be empty".to_string(),
            }
            .into());
        }
        for (field, value) in [
            ("cache_interval_ms", self.cache_interval_ms),
            ("event_interval_ms", self.event_interval_ms),
            ("shutdown_poll_ms", self.shutdown_poll_ms),
        ] {
            if value == 0 {
                return Err(ValidationError::Field {
                    field: field.to_string(),
                    message: "must be greater than zero".to_string(),
                }
                .into());
            }
        }

        Ok(SwapperOptions {
            tag: tag.to_string(),
            power_halt: self.power_halt,
            api_token: self.api_token.clone().filter(|token| !token.is_empty()),
            cache_interval: Duration::from_millis(self.cache_interval_ms),
            event_interval: Duration::from_millis(self.event_interval_ms),
            device_sync_delay: Duration::from_millis(self.device_sync_delay_ms),
            shutdown_poll: Duration::from_millis(self.shutdown_poll_ms),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        })
    }

    /// Builds the Proxmox client.
    ///
    /// # Errors
    /// `Validation` unless exactly one of token or password credentials is complete.
    pub fn hypervisor(&self) -> SwapperResult<ProxmoxHypervisor> {
        let mut builder = ProxmoxHypervisor::builder()
            .url(&self.proxmox_url)
            .accept_invalid_certs(self.proxmox_insecure)
            .rate_limit(self.proxmox_rate_limit);
        if let (Some(id), Some(secret)) = (&self.proxmox_token_id, &self.proxmox_token_secret) {
            builder = builder.api_token(id, secret);
        }
        if let (Some(user), Some(password)) = (&self.proxmox_username, &self.proxmox_password) {
            builder = builder.credentials(user, password);
        }
        builder.build()
    }
}
