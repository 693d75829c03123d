//! Arbitrates exclusive ownership of passthrough USB/PCI devices among Proxmox VE
//! virtual machines.
//!
//! Participating VMs carry a tag and embed a device list in their description.
//! A swap stops the running VM, strips its configured devices, attaches the
//! target's devices and starts the target. Background jobs keep a cached
//! registry of the VMs fresh and hot-resync devices when hardware is plugged
//! in or pulled out.
//!
//! # Examples
//!
//! ```no_run
//! use leeca_swapper::{
//!     ProxmoxHypervisor, SwapperContext, SwapperOptions, SwapperResult, SwapperRuntime,
//!     open_store,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> SwapperResult<()> {
//!     let hypervisor = ProxmoxHypervisor::builder()
//!         .url("https://pve.example.com:8006")
//!         .api_token("root@pam!swapper", "secret")
//!         .build()?;
//!     let ctx = SwapperContext::new(
//!         Arc::new(hypervisor),
//!         open_store("memory://").await?,
//!         SwapperOptions::default(),
//!     );
//!
//!     let runtime = SwapperRuntime::start(ctx);
//!     runtime.queues().requests.add(leeca_swapper::RequestJob {
//!         target: "101".to_string(),
//!     })?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod swapper;

pub use crate::core::domain::error::{ConfigError, SwapperError, SwapperResult, ValidationError};
pub use crate::core::domain::model::job::{ActiveJob, CacheJob, RequestJob};
pub use crate::core::infrastructure::{
    hypervisor::{Hypervisor, ProxmoxHypervisor, ProxmoxHypervisorBuilder},
    kv_store::{KvStore, MemoryKvStore, RedbKvStore, open_store},
    queue::{EventBus, JobEvent},
};
pub use crate::swapper::application::worker::runtime::{JobQueues, SwapperRuntime};
pub use crate::swapper::context::{SwapperContext, SwapperOptions};

#[cfg(test)]
mod tests;
