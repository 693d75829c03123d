//! The cached, periodically rebuilt view of every participating VM.
//!
//! The refresh writes the master list first, evicts overviews of VMs that left
//! it, then writes the active set and one overview per VM. Each key is
//! replaced whole. A VM whose configuration cannot be fetched keeps its previous
//! overview until the next cycle.

use crate::core::domain::{
    error::SwapperResult,
    model::{
        cache_entry::{
            ACTIVE_KEY, ActiveSet, MASTER_LIST_KEY, MasterList, MasterListEntry, overview_key,
        },
        device::SwapperConfig,
        device_mapping::ConnectivitySnapshot,
        vm::{VirtualMachine, VmConfigMap, VmOverview},
    },
    value_object::VmId,
};
use crate::swapper::application::{
    response::outcome::{RefreshFailure, RefreshReport},
    service::{config_extractor::extract_config, mapping_service::MappingService},
};
use crate::swapper::context::SwapperContext;
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RegistryService {
    ctx: SwapperContext,
}

impl RegistryService {
    pub fn new(ctx: SwapperContext) -> Self {
        Self { ctx }
    }

    /// Participation-tagged QEMU guests straight from the hypervisor, in listing order.
    pub async fn live_listing(&self) -> SwapperResult<Vec<VirtualMachine>> {
        let tag = self.ctx.options.tag.as_str();
        let resources = self.ctx.hypervisor.vm_resources().await?;
        Ok(resources
            .iter()
            .filter_map(|resource| resource.as_qemu())
            .filter(|vm| vm.has_tag(tag))
            .map(VirtualMachine::from_resource)
            .collect())
    }

    /// Rebuilds the master list, the active set and every per-VM overview.
    ///
    /// Overviews of VMs that left the master list are deleted. A failed mapping
    /// snapshot is recorded in the report and every device counts as not
    /// connected for this cycle.
    ///
    /// # Errors
    /// Fails before writing anything when the listing cannot be fetched.
    /// Per-VM failures are recorded in the report instead.
    pub async fn update_cache(&self) -> SwapperResult<RefreshReport> {
        let machines = self.live_listing().await?;
        let (connectivity, mappings_error) =
            match MappingService::new(self.ctx.clone()).snapshot().await {
                Ok(snapshot) => (snapshot, None),
                Err(e) => {
                    warn!(error = %e, "mapping snapshot unavailable, devices treated as disconnected");
                    (ConnectivitySnapshot::default(), Some(e.to_string()))
                }
            };
        let previous = self.master_list().await?;

        let master_list: MasterList = machines
            .iter()
            .map(|vm| MasterListEntry {
                id: vm.id,
                node: vm.node_id.clone(),
            })
            .collect();
        self.ctx.kv.set(MASTER_LIST_KEY, &master_list).await?;

        for stale in previous
            .iter()
            .filter(|old| !master_list.iter().any(|entry| entry.id == old.id))
        {
            debug!(vmid = %stale.id, "evicting VM that left the master list");
            self.ctx.kv.delete(&overview_key(stale.id)).await?;
        }

        let active: ActiveSet = machines
            .iter()
            .filter(|vm| vm.status.is_active())
            .map(|vm| vm.id)
            .collect();
        if active.len() > 1 {
            warn!(active = ?active, "more than one participating VM is running");
        }
        self.ctx.kv.set(ACTIVE_KEY, &active).await?;

        let mut failed = Vec::new();
        for vm in &machines {
            let config = match self.ctx.hypervisor.vm_config(&vm.node_id, vm.id).await {
                Ok(config) => config,
                Err(e) => {
                    warn!(vmid = %vm.id, node = %vm.node_id, error = %e, "skipping VM in refresh");
                    failed.push(RefreshFailure {
                        id: vm.id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let overview = build_overview(vm, config, &connectivity);
            self.ctx.kv.set(&overview_key(vm.id), &overview).await?;
        }

        info!(
            vms = machines.len(),
            active = active.len(),
            failed = failed.len(),
            "cache refreshed"
        );
        Ok(RefreshReport {
            vms: machines.len(),
            active,
            failed,
            mappings_error,
        })
    }

    pub async fn master_list(&self) -> SwapperResult<MasterList> {
        Ok(self
            .ctx
            .kv
            .get::<MasterList>(MASTER_LIST_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn active_ids(&self) -> SwapperResult<ActiveSet> {
        Ok(self
            .ctx
            .kv
            .get::<ActiveSet>(ACTIVE_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn overview(&self, id: VmId) -> SwapperResult<Option<VmOverview>> {
        self.ctx.kv.get(&overview_key(id)).await
    }

    /// Every VM of the master list.
    ///
    /// With `use_cache` the VMs are hydrated from cached overviews (entries
    /// without one are skipped). Without it each VM is fetched live, and any
    /// hypervisor failure is returned.
    pub async fn all(&self, use_cache: bool) -> SwapperResult<Vec<VirtualMachine>> {
        let master_list = self.master_list().await?;
        let mut machines = Vec::with_capacity(master_list.len());

        for entry in master_list {
            if use_cache {
                match self.overview(entry.id).await? {
                    Some(overview) => machines.push(VirtualMachine::from_overview(&overview)),
                    None => debug!(vmid = %entry.id, "no cached overview yet"),
                }
            } else {
                let config = self
                    .ctx
                    .hypervisor
                    .vm_config(&entry.node, entry.id)
                    .await?;
                let status = self.ctx.hypervisor.vm_status(&entry.node, entry.id).await?;
                let overview = VmOverview {
                    id: entry.id,
                    node: entry.node.clone(),
                    status: status.status,
                    swapper: SwapperConfig::default(),
                    config,
                };
                machines.push(VirtualMachine::from_overview(&overview));
            }
        }
        Ok(machines)
    }

    /// The VM at the head of the active set, hydrated from its cached overview.
    pub async fn active(&self) -> SwapperResult<Option<VirtualMachine>> {
        let Some(id) = self.active_ids().await?.first().copied() else {
            return Ok(None);
        };
        match self.overview(id).await? {
            Some(overview) => Ok(Some(VirtualMachine::from_overview(&overview))),
            None => {
                warn!(vmid = %id, "active VM has no cached overview");
                Ok(None)
            }
        }
    }
}

/// Overview of a VM; an unreadable configuration block degrades to no devices.
pub fn build_overview(
    vm: &VirtualMachine,
    config: VmConfigMap,
    connectivity: &ConnectivitySnapshot,
) -> VmOverview {
    let description = config
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let swapper = match extract_config(description, connectivity) {
        Ok(swapper) => swapper,
        Err(e) => {
            debug!(vmid = %vm.id, error = %e, "no usable swapper config");
            SwapperConfig::empty(vm.name.clone())
        }
    };
    VmOverview {
        id: vm.id,
        node: vm.node_id.clone(),
        status: vm.status,
        swapper,
        config,
    }
}
