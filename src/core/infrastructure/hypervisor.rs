//! The remote procedure interface of the hypervisor and its Proxmox VE implementation.

use crate::core::{
    domain::{
        error::{SwapperError, SwapperResult, ValidationError},
        model::{
            cluster_resource::ClusterResource,
            device_mapping::{PciHardware, RawMapping, UsbHardware},
            proxmox_connection::{ProxmoxConnection, ProxmoxCredentials},
            vm::{VmConfigMap, VmStatusCurrent},
        },
        value_object::{DeviceKind, ProxmoxApiToken, ProxmoxPassword, ProxmoxUrl, ProxmoxUserId, VmId},
    },
    infrastructure::api_client::{ApiClient, ClientConfig, RateLimitConfig},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use tracing::info;

/// Every hypervisor call the swapper makes.
///
/// Implementations must be shareable across workers; the runtime holds one
/// behind an `Arc<dyn Hypervisor>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// Guests of the whole cluster (`qemu` and `lxc`).
    async fn vm_resources(&self) -> SwapperResult<Vec<ClusterResource>>;

    /// Full configuration of one VM, including its description.
    async fn vm_config(&self, node: &str, vmid: VmId) -> SwapperResult<VmConfigMap>;

    async fn vm_status(&self, node: &str, vmid: VmId) -> SwapperResult<VmStatusCurrent>;

    /// Requests an ACPI shutdown; `force_stop` makes the hypervisor kill the VM after `timeout` seconds.
    async fn shutdown_vm(
        &self,
        node: &str,
        vmid: VmId,
        force_stop: bool,
        timeout: u64,
    ) -> SwapperResult<()>;

    /// Immediate halt, no guest cooperation.
    async fn stop_vm(&self, node: &str, vmid: VmId) -> SwapperResult<()>;

    async fn start_vm(&self, node: &str, vmid: VmId) -> SwapperResult<()>;

    /// Writes `slot -> attachment string` pairs into the VM configuration.
    async fn set_vm_devices(
        &self,
        node: &str,
        vmid: VmId,
        devices: &BTreeMap<String, String>,
    ) -> SwapperResult<()>;

    /// Deletes the given slot keys from the VM configuration.
    async fn delete_vm_devices(&self, node: &str, vmid: VmId, slots: &[String]) -> SwapperResult<()>;

    /// Cluster-level hardware mappings of one kind.
    async fn mappings(&self, kind: DeviceKind) -> SwapperResult<Vec<RawMapping>>;

    async fn usb_hardware(&self, node: &str) -> SwapperResult<Vec<UsbHardware>>;

    async fn pci_hardware(&self, node: &str) -> SwapperResult<Vec<PciHardware>>;
}

/// [`Hypervisor`] backed by the Proxmox VE REST API.
#[derive(Debug)]
pub struct ProxmoxHypervisor {
    api_client: ApiClient,
}

impl ProxmoxHypervisor {
    pub fn builder() -> ProxmoxHypervisorBuilder {
        ProxmoxHypervisorBuilder::default()
    }

    pub fn new(api_client: ApiClient) -> Self {
        Self { api_client }
    }

    fn qemu_path(node: &str, vmid: VmId, rest: &str) -> String {
        format!("nodes/{}/qemu/{}/{}", node, vmid, rest)
    }
}

#[async_trait]
impl Hypervisor for ProxmoxHypervisor {
    async fn vm_resources(&self) -> SwapperResult<Vec<ClusterResource>> {
        self.api_client.get("cluster/resources?type=vm").await
    }

    async fn vm_config(&self, node: &str, vmid: VmId) -> SwapperResult<VmConfigMap> {
        self.api_client
            .get(&Self::qemu_path(node, vmid, "config"))
            .await
    }

    async fn vm_status(&self, node: &str, vmid: VmId) -> SwapperResult<VmStatusCurrent> {
        self.api_client
            .get(&Self::qemu_path(node, vmid, "status/current"))
            .await
    }

    async fn shutdown_vm(
        &self,
        node: &str,
        vmid: VmId,
        force_stop: bool,
        timeout: u64,
    ) -> SwapperResult<()> {
        let body = json!({ "forceStop": u8::from(force_stop), "timeout": timeout });
        let _: Value = self
            .api_client
            .post(&Self::qemu_path(node, vmid, "status/shutdown"), &body)
            .await?;
        Ok(())
    }

    async fn stop_vm(&self, node: &str, vmid: VmId) -> SwapperResult<()> {
        let _: Value = self
            .api_client
            .post(&Self::qemu_path(node, vmid, "status/stop"), &json!({}))
            .await?;
        Ok(())
    }

    async fn start_vm(&self, node: &str, vmid: VmId) -> SwapperResult<()> {
        let body = json!({ "timeout": 0 });
        let _: Value = self
            .api_client
            .post(&Self::qemu_path(node, vmid, "status/start"), &body)
            .await?;
        Ok(())
    }

    async fn set_vm_devices(
        &self,
        node: &str,
        vmid: VmId,
        devices: &BTreeMap<String, String>,
    ) -> SwapperResult<()> {
        if devices.is_empty() {
            return Ok(());
        }
        let _: Value = self
            .api_client
            .post(&Self::qemu_path(node, vmid, "config"), devices)
            .await?;
        Ok(())
    }

    async fn delete_vm_devices(&self, node: &str, vmid: VmId, slots: &[String]) -> SwapperResult<()> {
        if slots.is_empty() {
            return Ok(());
        }
        let body = json!({ "delete": slots.join(",") });
        let _: Value = self
            .api_client
            .post(&Self::qemu_path(node, vmid, "config"), &body)
            .await?;
        Ok(())
    }

    async fn mappings(&self, kind: DeviceKind) -> SwapperResult<Vec<RawMapping>> {
        self.api_client
            .get(&format!("cluster/mapping/{}", kind.as_str()))
            .await
    }

    async fn usb_hardware(&self, node: &str) -> SwapperResult<Vec<UsbHardware>> {
        self.api_client
            .get(&format!("nodes/{}/hardware/usb", node))
            .await
    }

    async fn pci_hardware(&self, node: &str) -> SwapperResult<Vec<PciHardware>> {
        self.api_client
            .get(&format!("nodes/{}/hardware/pci", node))
            .await
    }
}

/// Builder for [`ProxmoxHypervisor`].
///
/// ```no_run
/// use leeca_swapper::{ProxmoxHypervisor, SwapperResult};
///
/// fn connect() -> SwapperResult<ProxmoxHypervisor> {
///     ProxmoxHypervisor::builder()
///         .url("https://pve.example.com:8006")
///         .api_token("root@pam!swapper", "secret")
///         .accept_invalid_certs(true)
///         .build()
/// }
/// ```
#[derive(Debug, Default)]
pub struct ProxmoxHypervisorBuilder {
    url: Option<String>,
    token: Option<(String, String)>,
    password: Option<(String, String)>,
    accept_invalid_certs: bool,
    rate_limit: Option<u32>,
}

impl ProxmoxHypervisorBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn api_token(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.token = Some((id.into(), secret.into()));
        self
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.password = Some((user.into(), password.into()));
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Requests per second; the burst allowance is twice that.
    pub fn rate_limit(mut self, requests_per_second: Option<u32>) -> Self {
        self.rate_limit = requests_per_second;
        self
    }

    /// Validates the accumulated settings and builds the hypervisor client.
    ///
    /// # Errors
    /// `Validation` when the URL is missing or malformed, or when not exactly
    /// one kind of credentials was given.
    pub fn build(self) -> SwapperResult<ProxmoxHypervisor> {
        let url = self.url.ok_or_else(|| ValidationError::Field {
            field: "url".to_string(),
            message: "Proxmox URL is required".to_string(),
        })?;
        let url = ProxmoxUrl::new(&url)?;

        let credentials = match (self.token, self.password) {
            (Some((id, secret)), None) => {
                ProxmoxCredentials::ApiToken(ProxmoxApiToken::new(id, secret)?)
            }
            (None, Some((user, password))) => ProxmoxCredentials::Password {
                user: ProxmoxUserId::new(user)?,
                password: ProxmoxPassword::new(password)?,
            },
            (Some(_), Some(_)) => {
                return Err(ValidationError::ConstraintViolation(
                    "API token and password credentials are mutually exclusive".to_string(),
                )
                .into());
            }
            (None, None) => {
                return Err(ValidationError::Field {
                    field: "credentials".to_string(),
                    message: "either an API token or a username and password is required"
                        .to_string(),
                }
                .into());
            }
        };

        let rate_limit = match self.rate_limit {
            Some(rps) => {
                let requests_per_second = NonZeroU32::new(rps).ok_or_else(|| {
                    SwapperError::from(ValidationError::Field {
                        field: "rate_limit".to_string(),
                        message: "must be greater than zero".to_string(),
                    })
                })?;
                Some(RateLimitConfig {
                    requests_per_second,
                    burst_size: NonZeroU32::new(rps.saturating_mul(2)).unwrap_or(requests_per_second),
                })
            }
            None => None,
        };

        info!(url = url.as_str(), "connecting to Proxmox VE");
        let connection = ProxmoxConnection::new(url, credentials, self.accept_invalid_certs);
        let config = ClientConfig {
            rate_limit,
            ..ClientConfig::default()
        };
        Ok(ProxmoxHypervisor::new(ApiClient::new(connection, config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_credentials() {
        let result = ProxmoxHypervisor::builder()
            .url("https://pve.example.com:8006")
            .build();
        assert!(matches!(result, Err(SwapperError::Validation { .. })));
    }

    #[test]
    fn test_builder_rejects_both_credential_kinds() {
        let result = ProxmoxHypervisor::builder()
            .url("https://pve.example.com:8006")
            .api_token("root@pam!swapper", "secret")
            .credentials("root@pam", "password")
            .build();
        assert!(matches!(result, Err(SwapperError::Validation { .. })));
    }

    #[test]
    fn test_builder_rejects_zero_rate_limit() {
        let result = ProxmoxHypervisor::builder()
            .url("https://pve.example.com:8006")
            .api_token("root@pam!swapper", "secret")
            .rate_limit(Some(0))
            .build();
        assert!(matches!(result, Err(SwapperError::Validation { .. })));
    }

    #[test]
    fn test_builder_with_token() {
        let hypervisor = ProxmoxHypervisor::builder()
            .url("https://pve.example.com:8006")
            .api_token("root@pam!swapper", "secret")
            .rate_limit(Some(5))
            .build()
            .unwrap();
        assert_eq!(
            hypervisor.api_client.connection().url().as_str(),
            "https://pve.example.com:8006/"
        );
    }
}
