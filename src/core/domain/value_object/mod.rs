mod device_slot;
mod proxmox_api_token;
mod proxmox_csrf_token;
mod proxmox_password;
mod proxmox_ticket;
mod proxmox_url;
mod proxmox_user_id;
mod usb_id;
mod vm_id;

pub use device_slot::{DeviceKind, DeviceSlot};
pub use proxmox_api_token::ProxmoxApiToken;
pub use proxmox_csrf_token::ProxmoxCSRFToken;
pub use proxmox_password::ProxmoxPassword;
pub use proxmox_ticket::ProxmoxTicket;
pub use proxmox_url::ProxmoxUrl;
pub use proxmox_user_id::ProxmoxUserId;
pub use usb_id::UsbId;
pub use vm_id::VmId;
