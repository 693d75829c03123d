pub mod cache_entry;
pub mod cluster_resource;
pub mod device;
pub mod device_mapping;
pub mod job;
pub mod proxmox_auth;
pub mod proxmox_connection;
pub mod vm;
