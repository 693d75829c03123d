pub mod api_client;
pub mod hypervisor;
pub mod kv_store;
pub mod queue;
