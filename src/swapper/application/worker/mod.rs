pub mod active;
pub mod cache;
pub mod events;
pub mod requests;
pub mod runtime;
