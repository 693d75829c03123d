pub mod response;
pub mod service;
pub mod worker;
