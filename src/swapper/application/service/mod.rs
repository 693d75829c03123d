pub mod active_service;
pub mod change_detection_service;
pub mod config_extractor;
pub mod machine_service;
pub mod mapping_service;
pub mod registry_service;
pub mod swap_service;
