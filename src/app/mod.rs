pub mod ports;
pub mod context;

pub mod auth_manager;
pub mod address_resolver;
pub mod duplicate_detector;
pub mod image_acquirer;
pub mod media_uploader;
pub mod variables;
pub mod reconcile_use_case;
