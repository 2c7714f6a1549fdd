mod service;

pub use service::{MonitorService, PLANTS_KEY};
