pub mod alerts;
pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod monitor;
pub mod plants_api;
pub mod status;
pub mod storage;
pub mod sync;
