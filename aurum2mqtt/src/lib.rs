// externally visible interfaces
pub mod catalog;
pub mod error;
pub mod home_assistant;
pub mod meter;
pub mod metric_collector;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod normalize;
pub mod pipeline;
pub mod registration;
pub mod scheduler;

// internal interfaces
mod home_assistant_config;
