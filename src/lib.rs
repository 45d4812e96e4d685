pub mod config;
pub mod pose;
pub mod protocol;
pub mod stats;
pub mod telemetry;
pub mod tracker;
