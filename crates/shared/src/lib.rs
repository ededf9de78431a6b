//! Configuration and logging shared by the YumeFind crates.

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::LogConfig;
