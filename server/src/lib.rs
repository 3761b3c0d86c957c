//! FormForge server: upload storage, the optional field detector hook and
//! form materialization exposed over HTTP.

pub mod commands;
pub mod config;
pub mod detect;
pub mod routes;
pub mod store;

pub use commands::CommandError;
pub use config::{config_path, load_config, AppConfig, ConfigError, DetectorConfig};
pub use detect::{parse_detector_output, CommandDetector};
pub use routes::{app, ApiError, AppState};
pub use store::{DocumentStore, StoreError};
