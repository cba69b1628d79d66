pub mod app_config;
pub mod error;
pub mod probe_config;
pub mod target;

pub use app_config::{AppConfig, Args, load_config, setup_resolver, setup_tls_connector};
pub use error::ConfigError;
pub use probe_config::ProbeSettings;
pub use target::{ProbeTarget, parse_targets};
