pub mod config;
pub mod exporter;
pub mod http_probe;
pub mod logging;
pub mod metrics;
pub mod scrape;
pub mod server;
