use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber. `log` records are forwarded into it, so
/// both macro families end up in the same output.
pub fn init_logging(verbose: bool) {
    let filter = std::env::var("LATENCY_EXPORTER_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| {
                if verbose {
                    EnvFilter::new("debug")
                } else {
                    EnvFilter::new("info")
                }
            },
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    match subscriber.try_init() {
        Ok(()) => tracing::debug!(verbose, "logging initialised"),
        Err(err) => eprintln!("Failed to set global default subscriber: {}", err),
    }
}
