use std::sync::Arc;

use latency_exporter::config::{load_config, setup_resolver, setup_tls_connector};
use latency_exporter::exporter::{LatencyExporter, VERSION};
use latency_exporter::http_probe::{HttpProbe, report};
use latency_exporter::logging::init_logging;
use latency_exporter::server::serve;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("latency_exporter: {}", report(err.as_ref()));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_logging(config.verbose);

    let resolver = setup_resolver(&config.dns_hosts, &config.probe)?;
    let tls_connector = setup_tls_connector(config.probe.insecure_skip_verify)?;
    let probe = HttpProbe::new(resolver, tls_connector, &config.probe);

    let exporter = Arc::new(LatencyExporter::new(
        Arc::clone(&config.targets),
        probe,
        &config.probe,
    )?);

    let listener = TcpListener::bind(config.listen_address).await?;
    log::info!(
        "Starting latency_exporter {VERSION} on {}, probing {} targets",
        config.listen_address,
        config.targets.len()
    );
    for target in config.targets.iter() {
        log::debug!("Target: {target}");
    }

    serve(listener, exporter, config.metrics_path, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {err}");
        }
    })
    .await;
    Ok(())
}
