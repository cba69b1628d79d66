use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::error::ConfigError;
use super::probe_config::ProbeSettings;
use super::target::{ProbeTarget, parse_targets};

/// Command line flags. Every flag can also be given through its environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "latency_exporter", version, about)]
pub struct Args {
    /// Address to listen on for web interface and telemetry.
    #[arg(long = "web.listen-address", env = "LISTEN_ADDRESS", default_value = "9101")]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", env = "METRICS_PATH", default_value = "/metrics")]
    pub metrics_path: String,

    /// Delimited list of urls to probe.
    #[arg(long = "web.urls-list", env = "TARGETS")]
    pub urls: String,

    /// Delimiter used to split the url list.
    #[arg(long = "web.url-delimiter", env = "TARGET_DELIMITER", default_value = ",")]
    pub delimiter: String,

    /// YAML file with probe settings.
    #[arg(long = "config.file", env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Comma separated nameserver IPs. Uses the system resolver configuration when absent.
    #[arg(long = "dns.hosts", env = "DNS_HOSTS")]
    pub dns_hosts: Option<String>,

    /// Log at debug level unless LATENCY_EXPORTER_LOG or RUST_LOG say otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

pub struct AppConfig {
    pub listen_address: SocketAddr,
    pub metrics_path: String,
    pub targets: Arc<[ProbeTarget]>,
    pub dns_hosts: Vec<IpAddr>,
    pub probe: ProbeSettings,
    pub verbose: bool,
}

/// Load the application configuration from `.env`, the command line, the
/// environment and the optional YAML settings file, in that order.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();
    AppConfig::from_args(Args::parse())
}

impl AppConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let listen_address = parse_listen_address(&args.listen_address)?;

        if !args.metrics_path.starts_with('/') || args.metrics_path == "/" {
            return Err(ConfigError::MetricsPath(args.metrics_path));
        }

        let targets = parse_targets(&args.urls, &args.delimiter)?;

        let dns_hosts = args
            .dns_hosts
            .as_deref()
            .map(parse_dns_hosts)
            .transpose()?
            .unwrap_or_default();

        let probe = match &args.config_file {
            Some(path) => read_settings(path)?,
            None => ProbeSettings::default(),
        };
        probe.validate()?;

        Ok(Self {
            listen_address,
            metrics_path: args.metrics_path,
            targets,
            dns_hosts,
            probe,
            verbose: args.verbose,
        })
    }
}

/// Accepts `9101`, `:9101` or a full `host:port`.
fn parse_listen_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let port_only = value.strip_prefix(':').unwrap_or(value);
    if let Ok(port) = port_only.parse::<u16>() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    value
        .parse()
        .map_err(|_| ConfigError::ListenAddress(value.to_string()))
}

fn parse_dns_hosts(value: &str) -> Result<Vec<IpAddr>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| {
            host.parse().map_err(|source| ConfigError::DnsHost {
                host: host.to_string(),
                source,
            })
        })
        .collect()
}

fn read_settings(path: &Path) -> Result<ProbeSettings, ConfigError> {
    let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if config_str.trim().is_empty() {
        return Ok(ProbeSettings::default());
    }
    serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Setup the TLS connector used for the handshake phase.
/// Certificate validation is whatever native-tls enforces, unless `insecure` is set.
pub fn setup_tls_connector(insecure: bool) -> Result<TokioTlsConnector, ConfigError> {
    let mut builder = native_tls::TlsConnector::builder();
    builder.danger_accept_invalid_certs(insecure);
    let connector = builder.build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup a DNS resolver for the DNS phase.
///
/// With explicit `dns_hosts` the resolver queries those nameservers over TCP,
/// otherwise it uses the system configuration. Caching is disabled so every
/// probe pays for a real lookup.
pub fn setup_resolver(
    dns_hosts: &[IpAddr],
    settings: &ProbeSettings,
) -> Result<TokioAsyncResolver, ConfigError> {
    let mut opts = ResolverOpts::default();
    opts.attempts = settings.dns_attempts;
    opts.timeout = settings.dns_timeout();
    opts.cache_size = 0;

    if dns_hosts.is_empty() {
        let (config, _) = trust_dns_resolver::system_conf::read_system_conf()
            .map_err(|err| ConfigError::SystemResolver(err.to_string()))?;
        return Ok(TokioAsyncResolver::tokio(config, opts));
    }

    let mut name_servers = NameServerConfigGroup::new();
    for ip in dns_hosts {
        name_servers.push(NameServerConfig {
            socket_addr: (*ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}
