use std::net::AddrParseError;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong before the exporter starts serving.
/// All variants are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed target `{target}`: {source}")]
    MalformedTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target `{target}` uses unsupported scheme `{scheme}` (expected http or https)")]
    UnsupportedScheme { target: String, scheme: String },

    #[error("target `{0}` has no host")]
    MissingHost(String),

    #[error("no targets configured")]
    NoTargets,

    #[error("target delimiter must not be empty")]
    EmptyDelimiter,

    #[error("invalid listen address `{0}`")]
    ListenAddress(String),

    #[error("metrics path `{0}` must start with `/` and must not be `/`")]
    MetricsPath(String),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid dns host `{host}`: {source}")]
    DnsHost {
        host: String,
        #[source]
        source: AddrParseError,
    },

    #[error("{0} must be greater than zero")]
    ZeroSetting(&'static str),

    #[error("histogram buckets must be finite, positive and strictly increasing")]
    Buckets,

    #[error("failed to load system resolver configuration: {0}")]
    SystemResolver(String),

    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] native_tls::Error),
}
