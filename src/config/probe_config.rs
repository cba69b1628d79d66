use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;

/// Probe tuning loaded from the optional YAML config file.
/// Every field has a default, so an empty file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSettings {
    /// Ceiling for one whole probe, from DNS lookup to the last body byte.
    pub timeout_seconds: u64,

    /// How long a TCP connect may take.
    pub dial_timeout_ms: u64,

    pub tls_handshake_timeout_ms: u64,

    /// How long to wait for response headers once the request is written.
    pub response_header_timeout_ms: u64,

    pub dns_timeout_ms: u64,

    pub dns_attempts: usize,

    /// Upper bound on probes in flight within one collection cycle.
    pub max_concurrency: usize,

    /// Accept invalid certificates. Off by default; the TLS library's own
    /// validation is the only validation performed.
    pub insecure_skip_verify: bool,

    pub user_agent: String,

    /// Histogram bucket upper bounds, in seconds.
    pub buckets: Vec<f64>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            dial_timeout_ms: 3_000,
            tls_handshake_timeout_ms: 3_000,
            response_header_timeout_ms: 8_000,
            dns_timeout_ms: 2_000,
            dns_attempts: 2,
            max_concurrency: 32,
            insecure_skip_verify: false,
            user_agent: format!("latency-exporter/{}", env!("CARGO_PKG_VERSION")),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        }
    }
}

impl ProbeSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_handshake_timeout_ms)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("timeout_seconds", self.timeout_seconds),
            ("dial_timeout_ms", self.dial_timeout_ms),
            ("tls_handshake_timeout_ms", self.tls_handshake_timeout_ms),
            ("response_header_timeout_ms", self.response_header_timeout_ms),
            ("dns_timeout_ms", self.dns_timeout_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::ZeroSetting(name));
            }
        }
        if self.dns_attempts == 0 {
            return Err(ConfigError::ZeroSetting("dns_attempts"));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroSetting("max_concurrency"));
        }

        let increasing = self.buckets.windows(2).all(|pair| pair[0] < pair[1]);
        let valid = self.buckets.iter().all(|b| b.is_finite() && *b > 0.0);
        if self.buckets.is_empty() || !increasing || !valid {
            return Err(ConfigError::Buckets);
        }

        let deadline = self.deadline();
        let phases = [
            ("dial", self.dial_timeout()),
            ("tls handshake", self.tls_handshake_timeout()),
            ("response header", self.response_header_timeout()),
            ("dns", self.dns_timeout()),
        ];
        for (phase, timeout) in phases {
            if timeout >= deadline {
                log::warn!(
                    "The {phase} timeout ({timeout:?}) is not shorter than the probe deadline ({deadline:?}); a hung {phase} will surface as a deadline failure"
                );
            }
        }

        Ok(())
    }
}
