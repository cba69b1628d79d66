use std::time::Duration;

use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

use super::result::{Phase, TimingRecord};

/// Why a probe did not complete.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("target has no usable host")]
    MissingHost,

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("dns lookup failed: {0}")]
    Dns(#[from] ResolveError),

    #[error("dns lookup for {0} returned no addresses")]
    NoAddresses(String),

    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("tls handshake failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("http exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("{phase} timed out after {after:?}")]
    PhaseTimeout { phase: Phase, after: Duration },

    #[error("probe deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// A failed probe. The partial record keeps every phase measured before the
/// failure, so the aggregate still shows where the probe got stuck.
#[derive(Debug, Error)]
#[error("probe of {target} failed: {cause}")]
pub struct ProbeFailed {
    pub target: String,
    #[source]
    pub cause: ProbeError,
    pub partial: Box<TimingRecord>,
}

impl ProbeFailed {
    pub fn new(partial: TimingRecord, cause: ProbeError) -> Self {
        Self {
            target: partial.target.clone(),
            cause,
            partial: Box::new(partial),
        }
    }
}
