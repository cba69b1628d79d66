pub mod error;
pub mod probe;
pub mod result;
pub mod tap;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt::Write;

pub use error::{ProbeError, ProbeFailed};
pub use probe::{HttpProbe, Probe};
pub use result::{ConnectionPhase, Phase, PhaseTiming, TimingRecord};
pub use timer::PhaseTimer;

/// Renders an error with its full chain of causes on one line.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{err}");
    while let Some(src) = err.source() {
        let _ = write!(s, ": caused by: {src}");
        err = src;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_walks_the_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let partial = TimingRecord {
            target: "http://10.0.0.1".to_string(),
            dns: PhaseTiming::Skipped,
            connect: PhaseTiming::Failed,
            tls: PhaseTiming::Skipped,
            ttfb: PhaseTiming::Failed,
            round_trip: PhaseTiming::Failed,
            http_status: None,
        };
        let failed = ProbeFailed::new(partial, ProbeError::Connect(io));
        let rendered = report(&failed);
        assert!(rendered.starts_with("probe of http://10.0.0.1 failed"));
        assert!(rendered.ends_with("caused by: refused"));
    }
}
