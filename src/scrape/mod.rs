pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{CycleReport, ScrapeOrchestrator};
