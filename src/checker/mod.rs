//! Per-record stages that run after discovery.
//!
//! The indicator scan is local and synchronous. Enrichment and risk
//! assessment talk to the network, so they sit behind the [`Enricher`] and
//! [`RiskAssessor`] traits and can be swapped for in-memory doubles.

pub mod assessor;
pub mod enrichment;
pub mod heuristic;
pub mod indicators;

pub use assessor::LlmAssessor;
pub use enrichment::StoreEnricher;
pub use heuristic::HeuristicAssessor;
pub use indicators::{ContentScanner, Indicators};

use crate::model::{ExtensionRecord, RiskScore};
use async_trait::async_trait;

/// Fills store metadata into a record.
///
/// Implementations must not fail: errors are logged and leave the record
/// as it was.
#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn enrich(&self, record: &mut ExtensionRecord);
}

/// Outcome of a risk assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub score: RiskScore,
    pub summary: String,
}

impl Assessment {
    pub fn new(score: RiskScore, summary: impl Into<String>) -> Self {
        Self {
            score,
            summary: summary.into(),
        }
    }

    pub fn unknown(summary: impl Into<String>) -> Self {
        Self::new(RiskScore::Unknown, summary)
    }
}

/// Labels a fully populated record.
///
/// Failures come back as [`RiskScore::Unknown`] with an explanation,
/// never as errors.
#[async_trait]
pub trait RiskAssessor: Send + Sync {
    fn name(&self) -> &'static str;
    async fn assess(&self, record: &ExtensionRecord) -> Assessment;
}
