//! Discovery → Enrichment → Scan → Risk → Report.
//!
//! Each record passes through the per-record stages in that order. With
//! `parallel` set, records are processed concurrently; they share nothing,
//! so no locking is involved.

use crate::cache::Cache;
use crate::checker::{
    ContentScanner, Enricher, HeuristicAssessor, LlmAssessor, RiskAssessor, StoreEnricher,
};
use crate::config::{AssessorKind, Config, IgnoreConfig};
use crate::discovery::DiscoveryManager;
use crate::model::{ExtensionRecord, RiskReport};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs discovery and the per-record stages, producing a [`RiskReport`].
///
/// # Example
///
/// ```no_run
/// use bera::{Config, Pipeline};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// let report = Pipeline::from_config(&config).run().await;
/// println!("{} extensions, {} high risk", report.total, report.high_risk_count);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    discovery: DiscoveryManager,
    ignore: IgnoreConfig,
    enricher: Option<Box<dyn Enricher>>,
    scanner: ContentScanner,
    assessor: Option<Box<dyn RiskAssessor>>,
    parallel: bool,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    /// Discovery and scanning only; enrichment and assessment are opt-in.
    pub fn new(discovery: DiscoveryManager) -> Self {
        Self {
            discovery,
            ignore: IgnoreConfig::default(),
            enricher: None,
            scanner: ContentScanner::new(),
            assessor: None,
            parallel: false,
            progress: None,
        }
    }

    /// Builds the full pipeline described by `config`.
    ///
    /// Vendors come from [`Config::vendor_profiles`]. A [`StoreEnricher`]
    /// with an on-disk cache is attached when `enrich` is set, and the
    /// assessor follows `assessor`. An LLM assessor without an API key is
    /// still attached; it labels every record `UNKNOWN`.
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let scanner = ContentScanner::new()
            .with_extra_ignored(&config.scan.extra_ignored_extensions)
            .with_max_file_bytes(config.scan.max_file_bytes);

        let mut pipeline = Self::new(DiscoveryManager::from_profiles(&config.vendor_profiles()))
            .with_ignore(config.ignore.clone())
            .with_scanner(scanner)
            .parallel(config.parallel);

        if config.enrich {
            let enricher = StoreEnricher::new(timeout).with_cache(Cache::new(config.cache_ttl_hours));
            pipeline = pipeline.with_enricher(Box::new(enricher));
        }

        match config.assessor {
            AssessorKind::Llm => {
                let assessor = LlmAssessor::new(config.llm.endpoint(), config.llm.timeout());
                if !assessor.is_configured() {
                    warn!("no GROQ_API_KEY or OPENAI_API_KEY set; risk scores will be UNKNOWN");
                }
                pipeline = pipeline.with_assessor(Box::new(assessor));
            }
            AssessorKind::Heuristic => {
                pipeline = pipeline.with_assessor(Box::new(HeuristicAssessor));
            }
            AssessorKind::None => {}
        }

        pipeline
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_scanner(mut self, scanner: ContentScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_assessor(mut self, assessor: Box<dyn RiskAssessor>) -> Self {
        self.assessor = Some(assessor);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Progress bar advanced once per processed record. Its length is set
    /// when discovery finishes.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs discovery and drops ignored app ids.
    pub fn discover(&self) -> Vec<ExtensionRecord> {
        let mut records = self.discovery.run();
        records.retain(|r| {
            let keep = !self.ignore.should_ignore_extension(&r.id);
            if !keep {
                debug!(app_id = %r.id, "ignored by config");
            }
            keep
        });
        records
    }

    /// Enrichment, indicator scan and assessment for one record, in order.
    pub async fn process(&self, record: &mut ExtensionRecord) {
        if let Some(enricher) = &self.enricher {
            enricher.enrich(record).await;
        }

        self.scanner.scan(record);

        if let Some(assessor) = &self.assessor {
            let assessment = assessor.assess(record).await;
            record.risk_score = assessment.score;
            record.risk_summary = assessment.summary;
        }

        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
    }

    /// Runs every stage and aggregates the records into a report.
    ///
    /// Never fails: per-vendor, per-record and collaborator failures are
    /// logged and leave defaults in place. Record order follows discovery
    /// order in both sequential and parallel mode.
    pub async fn run(&self) -> RiskReport {
        let mut records = self.discover();
        info!(
            count = records.len(),
            enricher = self.enricher.as_ref().map(|e| e.name()).unwrap_or("none"),
            assessor = self.assessor.as_ref().map(|a| a.name()).unwrap_or("none"),
            "processing extensions"
        );

        if let Some(pb) = &self.progress {
            pb.set_length(records.len() as u64);
        }

        if self.parallel {
            join_all(records.iter_mut().map(|record| self.process(record))).await;
        } else {
            for record in records.iter_mut() {
                self.process(record).await;
            }
        }

        let report = RiskReport::new(records);
        info!(
            run_id = %report.run_id,
            total = report.total,
            high_risk = report.high_risk_count,
            "run complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Assessment;
    use crate::discovery::VendorDiscoverer;
    use crate::model::{RiskScore, Vendor};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FixedEnricher;

    #[async_trait]
    impl Enricher for FixedEnricher {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn enrich(&self, record: &mut ExtensionRecord) {
            record.developer_email = Some(format!("{}@store.example", record.id));
            record.age_days = Some(7);
        }
    }

    /// High when the scan found a URL, which proves the scan ran first.
    struct IndicatorAssessor;

    #[async_trait]
    impl RiskAssessor for IndicatorAssessor {
        fn name(&self) -> &'static str {
            "indicator"
        }

        async fn assess(&self, record: &ExtensionRecord) -> Assessment {
            assert!(record.developer_email.is_some(), "enrichment must run before assessment");
            if record.extracted_urls.is_empty() {
                Assessment::new(RiskScore::Low, "quiet")
            } else {
                Assessment::new(RiskScore::High, "talks to the network")
            }
        }
    }

    fn write_ext(root: &Path, app_id: &str, script: Option<&str>) {
        let dir = root.join(app_id).join("1.0.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("manifest.json"), format!(r#"{{"name": "{}"}}"#, app_id)).unwrap();
        if let Some(script) = script {
            fs::write(dir.join("background.js"), script).unwrap();
        }
    }

    fn pipeline_over(root: &Path) -> Pipeline {
        let discovery = DiscoveryManager::new(vec![VendorDiscoverer::with_root(
            Vendor::Chrome,
            "Chrome",
            root,
        )]);
        Pipeline::new(discovery)
            .with_enricher(Box::new(FixedEnricher))
            .with_assessor(Box::new(IndicatorAssessor))
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "loud", Some("fetch('https://c2.evil.example/beacon');"));
        write_ext(tmp.path(), "quiet", None);

        let report = pipeline_over(tmp.path()).run().await;

        assert_eq!(report.total, 2);
        assert_eq!(report.high_risk_count, 1);

        let loud = &report.extensions[0];
        assert_eq!(loud.id, "loud");
        assert_eq!(loud.risk_score, RiskScore::High);
        assert!(loud.extracted_urls.contains("https://c2.evil.example/beacon"));
        assert_eq!(loud.developer_email.as_deref(), Some("loud@store.example"));

        let quiet = &report.extensions[1];
        assert_eq!(quiet.risk_score, RiskScore::Low);
        assert_eq!(quiet.risk_summary, "quiet");
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "a", Some("http://1.example.com 10.0.0.5"));
        write_ext(tmp.path(), "b", Some("nothing here"));
        write_ext(tmp.path(), "c", Some("https://3.example.com"));

        let sequential = pipeline_over(tmp.path()).run().await;
        let parallel = pipeline_over(tmp.path()).parallel(true).run().await;

        assert_eq!(sequential.extensions, parallel.extensions);
        assert_ne!(sequential.run_id, parallel.run_id);
    }

    #[tokio::test]
    async fn test_ignored_ids_are_dropped() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "keepme", None);
        write_ext(tmp.path(), "dropme", None);

        let ignore = IgnoreConfig {
            extensions: vec!["drop*".to_string()],
        };
        let report = pipeline_over(tmp.path()).with_ignore(ignore).run().await;

        assert_eq!(report.total, 1);
        assert_eq!(report.extensions[0].id, "keepme");
    }

    #[tokio::test]
    async fn test_without_collaborators_scores_stay_unknown() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "solo", Some("https://solo.example.com"));

        let discovery = DiscoveryManager::new(vec![VendorDiscoverer::with_root(
            Vendor::Edge,
            "Edge",
            tmp.path(),
        )]);
        let report = Pipeline::new(discovery).run().await;

        let record = &report.extensions[0];
        assert_eq!(record.risk_score, RiskScore::Unknown);
        assert_eq!(record.developer_email, None);
        assert_eq!(record.extracted_urls.len(), 1);
        assert_eq!(report.high_risk_count, 0);
    }

    #[tokio::test]
    async fn test_empty_discovery_gives_empty_report() {
        let tmp = TempDir::new().unwrap();
        let report = pipeline_over(&tmp.path().join("missing")).run().await;
        assert_eq!(report.total, 0);
        assert!(report.extensions.is_empty());
    }
}
