//! Browser extension risk assessment.
//!
//! Finds installed extensions across Chromium-family browsers, extracts
//! network indicators from their files, optionally enriches them with store
//! metadata, labels each with a risk score and writes a JSON report.

pub mod cache;
pub mod checker;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod platform;

pub use cache::Cache;
pub use checker::{ContentScanner, Enricher, RiskAssessor};
pub use config::Config;
pub use discovery::{DiscoveryManager, VendorDiscoverer, VendorProfile};
pub use error::{DiscoveryError, ManifestError, ReportError};
pub use model::{ExtensionRecord, Platform, RiskReport, RiskScore, Vendor};
pub use pipeline::Pipeline;
