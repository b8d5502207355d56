//! Core data types shared by every pipeline stage.
//!
//! - [`ExtensionRecord`] - one discovered extension installation
//! - [`Vendor`] - the browser whose on-disk layout produced the record
//! - [`Platform`] - operating system platform
//! - [`RiskScore`] - risk label written by the assessment stage
//! - [`RiskReport`] - the aggregate written at the end of a run
//!
//! # Example
//!
//! ```
//! use bera::{ExtensionRecord, RiskReport, Vendor};
//!
//! let record = ExtensionRecord::new("abcdefg", Vendor::Chrome, "/tmp/abcdefg/1.0.0");
//! let report = RiskReport::new(vec![record]);
//!
//! assert_eq!(report.total, 1);
//! ```

mod extension;
mod report;

pub use extension::*;
pub use report::*;
