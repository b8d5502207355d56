use super::ExtensionRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final output of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Short token unique per invocation.
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub total: usize,
    pub high_risk_count: usize,
    pub extensions: Vec<ExtensionRecord>,
}

impl RiskReport {
    pub fn new(extensions: Vec<ExtensionRecord>) -> Self {
        Self::with_run_id(new_run_id(), extensions)
    }

    pub fn with_run_id(run_id: impl Into<String>, extensions: Vec<ExtensionRecord>) -> Self {
        let high_risk_count = extensions
            .iter()
            .filter(|e| e.risk_score.is_high_risk())
            .count();

        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            total: extensions.len(),
            high_risk_count,
            extensions,
        }
    }
}

/// First 8 hex characters of a random v4 UUID.
pub fn new_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RiskScore, Vendor};

    fn scored(id: &str, score: RiskScore) -> ExtensionRecord {
        let mut record = ExtensionRecord::new(id, Vendor::Chrome, "/ext");
        record.risk_score = score;
        record
    }

    #[test]
    fn test_report_counts_high_and_critical() {
        let report = RiskReport::new(vec![
            scored("a", RiskScore::Low),
            scored("b", RiskScore::High),
            scored("c", RiskScore::Critical),
            scored("d", RiskScore::Unknown),
        ]);

        assert_eq!(report.total, 4);
        assert_eq!(report.high_risk_count, 2);
    }

    #[test]
    fn test_run_ids_are_short_and_distinct() {
        let a = new_run_id();
        let b = new_run_id();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_report_json_field_names() {
        let report = RiskReport::with_run_id("deadbeef", vec![scored("a", RiskScore::Low)]);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["run_id"], "deadbeef");
        assert_eq!(json["total"], 1);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
        assert_eq!(json["extensions"][0]["risk_score"], "Low");
        assert!(json["extensions"][0].get("manifest_content").is_some());
    }
}
