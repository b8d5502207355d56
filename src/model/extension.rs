use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

/// Name used when a manifest carries no `name`.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Chrome,
    Edge,
    Brave,
    Chromium,
    Vivaldi,
    Opera,
    Firefox,
}

impl Vendor {
    pub const ALL: [Vendor; 7] = [
        Vendor::Chrome,
        Vendor::Edge,
        Vendor::Brave,
        Vendor::Chromium,
        Vendor::Vivaldi,
        Vendor::Opera,
        Vendor::Firefox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Chrome => "chrome",
            Vendor::Edge => "edge",
            Vendor::Brave => "brave",
            Vendor::Chromium => "chromium",
            Vendor::Vivaldi => "vivaldi",
            Vendor::Opera => "opera",
            Vendor::Firefox => "firefox",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Vendor::Chrome => "Chrome",
            Vendor::Edge => "Edge",
            Vendor::Brave => "Brave",
            Vendor::Chromium => "Chromium",
            Vendor::Vivaldi => "Vivaldi",
            Vendor::Opera => "Opera",
            Vendor::Firefox => "Firefox",
        }
    }

    /// True for browsers sharing the Chromium `Extensions/<id>/<version>` layout.
    pub fn is_chromium_family(&self) -> bool {
        !matches!(self, Vendor::Firefox)
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Vendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" => Ok(Vendor::Chrome),
            "edge" => Ok(Vendor::Edge),
            "brave" => Ok(Vendor::Brave),
            "chromium" => Ok(Vendor::Chromium),
            "vivaldi" => Ok(Vendor::Vivaldi),
            "opera" => Ok(Vendor::Opera),
            "firefox" => Ok(Vendor::Firefox),
            _ => Err(format!(
                "Unknown vendor: {}. Use: chrome, edge, brave, chromium, vivaldi, opera, firefox",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }
}

/// Risk label assigned by the assessment stage.
///
/// Parsing is case-insensitive and never fails: anything unrecognised
/// becomes [`RiskScore::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskScore {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskScore {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskScore::Unknown => "UNKNOWN",
            RiskScore::Low => "Low",
            RiskScore::Medium => "Medium",
            RiskScore::High => "High",
            RiskScore::Critical => "Critical",
        }
    }

    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" => RiskScore::Low,
            "medium" => RiskScore::Medium,
            "high" => RiskScore::High,
            "critical" => RiskScore::Critical,
            _ => RiskScore::Unknown,
        }
    }

    /// High and Critical count towards a report's high-risk total.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, RiskScore::High | RiskScore::Critical)
    }
}

impl std::fmt::Display for RiskScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RiskScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RiskScore::parse_lenient(&raw))
    }
}

/// One discovered extension installation.
///
/// Field groups are owned by pipeline stages: discovery fills the manifest
/// fields, enrichment may correct `name`/`description`/`author` and sets
/// `age_days`/`developer_email`, the indicator scan owns `extracted_*`, and
/// assessment owns `risk_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub vendor: Vendor,
    /// Human-readable source label, e.g. `Chrome (Docker Volume)`.
    pub vendor_label: String,
    /// The selected version directory, not the app-id directory.
    pub install_path: PathBuf,
    pub manifest_content: serde_json::Value,
    pub permissions: Vec<String>,
    pub content_security_policy: String,
    pub update_url: String,

    pub age_days: Option<i64>,
    pub developer_email: Option<String>,

    pub extracted_urls: BTreeSet<String>,
    pub extracted_ips: BTreeSet<String>,

    pub risk_score: RiskScore,
    pub risk_summary: String,
}

impl ExtensionRecord {
    pub fn new(id: impl Into<String>, vendor: Vendor, install_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: UNKNOWN_NAME.to_string(),
            version: "0.0.0".to_string(),
            author: String::new(),
            description: String::new(),
            vendor,
            vendor_label: vendor.display_name().to_string(),
            install_path: install_path.into(),
            manifest_content: serde_json::Value::Null,
            permissions: Vec::new(),
            content_security_policy: String::new(),
            update_url: String::new(),
            age_days: None,
            developer_email: None,
            extracted_urls: BTreeSet::new(),
            extracted_ips: BTreeSet::new(),
            risk_score: RiskScore::Unknown,
            risk_summary: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.vendor_label = label.into();
        self
    }
}
