//! Configuration file handling.
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/bera/config.toml`
//! - macOS: `~/Library/Application Support/bera/config.toml`
//! - Windows: `%APPDATA%\bera\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! vendors = ["chrome", "edge", "brave"]
//! enrich = true
//! request_timeout_secs = 5
//! assessor = "heuristic"
//!
//! [roots]
//! chrome = "$HOME/snap/chromium/common/chromium/Default/Extensions"
//!
//! [scan]
//! max_file_bytes = 8388608
//! extra_ignored_extensions = ["wasm"]
//!
//! [ignore]
//! extensions = ["nmmhkkegccagdldgiimedpiccmgmieda", "ghbmnnjooek*"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::DEFAULT_TTL_HOURS;
use crate::checker::assessor::LlmEndpoint;
use crate::checker::enrichment::DEFAULT_TIMEOUT_SECS;
use crate::discovery::VendorProfile;
use crate::model::Vendor;

/// Which risk assessor labels the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessorKind {
    #[default]
    Llm,
    Heuristic,
    None,
}

impl FromStr for AssessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "llm" => Ok(AssessorKind::Llm),
            "heuristic" => Ok(AssessorKind::Heuristic),
            "none" | "off" => Ok(AssessorKind::None),
            _ => Err(format!(
                "Unknown assessor: {}. Use 'llm', 'heuristic' or 'none'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vendors to discover, in order.
    ///
    /// Default: chrome, edge
    pub vendors: Vec<Vendor>,

    /// Explicit report path. When unset the report goes to
    /// `bera_report_<run_id>.json` in the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Whether to look extensions up in their store.
    pub enrich: bool,

    /// Per-request timeout for store lookups.
    pub request_timeout_secs: u64,

    /// How long store listings stay cached.
    pub cache_ttl_hours: u64,

    pub assessor: AssessorKind,

    /// Process records concurrently.
    pub parallel: bool,

    /// Root-path templates keyed by vendor name, replacing the platform
    /// default. An override also disables the container root.
    pub roots: BTreeMap<String, String>,

    pub llm: LlmConfig,

    pub scan: ScanConfig,

    pub ignore: IgnoreConfig,
}

/// Chat endpoint overrides. API keys are only read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    /// Endpoint chosen from the environment with these overrides applied.
    pub fn endpoint(&self) -> Option<LlmEndpoint> {
        let mut endpoint = LlmEndpoint::from_env()?;
        if let Some(base_url) = &self.base_url {
            endpoint.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            endpoint.model = model.clone();
        }
        Some(endpoint)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Files larger than this are not read. Unset reads every file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,

    /// Added to the built-in list of media extensions that are never read.
    pub extra_ignored_extensions: Vec<String>,
}

/// Extensions to leave out of the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// App ids; `*` acts as a wildcard.
    pub extensions: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_extension(&self, app_id: &str) -> bool {
        self.extensions.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, app_id)
            } else {
                pattern == app_id
            }
        })
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];

    if !remaining.ends_with(last) {
        return false;
    }
    remaining = &remaining[..remaining.len() - last.len()];

    for part in parts[1..parts.len() - 1].iter().filter(|p| !p.is_empty()) {
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendors: vec![Vendor::Chrome, Vendor::Edge],
            output_path: None,
            enrich: true,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_ttl_hours: DEFAULT_TTL_HOURS,
            assessor: AssessorKind::Llm,
            parallel: false,
            roots: BTreeMap::new(),
            llm: LlmConfig::default(),
            scan: ScanConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Writes the configuration to `path`, creating the parent directory if
    /// needed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bera::Config;
    /// use std::path::Path;
    ///
    /// Config::default().save_to(Path::new("/tmp/bera.toml"))?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bera")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    /// Profiles for the configured vendors with root overrides applied.
    ///
    /// Vendors without discovery support are logged and left out.
    pub fn vendor_profiles(&self) -> Vec<VendorProfile> {
        for key in self.roots.keys() {
            if Vendor::from_str(key).is_err() {
                warn!(key = %key, "ignoring root override for unknown vendor");
            }
        }

        self.vendors
            .iter()
            .filter_map(|vendor| {
                let profile = match VendorProfile::builtin(*vendor) {
                    Some(profile) => profile,
                    None => {
                        info!(vendor = %vendor, "discovery is not implemented for this vendor");
                        return None;
                    }
                };

                let root = self
                    .roots
                    .iter()
                    .find(|(key, _)| Vendor::from_str(key).ok() == Some(*vendor))
                    .map(|(_, root)| root);

                Some(match root {
                    Some(root) => profile.with_root_template(root).with_container_root(None),
                    None => profile,
                })
            })
            .collect()
    }
}
