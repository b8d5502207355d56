//! Installed-extension discovery.
//!
//! Every Chromium-family browser stores extensions as
//! `<root>/<app id>/<version>/manifest.json`. Vendors differ only in where
//! `<root>` lives, so a vendor is described by a [`VendorProfile`] and all
//! of them run through the same [`VendorDiscoverer`] algorithm.
//!
//! # Example
//!
//! ```no_run
//! use bera::discovery::DiscoveryManager;
//!
//! let manager = DiscoveryManager::default();
//! for record in manager.run() {
//!     println!("[{}] {} ({})", record.vendor_label, record.name, record.id);
//! }
//! ```

mod manifest;

pub use manifest::read_manifest;
pub(crate) use manifest::decode_lossy;

use crate::error::DiscoveryError;
use crate::model::{ExtensionRecord, Platform, Vendor};
use crate::platform::{container_root, expand_path, root_template};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manifest filename shared by the Chromium family.
pub const CHROMIUM_MANIFEST: &str = "manifest.json";

/// Data describing where one vendor keeps its extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorProfile {
    pub vendor: Vendor,
    pub label: String,
    /// Native root, possibly containing `%VAR%`/`$VAR`/`~` placeholders.
    pub root_template: String,
    /// Mounted root that takes precedence when it exists.
    pub container_root: Option<PathBuf>,
    pub manifest_file: String,
}

impl VendorProfile {
    /// Built-in profile for the current platform.
    ///
    /// Returns `None` for vendors whose discovery is not implemented
    /// (Firefox).
    ///
    /// # Example
    ///
    /// ```
    /// use bera::{Vendor, VendorProfile};
    ///
    /// let brave = VendorProfile::builtin(Vendor::Brave).unwrap();
    /// assert_eq!(brave.label, "Brave");
    /// assert!(VendorProfile::builtin(Vendor::Firefox).is_none());
    /// ```
    pub fn builtin(vendor: Vendor) -> Option<Self> {
        Self::builtin_for(vendor, Platform::current())
    }

    /// Built-in profile for an explicit platform.
    pub fn builtin_for(vendor: Vendor, platform: Platform) -> Option<Self> {
        let template = root_template(vendor, platform)?;
        Some(Self {
            vendor,
            label: vendor.display_name().to_string(),
            root_template: template.to_string(),
            container_root: container_root(vendor).map(PathBuf::from),
            manifest_file: CHROMIUM_MANIFEST.to_string(),
        })
    }

    /// Replaces the native root. Placeholders are expanded when a
    /// discoverer is built from the profile.
    pub fn with_root_template(mut self, template: impl Into<String>) -> Self {
        self.root_template = template.into();
        self
    }

    /// Sets or clears (`None`) the mounted root checked before the native one.
    pub fn with_container_root(mut self, root: Option<PathBuf>) -> Self {
        self.container_root = root;
        self
    }
}

/// Locates installed extensions under one vendor root.
#[derive(Debug, Clone)]
pub struct VendorDiscoverer {
    vendor: Vendor,
    label: String,
    root: PathBuf,
    manifest_file: String,
}

impl VendorDiscoverer {
    /// Resolves the profile's root once, at construction.
    ///
    /// An existing container root wins over the native path and tags the
    /// label with `(Docker Volume)`; an absent one is ignored.
    pub fn new(profile: &VendorProfile) -> Self {
        let mounted = profile.container_root.as_ref().filter(|p| p.is_dir());

        let (root, label) = match mounted {
            Some(path) => (path.clone(), format!("{} (Docker Volume)", profile.label)),
            None => (expand_path(&profile.root_template), profile.label.clone()),
        };

        Self {
            vendor: profile.vendor,
            label,
            root,
            manifest_file: profile.manifest_file.clone(),
        }
    }

    /// Discoverer over an explicit, already-resolved root.
    ///
    /// # Arguments
    ///
    /// * `vendor` - browser family, decides enrichment dispatch
    /// * `label` - copied into every record's `vendor_label`
    /// * `root` - directory holding `<app id>/<version>/manifest.json`
    ///
    /// # Example
    ///
    /// ```
    /// use bera::{Vendor, VendorDiscoverer};
    ///
    /// let discoverer = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", "/no/such/root");
    /// assert!(discoverer.discover().unwrap().is_empty());
    /// ```
    pub fn with_root(vendor: Vendor, label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            vendor,
            label: label.into(),
            root: root.into(),
            manifest_file: CHROMIUM_MANIFEST.to_string(),
        }
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns one record per app id that has a version directory with a
    /// readable manifest.
    ///
    /// A missing root means the browser is not installed and yields an
    /// empty list.
    ///
    /// Apps are visited in directory-name order. An app without a version
    /// directory or manifest is skipped silently; one whose manifest cannot
    /// be read or parsed is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when the root exists but cannot be listed.
    pub fn discover(&self) -> Result<Vec<ExtensionRecord>, DiscoveryError> {
        if !self.root.exists() {
            debug!(vendor = %self.label, root = ?self.root, "extensions root not found");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|source| DiscoveryError::ReadRoot {
            path: self.root.clone(),
            source,
        })?;

        let mut app_dirs: Vec<_> = entries.flatten().filter(|e| e.path().is_dir()).collect();
        app_dirs.sort_by_key(|e| e.file_name());

        let mut records = Vec::new();
        for entry in app_dirs {
            let app_id = entry.file_name().to_string_lossy().to_string();
            let app_dir = entry.path();

            let version_dir = match select_version_dir(&app_dir) {
                Some(dir) => dir,
                None => {
                    debug!(vendor = %self.label, app_id = %app_id, "no version directory");
                    continue;
                }
            };

            let manifest_path = version_dir.join(&self.manifest_file);
            if !manifest_path.is_file() {
                debug!(vendor = %self.label, app_id = %app_id, "no manifest in {:?}", version_dir);
                continue;
            }

            match read_manifest(&manifest_path, &app_id, self.vendor, &self.label, &version_dir) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(vendor = %self.label, app_id = %app_id, error = %e, "skipping extension");
                }
            }
        }

        Ok(records)
    }
}

/// Picks the version directory whose name sorts last as a plain string.
///
/// This is not a semantic-version comparison: `9.0` beats `10.0`. When the
/// names parse as versions and disagree with the pick, a warning is logged
/// and the lexicographic choice is kept.
pub fn select_version_dir(app_dir: &Path) -> Option<PathBuf> {
    let mut names: Vec<String> = fs::read_dir(app_dir)
        .ok()?
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();

    names.sort();
    let chosen = names.last()?;

    if let Some(newest) = semantic_latest(&names) {
        if &newest != chosen {
            warn!(
                app_dir = ?app_dir,
                chosen = %chosen,
                newest = %newest,
                "lexicographic version pick differs from the newest semantic version"
            );
        }
    }

    Some(app_dir.join(chosen))
}

fn semantic_latest(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| parse_version_dir(name).map(|v| (v, name)))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, name)| name.clone())
}

/// Parses names like `1.2`, `1.2.3` or Chrome's `1.2.3_0`.
fn parse_version_dir(name: &str) -> Option<semver::Version> {
    let base = name.split('_').next()?;
    let padded = match base.matches('.').count() {
        0 => format!("{}.0.0", base),
        1 => format!("{}.0", base),
        _ => base.to_string(),
    };
    semver::Version::parse(&padded).ok()
}

/// Runs every configured discoverer in order and concatenates the results.
///
/// # Example
///
/// ```
/// use bera::{DiscoveryManager, Vendor, VendorDiscoverer};
///
/// let manager = DiscoveryManager::new(vec![
///     VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", "/no/chrome"),
///     VendorDiscoverer::with_root(Vendor::Edge, "Edge", "/no/edge"),
/// ]);
/// assert!(manager.run().is_empty());
/// ```
pub struct DiscoveryManager {
    discoverers: Vec<VendorDiscoverer>,
}

impl DiscoveryManager {
    pub fn new(discoverers: Vec<VendorDiscoverer>) -> Self {
        Self { discoverers }
    }

    /// One discoverer per profile, roots resolved now.
    pub fn from_profiles(profiles: &[VendorProfile]) -> Self {
        Self::new(profiles.iter().map(VendorDiscoverer::new).collect())
    }

    /// Built-in profiles for `vendors`; vendors without one are skipped.
    pub fn for_vendors(vendors: &[Vendor]) -> Self {
        let profiles: Vec<_> = vendors
            .iter()
            .filter_map(|vendor| {
                let profile = VendorProfile::builtin(*vendor);
                if profile.is_none() {
                    info!(vendor = %vendor, "discovery is not implemented for this vendor");
                }
                profile
            })
            .collect();
        Self::from_profiles(&profiles)
    }

    pub fn discoverers(&self) -> &[VendorDiscoverer] {
        &self.discoverers
    }

    /// A vendor that fails contributes no records; the rest still run.
    pub fn run(&self) -> Vec<ExtensionRecord> {
        let mut all = Vec::new();

        for discoverer in &self.discoverers {
            match discoverer.discover() {
                Ok(found) => {
                    info!(vendor = %discoverer.label(), count = found.len(), "discovered extensions");
                    all.extend(found);
                }
                Err(e) => {
                    warn!(vendor = %discoverer.label(), error = %e, "discoverer failed");
                }
            }
        }

        all
    }
}

impl Default for DiscoveryManager {
    fn default() -> Self {
        Self::for_vendors(&[Vendor::Chrome, Vendor::Edge])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_ext(root: &Path, app_id: &str, version: &str, manifest: &str) -> PathBuf {
        let dir = root.join(app_id).join(version);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("manifest.json"), manifest).unwrap();
        dir
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let discoverer = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", tmp.path().join("nope"));
        assert!(discoverer.discover().unwrap().is_empty());
    }

    #[test]
    fn test_discovers_single_extension() {
        let tmp = TempDir::new().unwrap();
        let version_dir = write_ext(
            tmp.path(),
            "abcdefg",
            "1.0.0",
            r#"{"name": "Test Extension", "version": "1.0.0", "permissions": ["tabs"]}"#,
        );

        let discoverer = VendorDiscoverer::with_root(Vendor::Chrome, "TestBrowser", tmp.path());
        let records = discoverer.discover().unwrap();

        assert_eq!(records.len(), 1);
        let ext = &records[0];
        assert_eq!(ext.id, "abcdefg");
        assert_eq!(ext.name, "Test Extension");
        assert_eq!(ext.version, "1.0.0");
        assert_eq!(ext.vendor_label, "TestBrowser");
        assert_eq!(ext.install_path, version_dir);
        assert!(ext.permissions.contains(&"tabs".to_string()));
    }

    #[test]
    fn test_version_selection_is_lexicographic() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        for v in ["1.0.0", "2.0.0", "10.0.0"] {
            fs::create_dir_all(app.join(v)).unwrap();
        }

        assert_eq!(select_version_dir(&app), Some(app.join("2.0.0")));
    }

    #[test]
    fn test_version_selection_ignores_files() {
        let tmp = TempDir::new().unwrap();
        let app = tmp.path().join("app");
        fs::create_dir_all(app.join("1.0.0")).unwrap();
        fs::write(app.join("zzz.txt"), "not a version").unwrap();

        assert_eq!(select_version_dir(&app), Some(app.join("1.0.0")));
    }

    #[test]
    fn test_semantic_latest_flags_multi_digit_versions() {
        let names = vec!["10.0.0".to_string(), "2.0.0".to_string(), "1.0.0_0".to_string()];
        assert_eq!(semantic_latest(&names), Some("10.0.0".to_string()));
        assert!(parse_version_dir("1.2").is_some());
        assert!(parse_version_dir("Temp").is_none());
    }

    #[test]
    fn test_app_without_versions_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("empty_app")).unwrap();
        write_ext(tmp.path(), "good", "1.0", r#"{"name": "Good"}"#);

        let records = VendorDiscoverer::with_root(Vendor::Edge, "Edge", tmp.path())
            .discover()
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
    }

    #[test]
    fn test_missing_manifest_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("nomanifest").join("1.0")).unwrap();

        let records = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", tmp.path())
            .discover()
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_manifest_only_in_older_version_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "app", "1.0", r#"{"name": "Old"}"#);
        fs::create_dir_all(tmp.path().join("app").join("2.0")).unwrap();

        let records = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", tmp.path())
            .discover()
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_corrupt_manifest_does_not_block_siblings() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "aaa", "1.0", r#"{"name": "First"}"#);
        write_ext(tmp.path(), "bbb", "1.0", "{ this is not json");
        write_ext(tmp.path(), "ccc", "1.0", r#"{"name": "Third"}"#);

        let records = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", tmp.path())
            .discover()
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "ccc"]);
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        write_ext(tmp.path(), "one", "1.0", r#"{"name": "One"}"#);
        write_ext(tmp.path(), "two", "3.1", r#"{"name": "Two", "author": {"email": "a@b.c"}}"#);

        let discoverer = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", tmp.path());
        assert_eq!(discoverer.discover().unwrap(), discoverer.discover().unwrap());
    }

    #[test]
    fn test_container_root_takes_precedence() {
        let mounted = TempDir::new().unwrap();
        let profile = VendorProfile::builtin_for(Vendor::Chrome, Platform::Linux)
            .unwrap()
            .with_container_root(Some(mounted.path().to_path_buf()));

        let discoverer = VendorDiscoverer::new(&profile);
        assert_eq!(discoverer.root(), mounted.path());
        assert_eq!(discoverer.label(), "Chrome (Docker Volume)");
    }

    #[test]
    fn test_absent_container_root_falls_back_to_native() {
        let native = TempDir::new().unwrap();
        let profile = VendorProfile::builtin_for(Vendor::Edge, Platform::Linux)
            .unwrap()
            .with_root_template(native.path().to_string_lossy().to_string())
            .with_container_root(Some(native.path().join("not-mounted")));

        let discoverer = VendorDiscoverer::new(&profile);
        assert_eq!(discoverer.root(), native.path());
        assert_eq!(discoverer.label(), "Edge");
    }

    #[test]
    fn test_firefox_has_no_profile() {
        assert!(VendorProfile::builtin(Vendor::Firefox).is_none());
        assert!(DiscoveryManager::for_vendors(&[Vendor::Firefox])
            .discoverers()
            .is_empty());
    }

    #[test]
    fn test_manager_concatenates_in_vendor_order() {
        let chrome = TempDir::new().unwrap();
        let edge = TempDir::new().unwrap();
        write_ext(chrome.path(), "c1", "1.0", r#"{"name": "C1"}"#);
        write_ext(edge.path(), "e1", "1.0", r#"{"name": "E1"}"#);
        write_ext(edge.path(), "e2", "1.0", r#"{"name": "E2"}"#);

        let manager = DiscoveryManager::new(vec![
            VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", chrome.path()),
            VendorDiscoverer::with_root(Vendor::Edge, "Edge", edge.path()),
        ]);

        let ids: Vec<_> = manager.run().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["c1", "e1", "e2"]);
    }

    #[test]
    fn test_manager_isolates_failing_vendor() {
        let tmp = TempDir::new().unwrap();
        let not_a_dir = tmp.path().join("root-is-a-file");
        fs::write(&not_a_dir, "oops").unwrap();

        let edge = TempDir::new().unwrap();
        write_ext(edge.path(), "e1", "1.0", r#"{"name": "E1"}"#);

        let broken = VendorDiscoverer::with_root(Vendor::Chrome, "Chrome", &not_a_dir);
        assert!(broken.discover().is_err());

        let manager = DiscoveryManager::new(vec![
            broken,
            VendorDiscoverer::with_root(Vendor::Edge, "Edge", edge.path()),
        ]);

        let records = manager.run();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vendor, Vendor::Edge);
    }
}
