//! Static extraction of network indicators from an extension's files.
//!
//! Every non-media file under the install path is read as text and searched
//! for `http(s)://` URLs and IPv4 literals. Results are sets, so the same
//! indicator seen in several files is reported once.

use crate::discovery::decode_lossy;
use crate::model::ExtensionRecord;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use walkdir::WalkDir;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(?:[-\w.]|%[0-9a-fA-F]{2})+[^\s'"<>]*"#).expect("valid URL pattern")
});

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid IPv4 pattern"));

/// Images, fonts and audio/video: never read.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "bmp", "webp", "woff", "woff2", "ttf", "otf", "eot",
    "mp3", "mp4", "wav", "ogg", "webm",
];

/// Loopback and unspecified addresses are never reported.
pub const IGNORED_IPS: &[&str] = &["127.0.0.1", "0.0.0.0", "::1"];

/// Characters stripped from the end of a URL match.
const URL_TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ')', '\'', '"'];

/// URLs and IPs found under one directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indicators {
    pub urls: BTreeSet<String>,
    pub ips: BTreeSet<String>,
}

impl Indicators {
    /// Adds every indicator found in `text`.
    pub fn collect_from(&mut self, text: &str) {
        for m in URL_RE.find_iter(text) {
            let url = m.as_str().trim_end_matches(URL_TRAILING_PUNCTUATION);
            self.urls.insert(url.to_string());
        }

        for m in IPV4_RE.find_iter(text) {
            let ip = m.as_str();
            if !IGNORED_IPS.contains(&ip) {
                self.ips.insert(ip.to_string());
            }
        }
    }
}

/// Walks an install path and extracts indicators.
#[derive(Debug, Clone)]
pub struct ContentScanner {
    ignored_extensions: Vec<String>,
    max_file_bytes: Option<u64>,
}

impl ContentScanner {
    /// Scanner with the built-in media ignore list and no size cap.
    pub fn new() -> Self {
        Self {
            ignored_extensions: IGNORED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_file_bytes: None,
        }
    }

    /// Adds extensions (with or without the leading dot) to the ignore list.
    pub fn with_extra_ignored<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.').to_lowercase();
            if !ext.is_empty() && !self.ignored_extensions.contains(&ext) {
                self.ignored_extensions.push(ext);
            }
        }
        self
    }

    /// Skips files larger than `max` bytes. `None` reads every file.
    pub fn with_max_file_bytes(mut self, max: Option<u64>) -> Self {
        self.max_file_bytes = max;
        self
    }

    /// Replaces the record's indicator sets with what its install path holds.
    ///
    /// A missing or unreadable install path leaves both sets empty.
    pub fn scan(&self, record: &mut ExtensionRecord) {
        let found = self.scan_dir(&record.install_path);
        debug!(
            app_id = %record.id,
            urls = found.urls.len(),
            ips = found.ips.len(),
            "scanned extension files"
        );
        record.extracted_urls = found.urls;
        record.extracted_ips = found.ips;
    }

    pub fn scan_dir(&self, root: &Path) -> Indicators {
        let mut found = Indicators::default();
        if !root.is_dir() {
            return found;
        }

        // Directory links are not followed; file links are read through.
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if !is_file || self.is_ignored(entry.path()) {
                continue;
            }

            if let Some(max) = self.max_file_bytes {
                if let Ok(meta) = fs::metadata(entry.path()) {
                    if meta.len() > max {
                        debug!(path = ?entry.path(), size = meta.len(), "skipping oversized file");
                        continue;
                    }
                }
            }

            match fs::read(entry.path()) {
                Ok(bytes) => found.collect_from(&decode_lossy(&bytes)),
                Err(e) => debug!(path = ?entry.path(), error = %e, "unreadable file"),
            }
        }

        found
    }

    fn is_ignored(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .map(|ext| self.ignored_extensions.contains(&ext))
            .unwrap_or(false)
    }
}

impl Default for ContentScanner {
    fn default() -> Self {
        Self::new()
    }
}
