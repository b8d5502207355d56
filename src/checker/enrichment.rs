//! Store metadata enrichment.
//!
//! Chromium-family extensions are looked up on the Chrome Web Store, which
//! has no public API, so the detail page is scraped for its title and
//! contact address. Firefox add-ons come from the addons.mozilla.org v5
//! API. Listings are cached per vendor and id.

use super::Enricher;
use crate::cache::Cache;
use crate::model::{ExtensionRecord, Vendor, UNKNOWN_NAME};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("valid h1 pattern"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

static MAILTO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mailto:([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})")
        .expect("valid mailto pattern")
});

/// Where a listing came from; decides how much of the record it may
/// overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrigin {
    /// Scraped HTML; only fills a missing name.
    StorePage,
    /// Structured API data; authoritative for name and description.
    AddonsApi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreListing {
    pub origin: ListingOrigin,
    pub name: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub developer_email: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreListing {
    fn empty(origin: ListingOrigin) -> Self {
        Self {
            origin,
            name: None,
            description: None,
            authors: Vec::new(),
            developer_email: None,
            last_updated: None,
        }
    }

    /// Merges the listing into `record`.
    ///
    /// # Arguments
    ///
    /// * `record` - updated in place; fields the listing lacks are kept
    /// * `now` - reference time for `age_days`
    pub fn apply(&self, record: &mut ExtensionRecord, now: DateTime<Utc>) {
        match self.origin {
            ListingOrigin::StorePage => {
                if record.name == UNKNOWN_NAME {
                    if let Some(name) = &self.name {
                        record.name = name.clone();
                    }
                }
            }
            ListingOrigin::AddonsApi => {
                if let Some(name) = &self.name {
                    record.name = name.clone();
                }
                if let Some(description) = &self.description {
                    record.description = description.clone();
                }
            }
        }

        if !self.authors.is_empty() {
            record.author = self.authors.join(", ");
        }
        if let Some(email) = &self.developer_email {
            record.developer_email = Some(email.clone());
        }
        if let Some(updated) = self.last_updated {
            record.age_days = Some((now - updated).num_days());
        }
    }
}

/// Extracts the title and first contact address from a store detail page.
pub fn parse_store_page(html: &str) -> StoreListing {
    let mut listing = StoreListing::empty(ListingOrigin::StorePage);

    listing.name = H1_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| unescape_html(TAG_RE.replace_all(m.as_str(), "").trim()))
        .filter(|title| !title.is_empty());

    listing.developer_email = MAILTO_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    listing
}

/// Reads an addons.mozilla.org v5 addon document.
pub fn parse_amo_addon(data: &Value) -> StoreListing {
    let mut listing = StoreListing::empty(ListingOrigin::AddonsApi);

    listing.name = localized(&data["name"]);
    listing.description = localized(&data["summary"]);
    listing.authors = data["authors"]
        .as_array()
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| a["name"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    listing.last_updated = data["last_updated"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    listing
}

/// AMO returns translated fields as `{"en-US": ...}` unless a `lang` is
/// requested, in which case they are plain strings.
fn localized(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("en-US").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// [`Enricher`] backed by the Chrome Web Store and addons.mozilla.org.
///
/// # Example
///
/// ```no_run
/// use bera::checker::StoreEnricher;
/// use bera::{Cache, Enricher, ExtensionRecord, Vendor};
/// use std::time::Duration;
///
/// # async fn demo() {
/// let enricher = StoreEnricher::new(Duration::from_secs(5)).with_cache(Cache::default());
/// let mut record = ExtensionRecord::new(
///     "cjpalhdlnbpafiamejdnhcphjbkeiagm",
///     Vendor::Chrome,
///     "/ext/cjpalhdlnbpafiamejdnhcphjbkeiagm/1.0.0",
/// );
/// enricher.enrich(&mut record).await;
/// println!("{:?}", record.developer_email);
/// # }
/// ```
pub struct StoreEnricher {
    client: reqwest::Client,
    cache: Option<Cache>,
}

impl StoreEnricher {
    /// Client with a per-request `timeout` and a desktop browser User-Agent,
    /// which the store requires to serve the full detail page.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            client,
            cache: None,
        }
    }

    /// Listings are looked up in `cache` before any request and stored
    /// there after a successful one.
    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Stores `listing` under `key`. Returns whether it was written; a
    /// failed write is logged and otherwise ignored.
    fn remember(&self, key: &str, listing: &StoreListing) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.set(key, listing) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, dir = ?cache.dir(), error = %e, "failed to cache listing");
                false
            }
        }
    }

    async fn fetch_listing(&self, vendor: Vendor, id: &str) -> Result<Option<StoreListing>> {
        if vendor.is_chromium_family() {
            self.fetch_store_page(id).await
        } else {
            self.fetch_amo_addon(id).await
        }
    }

    async fn fetch_store_page(&self, id: &str) -> Result<Option<StoreListing>> {
        let url = format!("https://chromewebstore.google.com/detail/{}", id);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            debug!(app_id = %id, status = %response.status(), "store page unavailable");
            return Ok(None);
        }

        let html = response.text().await?;
        Ok(Some(parse_store_page(&html)))
    }

    async fn fetch_amo_addon(&self, id: &str) -> Result<Option<StoreListing>> {
        let url = format!("https://addons.mozilla.org/api/v5/addons/addon/{}/", id);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(app_id = %id, status = %response.status(), "addon listing unavailable");
            return Ok(None);
        }

        let data: Value = response.json().await?;
        Ok(Some(parse_amo_addon(&data)))
    }
}

#[async_trait]
impl Enricher for StoreEnricher {
    fn name(&self) -> &'static str {
        "Extension stores"
    }

    async fn enrich(&self, record: &mut ExtensionRecord) {
        let key = format!("listing_{}_{}", record.vendor.as_str(), record.id);

        let cached = self.cache.as_ref().and_then(|c| c.get::<StoreListing>(&key));
        let listing = match cached {
            Some(listing) => Some(listing),
            None => match self.fetch_listing(record.vendor, &record.id).await {
                Ok(Some(listing)) => {
                    self.remember(&key, &listing);
                    Some(listing)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(app_id = %record.id, error = %e, "enrichment failed");
                    None
                }
            },
        };

        if let Some(listing) = listing {
            listing.apply(record, Utc::now());
        }
    }
}
