//! Cross-platform path resolution.
//!
//! Vendor roots are stored as templates so they can be overridden from the
//! config file. Templates may contain `%VAR%`, `$VAR` or `${VAR}`
//! placeholders and a leading `~`. Placeholders naming unset variables are
//! kept verbatim, which leaves a path that simply does not exist.

use crate::model::{Platform, Vendor};
use std::path::PathBuf;

/// Returns the default extensions root template for a vendor.
///
/// Returns `None` for vendors with no Chromium-style extensions directory
/// on the given platform.
pub fn root_template(vendor: Vendor, platform: Platform) -> Option<&'static str> {
    let template = match (vendor, platform) {
        (Vendor::Chrome, Platform::Linux) => "~/.config/google-chrome/Default/Extensions",
        (Vendor::Chrome, Platform::MacOS) => {
            "~/Library/Application Support/Google/Chrome/Default/Extensions"
        }
        (Vendor::Chrome, Platform::Windows) => {
            r"%LOCALAPPDATA%\Google\Chrome\User Data\Default\Extensions"
        }

        (Vendor::Edge, Platform::Linux) => "~/.config/microsoft-edge/Default/Extensions",
        (Vendor::Edge, Platform::MacOS) => {
            "~/Library/Application Support/Microsoft Edge/Default/Extensions"
        }
        (Vendor::Edge, Platform::Windows) => {
            r"%LOCALAPPDATA%\Microsoft\Edge\User Data\Default\Extensions"
        }

        (Vendor::Brave, Platform::Linux) => {
            "~/.config/BraveSoftware/Brave-Browser/Default/Extensions"
        }
        (Vendor::Brave, Platform::MacOS) => {
            "~/Library/Application Support/BraveSoftware/Brave-Browser/Default/Extensions"
        }
        (Vendor::Brave, Platform::Windows) => {
            r"%LOCALAPPDATA%\BraveSoftware\Brave-Browser\User Data\Default\Extensions"
        }

        (Vendor::Chromium, Platform::Linux) => "~/.config/chromium/Default/Extensions",
        (Vendor::Chromium, Platform::MacOS) => {
            "~/Library/Application Support/Chromium/Default/Extensions"
        }
        (Vendor::Chromium, Platform::Windows) => {
            r"%LOCALAPPDATA%\Chromium\User Data\Default\Extensions"
        }

        (Vendor::Vivaldi, Platform::Linux) => "~/.config/vivaldi/Default/Extensions",
        (Vendor::Vivaldi, Platform::MacOS) => {
            "~/Library/Application Support/Vivaldi/Default/Extensions"
        }
        (Vendor::Vivaldi, Platform::Windows) => {
            r"%LOCALAPPDATA%\Vivaldi\User Data\Default\Extensions"
        }

        (Vendor::Opera, Platform::Linux) => "~/.config/opera/Extensions",
        (Vendor::Opera, Platform::MacOS) => {
            "~/Library/Application Support/com.operasoftware.Opera/Extensions"
        }
        (Vendor::Opera, Platform::Windows) => r"%APPDATA%\Opera Software\Opera Stable\Extensions",

        (Vendor::Firefox, _) => return None,
    };
    Some(template)
}

/// Fixed root used when the scanner runs inside a container with the
/// browser's extensions directory mounted as a volume.
pub fn container_root(vendor: Vendor) -> Option<&'static str> {
    match vendor {
        Vendor::Chrome => Some("/data/extensions"),
        Vendor::Edge => Some("/data/edge_extensions"),
        Vendor::Brave => Some("/data/brave_extensions"),
        Vendor::Chromium => Some("/data/chromium_extensions"),
        Vendor::Vivaldi => Some("/data/vivaldi_extensions"),
        Vendor::Opera => Some("/data/opera_extensions"),
        Vendor::Firefox => None,
    }
}

/// Expands placeholders from the process environment and a leading `~`.
pub fn expand_path(template: &str) -> PathBuf {
    let expanded = expand_with(template, |name| std::env::var(name).ok());
    expand_home(&expanded)
}

/// Expands `%VAR%`, `${VAR}` and `$VAR` using `lookup`.
pub fn expand_with<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(|c| c == '%' || c == '$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match expand_placeholder(tail, &lookup) {
            Some((value, consumed)) => {
                out.push_str(&value);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Expands the placeholder at the start of `tail`, returning the
/// replacement and the number of bytes consumed.
fn expand_placeholder<F>(tail: &str, lookup: &F) -> Option<(String, usize)>
where
    F: Fn(&str) -> Option<String>,
{
    let (name, consumed) = if let Some(body) = tail.strip_prefix('%') {
        let end = body.find('%')?;
        (&body[..end], end + 2)
    } else if let Some(body) = tail.strip_prefix("${") {
        let end = body.find('}')?;
        (&body[..end], end + 3)
    } else {
        let body = &tail[1..];
        let end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(body.len());
        (&body[..end], end + 1)
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let value = lookup(name).unwrap_or_else(|| tail[..consumed].to_string());
    Some((value, consumed))
}

fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

/// Returns the cache directory for bera.
///
/// Falls back to `/tmp/bera/` if no cache directory can be determined.
pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("bera")
}
