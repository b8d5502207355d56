//! Manifest parsing.
//!
//! Manifests are read as loosely-typed JSON because the schema drifts
//! between manifest versions: `author` may be a string or an object, and
//! MV3 turns `content_security_policy` into an object keyed by context.

use crate::error::ManifestError;
use crate::model::{ExtensionRecord, Vendor, UNKNOWN_NAME};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Reads the manifest at `manifest_path` into a record for `app_id`.
///
/// `install_path` is the selected version directory. Bytes that are not
/// valid UTF-8 are dropped before parsing.
pub fn read_manifest(
    manifest_path: &Path,
    app_id: &str,
    vendor: Vendor,
    vendor_label: &str,
    install_path: &Path,
) -> Result<ExtensionRecord, ManifestError> {
    let bytes = fs::read(manifest_path).map_err(|source| ManifestError::Io {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let text = decode_lossy(&bytes);

    let data: Value = serde_json::from_str(&text).map_err(|source| ManifestError::Json {
        path: manifest_path.to_path_buf(),
        source,
    })?;

    let fields = match data.as_object() {
        Some(map) => map,
        None => {
            return Err(ManifestError::NotAnObject {
                path: manifest_path.to_path_buf(),
            })
        }
    };

    let mut record = ExtensionRecord::new(app_id, vendor, install_path).with_label(vendor_label);
    record.name = string_field(fields, "name").unwrap_or_else(|| UNKNOWN_NAME.to_string());
    record.version = string_field(fields, "version").unwrap_or_else(|| "0.0.0".to_string());
    record.description = string_field(fields, "description").unwrap_or_default();
    record.author = author_field(fields);
    record.permissions = permissions_field(fields);
    record.content_security_policy = csp_field(fields);
    record.update_url = string_field(fields, "update_url").unwrap_or_default();
    record.manifest_content = data;

    Ok(record)
}

/// UTF-8 decode that drops undecodable sequences instead of failing.
pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    match String::from_utf8_lossy(bytes) {
        std::borrow::Cow::Borrowed(s) => s.to_string(),
        std::borrow::Cow::Owned(s) => s.replace(char::REPLACEMENT_CHARACTER, ""),
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(value_to_string)
}

/// Coerces a JSON value to text; `null` counts as absent.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn author_field(fields: &Map<String, Value>) -> String {
    match fields.get("author") {
        Some(Value::Object(author)) => author
            .get("email")
            .and_then(value_to_string)
            .unwrap_or_default(),
        Some(other) => value_to_string(other).unwrap_or_default(),
        None => String::new(),
    }
}

fn permissions_field(fields: &Map<String, Value>) -> Vec<String> {
    match fields.get("permissions") {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

// serde_json maps are key-sorted, so the object form serializes the same way every time.
fn csp_field(fields: &Map<String, Value>) -> String {
    match fields.get("content_security_policy") {
        Some(Value::Object(policy)) => serde_json::to_string(policy).unwrap_or_default(),
        Some(other) => value_to_string(other).unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn parse(json: &str) -> Result<ExtensionRecord, ManifestError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, json).unwrap();
        read_manifest(&path, "appid", Vendor::Chrome, "Chrome", dir.path())
    }

    #[test]
    fn test_full_manifest() {
        let record = parse(
            r#"{
                "name": "Test Extension",
                "version": "1.0.0",
                "manifest_version": 3,
                "description": "does things",
                "permissions": ["tabs", "storage"],
                "author": "dev@example.com",
                "update_url": "https://clients2.google.com/service/update2/crx"
            }"#,
        )
        .unwrap();

        assert_eq!(record.id, "appid");
        assert_eq!(record.name, "Test Extension");
        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.description, "does things");
        assert_eq!(record.author, "dev@example.com");
        assert_eq!(record.permissions, vec!["tabs", "storage"]);
        assert_eq!(
            record.update_url,
            "https://clients2.google.com/service/update2/crx"
        );
        assert_eq!(record.manifest_content["manifest_version"], 3);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let record = parse("{}").unwrap();

        assert_eq!(record.name, "Unknown");
        assert_eq!(record.version, "0.0.0");
        assert!(record.author.is_empty());
        assert!(record.permissions.is_empty());
        assert!(record.content_security_policy.is_empty());
        assert!(record.update_url.is_empty());
    }

    #[test]
    fn test_localized_name_passes_through() {
        let record = parse(r#"{"name": "__MSG_appName__"}"#).unwrap();
        assert_eq!(record.name, "__MSG_appName__");
    }

    #[test]
    fn test_author_object_uses_email() {
        let record = parse(r#"{"author": {"email": "dev@example.com"}}"#).unwrap();
        assert_eq!(record.author, "dev@example.com");

        let record = parse(r#"{"author": {"name": "No Email"}}"#).unwrap();
        assert_eq!(record.author, "");
    }

    #[test]
    fn test_csp_object_is_serialized() {
        let record = parse(
            r#"{"content_security_policy": {
                "extension_pages": "script-src 'self'; object-src 'self'",
                "sandbox": "sandbox allow-scripts"
            }}"#,
        )
        .unwrap();

        let csp = &record.content_security_policy;
        assert!(!csp.is_empty());
        assert!(csp.contains("extension_pages"));
        assert!(csp.contains("script-src 'self'; object-src 'self'"));
        assert!(csp.contains("sandbox allow-scripts"));

        let roundtrip: Value = serde_json::from_str(csp).unwrap();
        assert_eq!(roundtrip["sandbox"], "sandbox allow-scripts");
    }

    #[test]
    fn test_csp_string_kept() {
        let record = parse(r#"{"content_security_policy": "script-src 'self'"}"#).unwrap();
        assert_eq!(record.content_security_policy, "script-src 'self'");
    }

    #[test]
    fn test_non_string_permissions_are_coerced() {
        let record = parse(r#"{"permissions": ["tabs", {"fileSystem": ["write"]}]}"#).unwrap();
        assert_eq!(record.permissions.len(), 2);
        assert_eq!(record.permissions[0], "tabs");
        assert!(record.permissions[1].contains("fileSystem"));
    }

    #[test]
    fn test_install_path_and_label() {
        let record = parse(r#"{"name": "x"}"#).unwrap();
        assert_eq!(record.vendor, Vendor::Chrome);
        assert_eq!(record.vendor_label, "Chrome");
        assert_ne!(record.install_path, PathBuf::new());
    }

    #[test]
    fn test_invalid_utf8_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        let mut bytes = br#"{"name": "Bad"#.to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(br#"Bytes"}"#);
        fs::write(&path, bytes).unwrap();

        let record = read_manifest(&path, "id", Vendor::Edge, "Edge", dir.path()).unwrap();
        assert_eq!(record.name, "BadBytes");
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(parse("{ not json"), Err(ManifestError::Json { .. })));
        assert!(matches!(parse("[1, 2]"), Err(ManifestError::NotAnObject { .. })));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = read_manifest(
            &dir.path().join("manifest.json"),
            "id",
            Vendor::Chrome,
            "Chrome",
            dir.path(),
        );
        assert!(matches!(result, Err(ManifestError::Io { .. })));
    }
}
