use crate::error::ReportError;
use crate::model::RiskReport;
use anyhow::Result;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn print_json(report: &RiskReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

/// `bera_report_<run_id>.json`, relative to the working directory.
pub fn default_report_path(run_id: &str) -> PathBuf {
    PathBuf::from(format!("bera_report_{}.json", run_id))
}

/// Writes `report` as pretty JSON to `path`, or to the default location
/// when `None`. Returns the path written.
///
/// An explicit path is overwritten. The default path is only ever created
/// fresh, so a previous run's report is never replaced.
///
/// # Errors
///
/// Returns [`ReportError::Create`] if the file cannot be opened (including
/// when the default path already exists), [`ReportError::Serialize`] or
/// [`ReportError::Write`] if writing fails.
pub fn write_report(report: &RiskReport, path: Option<&Path>) -> Result<PathBuf, ReportError> {
    match path {
        Some(path) => write_to(report, path.to_path_buf(), false),
        None => write_to(report, default_report_path(&report.run_id), true),
    }
}

fn write_to(report: &RiskReport, path: PathBuf, create_new: bool) -> Result<PathBuf, ReportError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    let file = options.open(&path).map_err(|source| ReportError::Create {
        path: path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), extensions = report.total, "report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExtensionRecord, RiskScore, Vendor};
    use tempfile::TempDir;

    fn sample_report() -> RiskReport {
        let mut record = ExtensionRecord::new("abcdefg", Vendor::Chrome, "/ext/abcdefg/1.0.0");
        record.risk_score = RiskScore::High;
        record.extracted_urls.insert("https://x.example.com".to_string());
        RiskReport::with_run_id("deadbeef", vec![record])
    }

    #[test]
    fn test_default_report_path() {
        assert_eq!(
            default_report_path("deadbeef"),
            PathBuf::from("bera_report_deadbeef.json")
        );
    }

    #[test]
    fn test_write_report_to_explicit_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");

        let written = write_report(&sample_report(), Some(&path)).unwrap();
        assert_eq!(written, path);

        let data: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data["run_id"], "deadbeef");
        assert_eq!(data["total"], 1);
        assert_eq!(data["high_risk_count"], 1);
        assert_eq!(data["extensions"][0]["risk_score"], "High");
        assert_eq!(data["extensions"][0]["extracted_urls"][0], "https://x.example.com");
    }

    #[test]
    fn test_write_report_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        let report = sample_report();

        write_report(&report, Some(&path)).unwrap();
        let parsed: RiskReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.extensions, report.extensions);
    }

    #[test]
    fn test_explicit_path_is_overwritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        std::fs::write(&path, "x".repeat(10_000)).unwrap();

        write_report(&sample_report(), Some(&path)).unwrap();
        let parsed: RiskReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.run_id, "deadbeef");
    }

    #[test]
    fn test_fresh_write_never_replaces_existing_report() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(default_report_path("deadbeef"));
        std::fs::write(&path, "previous run").unwrap();

        let err = write_to(&sample_report(), path.clone(), true).unwrap_err();
        match err {
            ReportError::Create { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run");
    }

    #[test]
    fn test_write_report_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("out.json");

        let err = write_report(&sample_report(), Some(&path)).unwrap_err();
        assert!(matches!(err, ReportError::Create { .. }));
    }
}
