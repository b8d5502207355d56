use anyhow::Result;
use bera::{
    cache::Cache,
    config::{AssessorKind, Config},
    discovery::VendorDiscoverer,
    model::{RiskReport, RiskScore, Vendor},
    output::{print_report, write_report, OutputFormat},
    pipeline::Pipeline,
};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const RISK_THRESHOLD: u8 = 2;
}

#[derive(Parser)]
#[command(name = "bera")]
#[command(
    author,
    version,
    about = "Find installed browser extensions and assess their risk"
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, scan and assess installed extensions
    Scan {
        /// Vendor to scan; repeat for several (chrome, edge, brave, chromium, vivaldi, opera)
        #[arg(long = "vendor")]
        vendors: Vec<String>,

        /// Write the report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Skip store metadata lookups
        #[arg(long)]
        no_enrich: bool,

        /// Risk assessor (llm, heuristic, none)
        #[arg(long)]
        assessor: Option<String>,

        /// Process extensions concurrently
        #[arg(long)]
        parallel: bool,

        /// Exit with code 2 if any extension is at or above this risk
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,
    },

    /// List supported vendors and where their extensions live
    ListVendors,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear the store listing cache
    ClearCache,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
}

impl FailLevel {
    fn threshold(self) -> RiskScore {
        match self {
            FailLevel::Critical => RiskScore::Critical,
            FailLevel::High => RiskScore::High,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "bera=debug,warn"
    } else {
        "bera=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan {
            vendors,
            output,
            format,
            no_enrich,
            assessor,
            parallel,
            fail_on,
        } => {
            let mut config = config;
            if !vendors.is_empty() {
                config.vendors = vendors
                    .iter()
                    .map(|v| Vendor::from_str(v))
                    .collect::<Result<_, _>>()
                    .map_err(|e| anyhow::anyhow!(e))?;
            }
            if output.is_some() {
                config.output_path = output;
            }
            if no_enrich {
                config.enrich = false;
            }
            if let Some(assessor) = assessor {
                config.assessor = AssessorKind::from_str(&assessor).map_err(|e| anyhow::anyhow!(e))?;
            }
            config.parallel |= parallel;

            let format = OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;
            run_scan(&config, format, fail_on).await
        }
        Commands::ListVendors => {
            list_vendors(&config);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(cli.config.as_deref(), init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache => {
            let cache = Cache::new(config.cache_ttl_hours);
            let removed = cache.clear()?;
            println!("Cache cleared: {} ({} entries).", cache.dir().display(), removed);
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_scan(config: &Config, format: OutputFormat, fail_on: Option<FailLevel>) -> Result<u8> {
    debug!(vendors = ?config.vendors, assessor = ?config.assessor, "starting scan");

    let mut pipeline = Pipeline::from_config(config);

    let progress = if format == OutputFormat::Table {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Assessing extensions...")?
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pipeline = pipeline.with_progress(pb.clone());
        Some(pb)
    } else {
        None
    };

    let report = pipeline.run().await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let path = write_report(&report, config.output_path.as_deref())?;
    print_report(&report, format)?;
    if format == OutputFormat::Table {
        println!();
        println!("Report written to: {}", path.display());
    }

    Ok(determine_exit_code(&report, fail_on))
}

/// Exit code based on the highest risk found and --fail-on.
fn determine_exit_code(report: &RiskReport, fail_on: Option<FailLevel>) -> u8 {
    let threshold = match fail_on {
        Some(level) => level.threshold(),
        None => return exit_codes::SUCCESS,
    };

    if report.extensions.iter().any(|r| r.risk_score >= threshold) {
        exit_codes::RISK_THRESHOLD
    } else {
        exit_codes::SUCCESS
    }
}

fn list_vendors(config: &Config) {
    println!("Available vendors:");
    println!();

    let mut all = config.clone();
    all.vendors = Vendor::ALL.to_vec();
    let profiles = all.vendor_profiles();

    for vendor in Vendor::ALL {
        let enabled = if config.vendors.contains(&vendor) { "*" } else { " " };
        match profiles.iter().find(|p| p.vendor == vendor) {
            Some(profile) => {
                let discoverer = VendorDiscoverer::new(profile);
                let exists = if discoverer.root().is_dir() { "yes" } else { "no" };
                println!(
                    "{} {:<10} {:<28} [exists: {}]",
                    enabled,
                    vendor.as_str(),
                    discoverer.label(),
                    exists
                );
                println!("  {:<10} Location: {}", "", discoverer.root().display());
            }
            None => {
                println!(
                    "{} {:<10} {:<28} [not supported]",
                    enabled,
                    vendor.as_str(),
                    vendor.display_name()
                );
            }
        }
        println!();
    }

    println!("* enabled in configuration");
}

/// `config_file` is the `--config` path when given, else the default location.
fn handle_config(config_file: Option<&Path>, init: bool, show_path: bool) -> Result<()> {
    let config_path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        Config::default().save_to(&config_path)?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'bera config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_init_writes_named_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");

        handle_config(Some(&path), true, false).unwrap();

        assert!(path.is_file());
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.vendors, Config::default().vendors);
    }

    #[test]
    fn test_config_init_keeps_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "vendors = [\"opera\"]\n").unwrap();

        handle_config(Some(&path), true, false).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.vendors, vec![Vendor::Opera]);
    }

    #[test]
    fn test_fail_on_threshold() {
        let mut record = bera::ExtensionRecord::new("a", Vendor::Chrome, "/x");
        record.risk_score = RiskScore::High;
        let report = RiskReport::new(vec![record]);

        assert_eq!(determine_exit_code(&report, None), exit_codes::SUCCESS);
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::High)),
            exit_codes::RISK_THRESHOLD
        );
        assert_eq!(
            determine_exit_code(&report, Some(FailLevel::Critical)),
            exit_codes::SUCCESS
        );
    }
}
