// Entry point and high-level CLI flow.
//
// One run loads the dataset once, resolves the control parameters into a
// session, builds every view from engine queries and prints the dashboard
// (text or JSON). `--export-dir` additionally writes the tables as CSV and
// a summary as JSON.
mod cli;
mod config;
mod engine;
mod error;
mod loader;
mod output;
mod session;
mod trend;
mod types;
mod util;
mod views;

use anyhow::{anyhow, Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use session::{Controls, Session};
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Dashboard failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: write a default .dashboard.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        return Err(anyhow!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        ));
    }
    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// `RUST_LOG` directives win; otherwise the level from --verbose/--quiet.
fn log_filter(level: tracing::Level, rust_log: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(rust_log.unwrap_or(""))
}

/// Logs go to stderr so stdout carries only the dashboard.
fn init_logging(args: &Args) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(args.log_level(), rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::resolve(args.config.as_deref())?;
    config.merge_with_args(&args);
    config.validate()?;

    let (dataset, report) = loader::load_dataset(&config.load_options()?)
        .context("Could not load the consultation dataset; check that the CSV file is in the working directory")?;
    if report.inconsistent_rows > 0 {
        warn!(
            "{} rows have a total that differs from the sum of their services",
            util::format_int(report.inconsistent_rows)
        );
    }

    let controls = Controls::from_config(&config)?;
    let session = Session::resolve(dataset, controls);
    let trends = config.trend_source();

    let dashboard = views::build_dashboard(
        &session,
        &config.display,
        &config.data.total_column,
        &trends,
    )?;

    match args.format {
        OutputFormat::Text => {
            print!(
                "{}",
                views::render_text(&dashboard, args.view, config.display.bar_width)
            );
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
    }

    if let Some(ref dir) = args.export_dir {
        let summary = views::summary_stats(&session, &report, &trends)?;
        let written = output::export_all(dir, &dashboard, &summary, &config.data.name_column)
            .map_err(|e| anyhow!("Export to {} failed: {}", dir.display(), e))?;
        info!(
            "Exported {} files to {}",
            written.len(),
            dir.display()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_defaults_to_cli_level() {
        let filter = log_filter(tracing::Level::DEBUG, None);
        assert_eq!(filter.to_string().to_lowercase(), "debug");
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        let filter = log_filter(tracing::Level::INFO, Some("consult_dashboard=trace"));
        assert!(filter
            .to_string()
            .to_lowercase()
            .contains("consult_dashboard=trace"));
    }
}
