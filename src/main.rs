//! InfoWatchdog binary: one collection cycle per invocation, or a connection
//! check / statistics dump.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use info_watchdog::config::LoggingConfig;
use info_watchdog::{telemetry, AppConfig, RunReport, Secrets, Watchdog};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "infowatchdog")]
#[command(about = "Collect environmental news from Reddit and RSS into Airtable")]
#[command(version)]
struct Args {
    /// Config file; falls back to $INFOWATCHDOG_CONFIG, then config/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only check connectivity of collectors and storage
    #[arg(long, conflicts_with = "stats")]
    test_only: bool,

    /// Print collector and storage statistics
    #[arg(long)]
    stats: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => tracing::error!(target: "watchdog", error = ?e, "failed to serialize output"),
    }
}

fn print_report(report: &RunReport) {
    println!("Collection cycle finished in {:.2}s", report.duration_secs);
    println!("  articles collected: {}", report.articles_collected);
    match &report.store_outcome {
        Some(o) => println!(
            "  stored: {} inserted, {} duplicates, {} failed",
            o.inserted, o.duplicates, o.failed
        ),
        None => println!("  stored: no storage available"),
    }
    println!(
        "  storage: {}",
        if report.storage_success { "ok" } else { "FAILED" }
    );
}

async fn run(args: Args, cfg: AppConfig) -> ExitCode {
    let mut watchdog = Watchdog::from_config(&cfg, &Secrets::from_env());

    if args.test_only {
        let results = watchdog.test_connections().await;
        if args.json {
            print_json(&results);
        } else {
            for (name, ok) in &results {
                println!("{name}: {}", if *ok { "ok" } else { "FAILED" });
            }
        }
        return if results.values().all(|ok| *ok) {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    if args.stats {
        let stats = watchdog.stats().await;
        print_json(&stats);
        return ExitCode::SUCCESS;
    }

    let report = watchdog.run_cycle().await;
    if args.json {
        print_json(&report);
    } else {
        print_report(&report);
    }
    if report.storage_success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let cfg = match AppConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = telemetry::init(&LoggingConfig::default());
            tracing::error!(target: "watchdog", error = ?e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = telemetry::init(&cfg.logging) {
        eprintln!("logging setup failed: {e:#}");
        let _ = telemetry::init(&LoggingConfig::default());
    }

    tokio::select! {
        code = run(args, cfg) => code,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(target: "watchdog", "interrupted");
            println!("Interrupted by user");
            ExitCode::FAILURE
        }
    }
}
