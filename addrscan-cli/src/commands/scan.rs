//! Scan command - inventory every deposit address on one exchange

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use addrscan_core::config::{load_credentials, Config};
use addrscan_core::services::{ExportFormat, ScanProgress};
use addrscan_core::{Exchange, ScanContext, ScanOutcome};

use crate::output::{self, cell, create_table, flag};

/// Some assets failed; the export holds everything else
pub const EXIT_PARTIAL: u8 = 1;
/// Configuration or catalog error; nothing was exported
pub const EXIT_FATAL: u8 = 2;

const CREDENTIALS_FILE: &str = "credentials.env";

pub struct ScanArgs {
    pub exchange: String,
    pub credentials: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<ExportFormat>,
    pub include_disabled: bool,
    pub workers: Option<usize>,
    pub base_url: Option<String>,
    pub json: bool,
}

pub fn run(dir: &Path, args: ScanArgs) -> Result<ExitCode> {
    let exchange: Exchange = args.exchange.parse()?;

    let mut config = Config::load(dir)?;
    if let Some(url) = args.base_url {
        config.base_url = Some(url);
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.include_disabled {
        config.include_disabled = true;
    }

    let credentials_path = args
        .credentials
        .unwrap_or_else(|| dir.join(CREDENTIALS_FILE));
    let credential = load_credentials(&credentials_path, exchange.as_str())?;

    let ctx = ScanContext::new(exchange, credential, config)
        .context("Failed to set up scan")?;
    let opts = ctx.scan_options();

    let show_progress = !args.json && atty::is(atty::Stream::Stderr);
    let outcome = if show_progress {
        scan_with_bar(&ctx, &opts)?
    } else {
        ctx.scan_service.scan(&opts)?
    };

    if let Some(path) = &args.output {
        let format = args
            .format
            .or_else(|| ExportFormat::from_path(path))
            .unwrap_or(ExportFormat::Csv);
        ctx.export_service.write(path, format, &outcome.records)?;
    }

    let summary = outcome.summary();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_outcome(exchange, &outcome, args.output.as_deref());
    }

    if summary.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL))
    }
}

fn scan_with_bar(ctx: &ScanContext, opts: &addrscan_core::services::ScanOptions) -> Result<ScanOutcome> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    bar.set_message("loading catalog");

    let result = ctx.scan_service.scan_with_progress(opts, &|event: ScanProgress| match event {
        ScanProgress::CatalogLoaded { assets, .. } => {
            bar.set_length(assets as u64);
            bar.set_message("");
        }
        ScanProgress::AssetFinished { asset, completed, .. } => {
            bar.set_position(completed as u64);
            bar.set_message(asset);
        }
    });

    bar.finish_and_clear();
    Ok(result?)
}

fn print_outcome(exchange: Exchange, outcome: &ScanOutcome, written_to: Option<&Path>) {
    println!("{} {}", "Deposit Addresses:".bold(), exchange);
    println!();

    if written_to.is_none() && !outcome.records.is_empty() {
        let mut table = create_table();
        table.set_header(vec!["Asset", "Network", "Address", "Tag", "Deposit", "Withdraw", "Confirmations"]);
        for r in &outcome.records {
            table.add_row(vec![
                r.asset.clone(),
                r.network.clone(),
                r.address.clone(),
                cell(r.tag.as_deref()),
                flag(r.deposit_enabled),
                flag(r.withdraw_enabled),
                cell(r.confirmations_required),
            ]);
        }
        println!("{}", table);
        println!();
    }

    println!("  Assets: {}", outcome.assets_total);
    if outcome.unscanned > 0 {
        println!("  Not scanned: {}", outcome.unscanned);
    }
    println!("  Records: {}", outcome.records.len());
    if outcome.unmatched > 0 {
        println!("  Without catalog entry: {}", outcome.unmatched);
    }
    if let Some(path) = written_to {
        println!("  Written to: {}", path.display());
    }
    println!();

    if outcome.cancelled {
        output::warning(&format!(
            "Scan was cancelled; {} asset(s) were not looked up.",
            outcome.unscanned
        ));
    }

    if outcome.failures.is_empty() {
        if !outcome.cancelled {
            output::success("All assets scanned.");
        }
    } else {
        println!("{}", "Failed Assets".bold());
        for failure in &outcome.failures {
            println!("  {} {} - {}", "Error:".red(), failure.asset, failure.reason);
        }
    }
}
