//! Addrscan CLI - deposit address inventory for centralized exchanges

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{exchanges, scan};

#[derive(Parser)]
#[command(name = "addrscan", version, about, long_about = None)]
struct Cli {
    /// Debug logging on stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding settings.json and credentials
    #[arg(long, global = true, env = "ADDRSCAN_DIR")]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an exchange and list every deposit address
    Scan {
        /// Exchange to scan (bybit, okx, bithumb, upbit, binance)
        exchange: String,

        /// Credentials file (defaults to <dir>/credentials.env)
        #[arg(short, long)]
        credentials: Option<PathBuf>,

        /// Write records to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export format (defaults to the output file extension, then CSV)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Keep addresses on networks with deposits disabled
        #[arg(long)]
        include_disabled: bool,

        /// Concurrent asset lookups (1-8)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Override the exchange API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported exchanges
    Exchanges {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    // Matches both the `addrscan` binary and `addrscan_core` targets
    let default = if verbose { "addrscan=debug" } else { "addrscan=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::from(scan::EXIT_FATAL)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let dir = cli.dir.unwrap_or_else(commands::default_dir);

    match cli.command {
        Commands::Scan { exchange, credentials, output, format, include_disabled, workers, base_url, json } => {
            let args = scan::ScanArgs {
                exchange,
                credentials,
                output,
                format: format.map(|f| match f {
                    FormatArg::Csv => addrscan_core::services::ExportFormat::Csv,
                    FormatArg::Json => addrscan_core::services::ExportFormat::Json,
                }),
                include_disabled,
                workers,
                base_url,
                json,
            };
            scan::run(&dir, args)
        }
        Commands::Exchanges { json } => {
            exchanges::run(json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
