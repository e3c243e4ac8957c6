// Copyright 2026 Seatwatch Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(
    name = "seatwatch",
    about = "Seatwatch — seat vacancy acquisition on the upstream publish cadence",
    version,
    after_help = "Run 'seatwatch <command> --help' for details on each command.\nRun 'seatwatch' with no command to warm and schedule the default stores."
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "seatwatch=debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the upstream site root (also sets the API endpoint)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Path to a Chromium/Chrome binary
    #[arg(long, global = true)]
    chromium_path: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    headed: bool,

    /// Disable the browser fallback; only the direct channel is used
    #[arg(long, global = true)]
    no_browser: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Warm the cache, then refresh tracked stores on every cadence trigger
    Run {
        /// Store to keep warm (repeatable; replaces the configured defaults)
        #[arg(long = "store", value_parser = cli::validate_store_id)]
        stores: Vec<String>,
    },
    /// Acquire one store now and print the record as JSON
    Fetch {
        /// Five-digit store id
        #[arg(value_parser = cli::validate_store_id)]
        store: String,
    },
    /// Normalize a saved payload (JSON feed or rendered HTML) offline
    Parse {
        /// File holding the payload
        file: PathBuf,
        /// Store id to attribute the record to
        #[arg(long, value_parser = cli::validate_store_id, default_value = "00000")]
        store: String,
    },
    /// Print the next aligned refresh triggers
    NextTrigger {
        /// How many triggers to print
        #[arg(long, default_value = "3")]
        count: usize,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "seatwatch", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(&cli.log_level, cli.log_format);

    let overrides = cli::Overrides {
        base_url: cli.base_url,
        chromium_path: cli.chromium_path,
        headed: cli.headed,
        no_browser: cli.no_browser,
    };

    let result = match cli.command {
        None => cli::run_cmd::run(&overrides, Vec::new()).await,
        Some(Commands::Run { stores }) => cli::run_cmd::run(&overrides, stores).await,
        Some(Commands::Fetch { store }) => cli::fetch_cmd::run(&overrides, &store).await,
        Some(Commands::Parse { file, store }) => cli::parse_cmd::run(&overrides, &file, &store),
        Some(Commands::NextTrigger { count }) => cli::trigger_cmd::run(&overrides, count),
        Some(Commands::Completions { .. }) => Ok(()),
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["seatwatch"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_store_ids_are_validated() {
        assert!(Cli::try_parse_from(["seatwatch", "fetch", "10001"]).is_ok());
        assert!(Cli::try_parse_from(["seatwatch", "fetch", "1001"]).is_err());
        assert!(Cli::try_parse_from(["seatwatch", "run", "--store", "1000a"]).is_err());

        let cli =
            Cli::try_parse_from(["seatwatch", "run", "--store", "10001", "--store", "10002"]).unwrap();
        match cli.command {
            Some(Commands::Run { stores }) => assert_eq!(stores, vec!["10001", "10002"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "seatwatch",
            "next-trigger",
            "--count",
            "5",
            "--log-format",
            "json",
            "--no-browser",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.no_browser);
        assert!(matches!(cli.command, Some(Commands::NextTrigger { count: 5 })));
    }
}
