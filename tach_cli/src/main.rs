mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "tach")]
#[command(
    about = "Runtime metrics instrumentation driven by declarative configuration",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file without touching any target
    Check {
        /// Path to configuration file (TOML, YAML, or JSON)
        config: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available statistics and notifier drivers
    List,

    /// Send a test measurement through a configured notifier
    Ping {
        /// Path to configuration file
        config: PathBuf,

        /// Notifier label (defaults to the default notifier)
        #[arg(short, long)]
        notifier: Option<String>,

        /// Label to report under
        #[arg(short, long, default_value = "tach.ping")]
        label: String,

        /// Value to report
        #[arg(long, default_value = "1")]
        value: String,

        /// Value kind: increment, exec_time, or any custom kind
        #[arg(short, long, default_value = "increment")]
        kind: String,

        /// Number of measurements to send
        #[arg(short, long, default_value_t = 1)]
        count: u32,

        /// Pause between measurements
        #[arg(short, long, default_value = "1s")]
        interval: String,
    },

    /// Instrument the bundled demo application and exercise it
    Demo {
        /// Path to configuration file
        config: PathBuf,

        /// Number of rounds of calls
        #[arg(short, long, default_value_t = 1)]
        iterations: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { config, json } => {
            commands::check::execute(config, json)?;
        }

        Commands::List => {
            commands::list::execute()?;
        }

        Commands::Ping {
            config,
            notifier,
            label,
            value,
            kind,
            count,
            interval,
        } => {
            commands::ping::execute(config, notifier, label, value, kind, count, interval)?;
        }

        Commands::Demo { config, iterations } => {
            commands::demo::execute(config, iterations)?;
        }
    }

    Ok(())
}
