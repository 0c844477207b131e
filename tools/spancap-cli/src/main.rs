//! SpanCap CLI — inspect the display layout and record screen regions.
//!
//! Usage:
//!   spancap check                               Check system capabilities
//!   spancap displays                            Show the resolved display layout
//!   spancap plan --display N --rect x,y,w,h     Print the encoder command line
//!   spancap record --display N --rect x,y,w,h   Record until Ctrl+C

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use spancap_capture_engine::SelectionRect;

mod commands;

#[derive(Parser)]
#[command(
    name = "spancap",
    about = "Region screen recording across every connected display",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check system capabilities
    Check,

    /// Show the resolved display layout and virtual desktop bounds
    Displays,

    /// Print the crop and encoder command for a selection without recording
    Plan {
        /// Zero-based display index the selection is drawn on
        #[arg(short, long, default_value = "0")]
        display: usize,

        /// Selection in logical pixels of that display: x,y,width,height
        #[arg(short, long, value_parser = commands::parse_rect)]
        rect: SelectionRect,
    },

    /// Record a region until Ctrl+C or the duration elapses
    Record {
        /// Zero-based display index the selection is drawn on
        #[arg(short, long, default_value = "0")]
        display: usize,

        /// Selection in logical pixels of that display: x,y,width,height
        #[arg(short, long, value_parser = commands::parse_rect)]
        rect: SelectionRect,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = commands::load_config(cli.config.as_deref())?;

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    spancap_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Check => commands::check::run(&config),
        Commands::Displays => commands::displays::run(&config),
        Commands::Plan { display, rect } => commands::plan::run(&config, display, rect),
        Commands::Record {
            display,
            rect,
            duration,
        } => commands::record::run(config, display, rect, duration).await,
    }
}
