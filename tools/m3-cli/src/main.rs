//! m3 - inspect and rewrite M3 model files
//!
//! # Commands
//!
//! - `m3 info <file>` - Section table of a container
//! - `m3 dump <file> [--section N]` - Decoded records as JSON
//! - `m3 validate <file>` - Check every record against the schema
//! - `m3 roundtrip <in> <out> [--factor]` - Load and write back
//! - `m3 factor <in> [-o out]` - Merge equal sections
//! - `m3 schema [--structure NAME]` - Structures and field layouts
//!
//! # Config (m3.toml)
//!
//! Read from `--config <path>` or `./m3.toml` when present:
//! ```toml
//! schema = "structures.xml"
//!
//! [load]
//! lazy = true
//!
//! [factor]
//! exclude = ["ATVL.unknown0"]
//! ```

mod config;
mod convert;
mod inspect;
mod schema;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use config::M3Config;

/// m3 - inspect and rewrite M3 model files
#[derive(Parser)]
#[command(name = "m3")]
#[command(about = "Inspect and rewrite M3 model files")]
#[command(version)]
struct Cli {
    /// Path to m3.toml (default: ./m3.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the section table of a container
    Info(inspect::InfoArgs),

    /// Print decoded records as JSON
    Dump(inspect::DumpArgs),

    /// Validate every record of a container
    Validate(convert::ValidateArgs),

    /// Load a container and write it back out
    Roundtrip(convert::RoundtripArgs),

    /// Merge sections with equal content
    Factor(convert::FactorArgs),

    /// List schema structures or print a field layout
    Schema(schema::SchemaArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `dump` output stays parseable
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = M3Config::locate(cli.config.as_deref())?;

    match cli.command {
        Commands::Info(args) => inspect::execute_info(args, &config),
        Commands::Dump(args) => inspect::execute_dump(args, &config),
        Commands::Validate(args) => convert::execute_validate(args, &config),
        Commands::Roundtrip(args) => convert::execute_roundtrip(args, &config),
        Commands::Factor(args) => convert::execute_factor(args, &config),
        Commands::Schema(args) => schema::execute(args, &config),
    }
}
