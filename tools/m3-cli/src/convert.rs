//! Validate, roundtrip and factor commands

use anyhow::{Context, Result};
use clap::Args;
use m3_format::{LoadOptions, SectionList};
use std::path::{Path, PathBuf};

use crate::config::M3Config;

/// Arguments for the validate command
#[derive(Args)]
pub struct ValidateArgs {
    /// M3 file to validate
    pub file: PathBuf,
}

/// Arguments for the roundtrip command
#[derive(Args)]
pub struct RoundtripArgs {
    /// Input M3 file
    pub input: PathBuf,

    /// Output M3 file
    pub output: PathBuf,

    /// Merge equal sections before writing
    #[arg(long)]
    pub factor: bool,
}

/// Arguments for the factor command
#[derive(Args)]
pub struct FactorArgs {
    /// Input M3 file
    pub input: PathBuf,

    /// Output file (default: overwrite input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Additional `STRUCT.field` references whose targets are never merged
    #[arg(short, long)]
    pub exclude: Vec<String>,
}

/// Execute the validate command
pub fn execute_validate(args: ValidateArgs, config: &M3Config) -> Result<()> {
    let mut list = config.open_with(&args.file, LoadOptions::default())?;
    let before = list.len();
    list.validate()
        .with_context(|| format!("Validation failed: {}", args.file.display()))?;

    println!("{} is valid ({} sections)", args.file.display(), before);
    let dropped = before - list.len();
    if dropped > 0 {
        println!("  {dropped} empty section(s) dropped");
    }
    Ok(())
}

/// Execute the roundtrip command
pub fn execute_roundtrip(args: RoundtripArgs, config: &M3Config) -> Result<()> {
    let mut list = config.open(&args.input)?;
    if args.factor {
        factor(&mut list, config, &[])?;
    }
    write(&mut list, &args.output)?;

    let original = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let written = std::fs::read(&args.output)
        .with_context(|| format!("Failed to read {}", args.output.display()))?;
    if original == written {
        println!("  identical to input ({} bytes)", written.len());
    } else {
        println!(
            "  differs from input ({} -> {} bytes)",
            original.len(),
            written.len()
        );
    }
    Ok(())
}

/// Execute the factor command
pub fn execute_factor(args: FactorArgs, config: &M3Config) -> Result<()> {
    // The output may overwrite the input, so never keep the file open
    let mut list = config.open_with(&args.input, LoadOptions::default())?;
    let removed = factor(&mut list, config, &args.exclude)?;
    println!("  merged {removed} section(s)");

    let output = args.output.as_deref().unwrap_or(&args.input);
    write(&mut list, output)
}

fn factor(list: &mut SectionList, config: &M3Config, extra: &[String]) -> Result<usize> {
    let options = config.factor_options(list, extra)?;
    list.factor_sections(&options)
        .context("Failed to factor sections")
}

fn write(list: &mut SectionList, output: &Path) -> Result<()> {
    list.save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("  Wrote: {} ({} sections)", output.display(), list.len());
    Ok(())
}
