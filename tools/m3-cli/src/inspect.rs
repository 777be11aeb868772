//! Info and dump commands - read-only views of a container

use anyhow::{Context, Result};
use clap::Args;
use m3_format::{SectionList, Value};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::M3Config;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// M3 file to inspect (.m3/.m3a)
    pub file: PathBuf,
}

/// Arguments for the dump command
#[derive(Args)]
pub struct DumpArgs {
    /// M3 file to dump (.m3/.m3a)
    pub file: PathBuf,

    /// Only dump the section at this position
    #[arg(short, long)]
    pub section: Option<usize>,
}

/// Execute the info command
pub fn execute_info(args: InfoArgs, config: &M3Config) -> Result<()> {
    let list = config.open(&args.file)?;

    println!("=== {} ===", args.file.display());
    println!("  Dialect:  {}", list.dialect().header_tag());
    println!("  Sections: {}", list.len());
    if let Some(name) = model_name(&list) {
        println!("  Model:    {name}");
    }
    println!();
    println!(
        "  {:>5}  {:<6} {:>4} {:>8} {:>10} {:>10}  {}",
        "pos", "tag", "ver", "records", "offset", "bytes", "referrers"
    );
    for (position, section) in list.sections().iter().enumerate() {
        let offset = section
            .index_entry()
            .map(|entry| format!("{:#x}", entry.offset))
            .unwrap_or_else(|| "-".to_string());
        let shared = if section.is_shared() { " (shared)" } else { "" };
        println!(
            "  {:>5}  {:<6} {:>4} {:>8} {:>10} {:>10}  {}{}",
            position,
            section.name(),
            section.description().version(),
            section.len(),
            offset,
            section.byte_len(),
            section.sites().len(),
            shared
        );
    }
    Ok(())
}

fn model_name(list: &SectionList) -> Option<String> {
    let reference = list.model().ok()?.reference("modelName").ok()?;
    list.string(&reference).ok()
}

/// JSON shape of one dumped section
#[derive(Serialize)]
struct SectionDump<'a> {
    position: usize,
    name: &'a str,
    version: u32,
    entries: &'a [Value],
}

/// Execute the dump command
pub fn execute_dump(args: DumpArgs, config: &M3Config) -> Result<()> {
    let list = config.open(&args.file)?;

    let positions = match args.section {
        Some(position) => vec![position],
        None => (0..list.len()).collect(),
    };

    let mut dumps = Vec::with_capacity(positions.len());
    for position in positions {
        let section = list
            .section(position)
            .with_context(|| format!("No section {position} in {}", args.file.display()))?;
        dumps.push(SectionDump {
            position,
            name: section.name(),
            version: section.description().version(),
            entries: list
                .entries(position)
                .with_context(|| format!("Failed to decode section {position}"))?,
        });
    }

    let json = if args.section.is_some() {
        serde_json::to_string_pretty(&dumps[0])
    } else {
        serde_json::to_string_pretty(&dumps)
    }
    .context("Failed to serialize sections")?;
    println!("{json}");
    Ok(())
}
