//! Schema command - list structures and print field layouts

use anyhow::{Context, Result};
use clap::Args;
use m3_format::Dialect;

use crate::config::M3Config;

/// Arguments for the schema command
#[derive(Args)]
pub struct SchemaArgs {
    /// Print the field layout of this structure
    #[arg(short, long)]
    pub structure: Option<String>,

    /// Only this revision (default: all revisions)
    #[arg(long, requires = "structure")]
    pub version: Option<u32>,

    /// Resolve layouts for legacy MD33 files
    #[arg(long)]
    pub md33: bool,

    /// Print the vertex layout selected by a `vertexFlags` word (e.g. 0x182007d)
    #[arg(long, value_parser = parse_flags, conflicts_with = "structure")]
    pub vertex_flags: Option<u32>,
}

fn parse_flags(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid vertex flags '{text}': {e}"))
}

/// Execute the schema command.
///
/// Loading the registry already checks every declared size, so a schema
/// that loads here is consistent.
pub fn execute(args: SchemaArgs, config: &M3Config) -> Result<()> {
    let registry = config.registry()?;
    let dialect = if args.md33 { Dialect::Md33 } else { Dialect::Md34 };

    if let Some(flags) = args.vertex_flags {
        let format = registry
            .vertex_format(flags)
            .with_context(|| format!("Failed to build vertex format {flags:#x}"))?;
        println!("=== {} ({} bytes) ===", format.name(), format.size());
        println!("{}", format.layout());
        return Ok(());
    }

    let Some(name) = args.structure else {
        for name in registry.structure_names() {
            let history = registry.history(name)?;
            let versions: Vec<String> = history
                .versions()
                .map(|version| match history.size(version) {
                    Some(size) => format!("V{version} ({size} bytes)"),
                    None => format!("V{version}"),
                })
                .collect();
            println!("{name:<6} {}", versions.join(", "));
        }
        return Ok(());
    };

    let history = registry
        .history(&name)
        .with_context(|| format!("Unknown structure '{name}'"))?;
    if let Some(summary) = history.summary() {
        println!("{name}: {summary}");
    }
    let versions: Vec<u32> = match args.version {
        Some(version) => vec![version],
        None => history.versions().collect(),
    };
    for version in versions {
        let description = registry
            .description(&name, version, dialect)
            .with_context(|| format!("Failed to resolve {name}V{version}"))?;
        println!();
        println!(
            "=== {} ({} bytes, {}) ===",
            description.full_name(),
            description.size(),
            dialect.header_tag()
        );
        println!("{}", description.layout());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        assert_eq!(parse_flags("0x182007d"), Ok(0x182007d));
        assert_eq!(parse_flags("0X1"), Ok(1));
        assert_eq!(parse_flags("513"), Ok(513));
        assert!(parse_flags("0xzz").is_err());
    }
}
