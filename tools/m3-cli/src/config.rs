//! m3.toml configuration
//!
//! ```toml
//! # Optional: schema to use instead of the bundled one
//! schema = "schema/structures.xml"
//!
//! [load]
//! lazy = false
//!
//! # References whose targets are never merged by `m3 factor`
//! [factor]
//! exclude = ["ATVL.unknown0"]
//! ```

use anyhow::{Context, Result};
use m3_format::{FactorOptions, LoadOptions, Registry, SectionList};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG: &str = "m3.toml";

/// m3.toml structure
#[derive(Debug, Default, Deserialize)]
pub struct M3Config {
    /// Schema XML path, relative to the config file
    pub schema: Option<PathBuf>,
    #[serde(default)]
    pub load: LoadSection,
    #[serde(default)]
    pub factor: FactorSection,

    /// Directory the config was read from
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadSection {
    /// Decode sections on first access instead of at load time
    #[serde(default)]
    pub lazy: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct FactorSection {
    /// `STRUCT.field` references whose targets are excluded from merging
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl M3Config {
    /// Find the config to use.
    ///
    /// Priority:
    /// 1. Explicit `--config` path (must exist)
    /// 2. `m3.toml` in the working directory
    /// 3. Defaults
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let local = Path::new(DEFAULT_CONFIG);
        if local.exists() {
            return Self::load(local);
        }
        Ok(Self::default())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse config from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse m3.toml")
    }

    /// Schema path, resolved against the config's directory
    pub fn schema_path(&self) -> Option<PathBuf> {
        self.schema.as_ref().map(|schema| self.base_dir.join(schema))
    }

    /// Structure registry from the configured schema, or the bundled one
    pub fn registry(&self) -> Result<Arc<Registry>> {
        let registry = match self.schema_path() {
            Some(path) => Registry::from_path(&path)
                .with_context(|| format!("Failed to load schema: {}", path.display()))?,
            None => Registry::bundled().context("Bundled schema is invalid")?,
        };
        Ok(Arc::new(registry))
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            lazy: self.load.lazy,
        }
    }

    /// Open a container with the configured registry and load mode
    pub fn open(&self, path: &Path) -> Result<SectionList> {
        self.open_with(path, self.load_options())
    }

    pub fn open_with(&self, path: &Path, options: LoadOptions) -> Result<SectionList> {
        SectionList::load(self.registry()?, path, options).with_context(|| {
            if self.schema.is_some() {
                format!("Failed to load {}", path.display())
            } else {
                format!(
                    "Failed to load {} with the bundled schema, which only covers a subset \
                     of M3 structures (set `schema` in {DEFAULT_CONFIG} for files from other tools)",
                    path.display()
                )
            }
        })
    }

    /// Factoring options with the configured exclusions plus `extra`
    pub fn factor_options(&self, list: &mut SectionList, extra: &[String]) -> Result<FactorOptions> {
        let mut options = FactorOptions::default();
        for field in self.factor.exclude.iter().chain(extra) {
            let ids = list
                .referenced_sections(field)
                .with_context(|| format!("Invalid factor exclusion '{field}'"))?;
            tracing::debug!(field = %field, sections = ids.len(), "excluding from factoring");
            options = options.exclude(ids);
        }
        Ok(options)
    }
}
