//! Pipeline configuration, read from a YAML file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::process::{aggregate::CategoryPolicy, join::Weights, PipelineOptions};
use crate::sources::SourceSlot;

pub const DEFAULT_CONFIG: &str = "pipeline.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Slot name → file path or glob pattern.
    pub sources: BTreeMap<SourceSlot, String>,
    /// ZIP bundle of `<slot>.csv` entries.
    pub bundle: Option<PathBuf>,
    /// Already merged table; when set the sources are ignored.
    pub merged: Option<PathBuf>,
    /// Slots without which no table is published.
    pub required: Vec<SourceSlot>,
    pub weights: Weights,
    pub trim_to_core: bool,
    pub on_missing_overall: CategoryPolicy,
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            bundle: None,
            merged: None,
            required: vec![SourceSlot::YouthUnemployment],
            weights: Weights::default(),
            trim_to_core: true,
            on_missing_overall: CategoryPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub parquet: bool,
    pub csv: bool,
    pub coverage_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            parquet: true,
            csv: true,
            coverage_json: true,
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing pipeline config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            weights: self.weights,
            trim_to_core: self.trim_to_core,
            required: self.required.clone(),
            category_policy: self.on_missing_overall,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() -> Result<()> {
        let config = Config::from_yaml("{}")?;
        assert!(config.sources.is_empty());
        assert_eq!(config.required, vec![SourceSlot::YouthUnemployment]);
        assert!(config.trim_to_core);
        assert_eq!(config.weights, Weights::default());
        assert_eq!(config.output, OutputConfig::default());
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let yaml = r#"
sources:
  youth_unemployment: data/youth_*.csv
  cpi_state: data/cpi.parquet
bundle: data/bundle.zip
required: [youth_unemployment, skills_underemployment]
weights: { youth: 2, skills: 1, time: 1 }
trim_to_core: false
on_missing_overall: skip_source
output:
  dir: build
  parquet: false
"#;
        let config = Config::from_yaml(yaml)?;
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[&SourceSlot::CpiState], "data/cpi.parquet");
        assert_eq!(config.bundle, Some(PathBuf::from("data/bundle.zip")));
        let options = config.pipeline_options();
        assert_eq!(options.category_policy, CategoryPolicy::SkipSource);
        assert_eq!(options.required.len(), 2);
        assert!(!options.trim_to_core);
        assert_eq!(options.weights.youth, 2.0);
        assert_eq!(config.output.dir, PathBuf::from("build"));
        assert!(!config.output.parquet && config.output.csv);
        Ok(())
    }

    #[test]
    fn unknown_slot_is_rejected() {
        assert!(Config::from_yaml("sources:\n  weather: x.csv\n").is_err());
    }
}
