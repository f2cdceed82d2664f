//! Analysis tuning, layered from defaults, config files and environment.
//!
//! Files are loaded in order (later wins):
//! 1. `~/.config/roman-analysis/config.toml` (user)
//! 2. `./roman-analysis.toml`, or an explicit path instead
//! 3. Environment variables (`ROMAN_ANALYSIS_*`)
//!
//! ```toml
//! [labeler]
//! markov_factor = 0.8
//! acceptance_threshold = 100.0
//!
//! [profile]
//! passing_weight = 0.5
//!
//! [passing]
//! window = 10
//!
//! [transitions]
//! use_inversions = false
//! ```

use std::env;
use std::path::{Path, PathBuf};

use score_events::PassingToneParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::labeler::LabelerParams;
use crate::section::ProfileWeights;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionsConfig {
    /// Compare numerals with their inversion figures. Default: true.
    pub use_inversions: bool,
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            use_inversions: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub labeler: LabelerParams,
    pub profile: ProfileWeights,
    pub passing: PassingToneParams,
    pub transitions: TransitionsConfig,
}

/// Where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

impl AnalysisConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    ///
    /// If `config_path` is provided and exists, it replaces the local
    /// `./roman-analysis.toml` override.
    pub fn load_with_sources_from(config_path: Option<&Path>) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in discover_config_files(config_path) {
            let table = load_table(&path)?;
            merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config: AnalysisConfig =
            toml::Value::Table(merged)
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::Parse {
                    path: sources.files.last().cloned().unwrap_or_default(),
                    message: e.to_string(),
                })?;

        apply_env_overrides(&mut config, &mut sources, |name| env::var(name).ok());
        Ok((config, sources))
    }

    /// Parse a single TOML document over the defaults.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Config files in load order (user, then local or `cli_path`). Only
/// existing files are returned.
pub fn discover_config_files(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("roman-analysis/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("roman-analysis.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Reads a file and checks it describes a valid config on its own, so
/// errors name the offending file.
fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parse_error = |e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let table: toml::Table = contents.parse().map_err(parse_error)?;
    toml::Value::Table(table.clone())
        .try_into::<AnalysisConfig>()
        .map_err(parse_error)?;
    Ok(table)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Applies `ROMAN_ANALYSIS_*` overrides read through `lookup`. Values that
/// fail to parse are ignored.
pub fn apply_env_overrides(
    config: &mut AnalysisConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let mut overlay = EnvOverlay { lookup, sources };

    // Labeler
    overlay.apply("ROMAN_ANALYSIS_MARKOV_FACTOR", &mut config.labeler.markov_factor);
    overlay.apply("ROMAN_ANALYSIS_ACCEPTANCE_THRESHOLD", &mut config.labeler.acceptance_threshold);
    overlay.apply("ROMAN_ANALYSIS_CANDIDATES_PER_SPAN", &mut config.labeler.candidates_per_span);
    overlay.apply("ROMAN_ANALYSIS_TIE_EPSILON", &mut config.labeler.tie_epsilon);

    // Profiles and passing tones
    overlay.apply("ROMAN_ANALYSIS_PASSING_WEIGHT", &mut config.profile.passing_weight);
    overlay.apply("ROMAN_ANALYSIS_HARMONIC_WEIGHT", &mut config.profile.harmonic_weight);
    overlay.apply("ROMAN_ANALYSIS_PASSING_WINDOW", &mut config.passing.window);
    overlay.apply("ROMAN_ANALYSIS_PASSING_MAX_STEP", &mut config.passing.max_step);

    overlay.apply("ROMAN_ANALYSIS_USE_INVERSIONS", &mut config.transitions.use_inversions);
}

struct EnvOverlay<'a, F> {
    lookup: F,
    sources: &'a mut ConfigSources,
}

impl<F: Fn(&str) -> Option<String>> EnvOverlay<'_, F> {
    fn apply<T: std::str::FromStr>(&mut self, name: &str, target: &mut T) {
        if let Some(v) = (self.lookup)(name) {
            if let Ok(parsed) = v.trim().parse() {
                *target = parsed;
                self.sources.env_overrides.push(name.to_string());
            }
        }
    }
}
