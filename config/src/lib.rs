//! Tally Configuration
//!
//! Shared configuration crate for the aggregation engine and its CLI.
//!
//! Handles loading configuration from:
//! 1. TALLY_CONFIG env var (explicit path)
//! 2. ./tally.toml (current directory)
//! 3. ~/.tally/tally.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<TallyConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "tally.toml";
const CONFIG_DIR_NAME: &str = ".tally";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_HOLDERS: usize = 3;
const DEFAULT_THRESHOLD: usize = 2;
const DEFAULT_ANALYST: u32 = 1;
const DEFAULT_MIN_COHORT_SIZE: usize = 3;
const DEFAULT_TEMPLATE_PATH: &str = "./template.json";
const DEFAULT_SUBMISSIONS_PATH: &str = "./submissions.json";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub committee: CommitteeSection,
    #[serde(default)]
    pub aggregation: AggregationSection,
    #[serde(default)]
    pub io: IoSection,
}

/// Share-holding committee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitteeSection {
    #[serde(default = "default_holders")]
    pub holders: usize,
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Party that receives opened aggregates
    #[serde(default = "default_analyst")]
    pub analyst: u32,
}

impl Default for CommitteeSection {
    fn default() -> Self {
        Self {
            holders: DEFAULT_HOLDERS,
            threshold: DEFAULT_THRESHOLD,
            analyst: DEFAULT_ANALYST,
        }
    }
}

fn default_holders() -> usize {
    DEFAULT_HOLDERS
}
fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}
fn default_analyst() -> u32 {
    DEFAULT_ANALYST
}

/// Aggregation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSection {
    /// Cohorts with fewer submitters are folded into the ungrouped set
    #[serde(default = "default_min_cohort_size")]
    pub min_cohort_size: usize,
}

impl Default for AggregationSection {
    fn default() -> Self {
        Self {
            min_cohort_size: DEFAULT_MIN_COHORT_SIZE,
        }
    }
}

fn default_min_cohort_size() -> usize {
    DEFAULT_MIN_COHORT_SIZE
}

/// Input/output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoSection {
    #[serde(default = "default_template_path")]
    pub template_path: String,
    #[serde(default = "default_submissions_path")]
    pub submissions_path: String,
    /// Write the report here instead of stdout
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for IoSection {
    fn default() -> Self {
        Self {
            template_path: DEFAULT_TEMPLATE_PATH.into(),
            submissions_path: DEFAULT_SUBMISSIONS_PATH.into(),
            output_path: None,
        }
    }
}

fn default_template_path() -> String {
    DEFAULT_TEMPLATE_PATH.into()
}
fn default_submissions_path() -> String {
    DEFAULT_SUBMISSIONS_PATH.into()
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl TallyConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check TALLY_CONFIG env var
        if let Ok(path) = env::var("TALLY_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./tally.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.tally/tally.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Committee
        env_parse("TALLY_HOLDERS", &mut self.committee.holders);
        env_parse("TALLY_THRESHOLD", &mut self.committee.threshold);
        env_parse("TALLY_ANALYST", &mut self.committee.analyst);

        // Aggregation
        env_parse("TALLY_MIN_COHORT", &mut self.aggregation.min_cohort_size);

        // IO
        env_string("TALLY_TEMPLATE", &mut self.io.template_path);
        env_string("TALLY_SUBMISSIONS", &mut self.io.submissions_path);
        env_option_string("TALLY_OUTPUT", &mut self.io.output_path);
    }

    /// Reject committee shapes no backend can satisfy
    pub fn validate(&self) -> Result<()> {
        let c = &self.committee;
        if c.threshold == 0 || c.threshold > c.holders || c.holders > 255 {
            bail!(
                "invalid committee: threshold={} holders={}",
                c.threshold,
                c.holders
            );
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.io.output_path = Some("./report.json".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static TallyConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: TallyConfig) -> Result<(), TallyConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `TallyConfig::global()`.
#[inline]
pub fn global_config() -> &'static TallyConfig {
    TallyConfig::global()
}

// ============================================================================
// Tests
// ============================================================================
