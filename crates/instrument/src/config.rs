//! Instrumentation settings, read from a JSON file or from the environment.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

use heurist_bytecode::ClassName;
use heurist_distance::HeuristicConfig;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::category::ReplacementCategory;
use crate::error::ConfigError;

pub const ENV_REPLACEMENT_CATEGORIES: &str = "HEURIST_REPLACEMENT_CATEGORIES";
pub const ENV_SUT_PACKAGES: &str = "HEURIST_SUT_PACKAGES";
pub const ENV_LOG_LEVEL: &str = "HEURIST_LOG_LEVEL";
pub const ENV_REACHED: &str = "HEURIST_REACHED";
pub const ENV_MAX_STEPS: &str = "HEURIST_MAX_STEPS";

pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;

/// Classes under this package are part of the instrumentation itself and
/// are never rewritten.
pub const INTERNAL_PACKAGE: &str = "org.heurist.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    pub replacement_categories: BTreeSet<ReplacementCategory>,
    /// Package prefixes (dotted) of the system under test. Classes outside
    /// them only get method replacements. Empty means every class.
    pub sut_packages: Vec<String>,
    pub heuristics: HeuristicConfig,
    pub max_steps: u64,
    pub log_level: Option<String>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        InstrumentationConfig {
            replacement_categories: ReplacementCategory::ALL.into_iter().collect(),
            sut_packages: Vec::new(),
            heuristics: HeuristicConfig::default(),
            max_steps: DEFAULT_MAX_STEPS,
            log_level: None,
        }
    }
}

impl InstrumentationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: InstrumentationConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `HEURIST_*`
    /// variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = InstrumentationConfig::default();
        if let Some(list) = lookup(ENV_REPLACEMENT_CATEGORIES) {
            config.replacement_categories = parse_categories(&list)?;
        }
        if let Some(list) = lookup(ENV_SUT_PACKAGES) {
            config.sut_packages = split_list(&list).map(str::to_string).collect();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = Some(level);
        }
        if let Some(reached) = lookup(ENV_REACHED) {
            config.heuristics.reached = parse_value(ENV_REACHED, &reached)?;
        }
        if let Some(steps) = lookup(ENV_MAX_STEPS) {
            config.max_steps = parse_value(ENV_MAX_STEPS, &steps)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.heuristics.validate()?;
        if self.max_steps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_steps".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn is_enabled(&self, category: ReplacementCategory) -> bool {
        self.replacement_categories.contains(&category)
    }

    /// Whether a class (either name form) belongs to the system under test.
    pub fn is_sut(&self, class_name: &str) -> bool {
        let dotted = ClassName::new(class_name).full_name_with_dots();
        if dotted.starts_with(INTERNAL_PACKAGE) {
            return false;
        }
        self.sut_packages.is_empty()
            || self.sut_packages.iter().any(|p| dotted.starts_with(p.as_str()))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn parse_categories(list: &str) -> Result<BTreeSet<ReplacementCategory>, ConfigError> {
    split_list(list).map(str::parse).collect()
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn active_heuristics() -> &'static RwLock<HeuristicConfig> {
    static ACTIVE: OnceLock<RwLock<HeuristicConfig>> = OnceLock::new();
    ACTIVE.get_or_init(|| RwLock::new(HeuristicConfig::default()))
}

/// Make `cfg` the constants every probe scores with.
pub fn install_heuristics(cfg: HeuristicConfig) {
    *active_heuristics().write() = cfg;
}

/// The constants probes currently score with.
pub fn heuristics() -> HeuristicConfig {
    *active_heuristics().read()
}
