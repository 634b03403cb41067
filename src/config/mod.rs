//! Configuration management for playbooks
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Playbook generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Pattern extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Auto-tracking configuration
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Playbook generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Default lookback window in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Minimum winners per format before a playbook is built
    #[serde(default = "default_min_content_items")]
    pub min_content_items: usize,

    /// Share of ranked items kept as winners (0.0 - 1.0]
    #[serde(default = "default_winner_percentile")]
    pub winner_percentile: f64,

    /// Winner set floor, capped by the number of available items
    #[serde(default = "default_min_winners")]
    pub min_winners: usize,
}

/// Pattern extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_hooks")]
    pub max_hooks: usize,

    /// Inclusive lower bound on hook length
    #[serde(default = "default_hook_min_chars")]
    pub hook_min_chars: usize,

    /// Exclusive upper bound on hook length
    #[serde(default = "default_hook_max_chars")]
    pub hook_max_chars: usize,

    #[serde(default = "default_max_cta_patterns")]
    pub max_cta_patterns: usize,

    #[serde(default = "default_max_hashtags")]
    pub max_hashtags: usize,

    /// How many best hours and best days to keep
    #[serde(default = "default_top_time_slots")]
    pub top_time_slots: usize,

    /// Local offset used for hour/day bucketing, in minutes east of UTC
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Recognised call-to-action phrases (matched case-insensitively)
    #[serde(default = "default_cta_phrases")]
    pub cta_phrases: Vec<String>,
}

/// Auto-tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Score a variant must exceed to claim a content item (0.0 - 1.0)
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Factor weights for the match score
    #[serde(default)]
    pub weights: MatchWeights,
}

/// Weights of the five match factors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    #[serde(default = "default_format_weight")]
    pub format: f64,
    #[serde(default = "default_hook_weight")]
    pub hook: f64,
    #[serde(default = "default_hashtag_weight")]
    pub hashtag: f64,
    #[serde(default = "default_time_weight")]
    pub time: f64,
    #[serde(default = "default_cta_weight")]
    pub cta: f64,
}

impl MatchWeights {
    pub fn total(&self) -> f64 {
        self.format + self.hook + self.hashtag + self.time + self.cta
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for playbooks data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            min_content_items: default_min_content_items(),
            winner_percentile: default_winner_percentile(),
            min_winners: default_min_winners(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_hooks: default_max_hooks(),
            hook_min_chars: default_hook_min_chars(),
            hook_max_chars: default_hook_max_chars(),
            max_cta_patterns: default_max_cta_patterns(),
            max_hashtags: default_max_hashtags(),
            top_time_slots: default_top_time_slots(),
            utc_offset_minutes: default_utc_offset_minutes(),
            cta_phrases: default_cta_phrases(),
        }
    }
}

impl ExtractionConfig {
    /// Offset used to convert publish timestamps to local time
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            weights: MatchWeights::default(),
        }
    }
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            format: default_format_weight(),
            hook: default_hook_weight(),
            hashtag: default_hashtag_weight(),
            time: default_time_weight(),
            cta: default_cta_weight(),
        }
    }
}

impl Config {
    /// Get the default base directory for playbooks (~/.playbooks)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".playbooks")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("playbooks.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("playbooks.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if playbooks is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let generation = &self.generation;
        if generation.winner_percentile <= 0.0 || generation.winner_percentile > 1.0 {
            return Err(Error::Config(
                "generation.winner_percentile must be in (0.0, 1.0]".to_string(),
            ));
        }

        if generation.min_content_items == 0 {
            return Err(Error::Config(
                "generation.min_content_items must be at least 1".to_string(),
            ));
        }

        if generation.lookback_days == 0 {
            return Err(Error::Config(
                "generation.lookback_days must be at least 1".to_string(),
            ));
        }

        let extraction = &self.extraction;
        if extraction.hook_min_chars >= extraction.hook_max_chars {
            return Err(Error::Config(
                "extraction.hook_min_chars must be < extraction.hook_max_chars".to_string(),
            ));
        }

        if extraction.utc_offset_minutes.abs() > 14 * 60 {
            return Err(Error::Config(
                "extraction.utc_offset_minutes must be within +/- 14 hours".to_string(),
            ));
        }

        let tracking = &self.tracking;
        if tracking.match_threshold < 0.0 || tracking.match_threshold > 1.0 {
            return Err(Error::Config(
                "tracking.match_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        let w = &tracking.weights;
        if [w.format, w.hook, w.hashtag, w.time, w.cta]
            .iter()
            .any(|weight| *weight < 0.0)
        {
            return Err(Error::Config(
                "tracking.weights must not be negative".to_string(),
            ));
        }

        if w.total() <= 0.0 {
            return Err(Error::Config(
                "tracking.weights must not all be zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.generation.lookback_days, 30);
        assert_eq!(config.generation.min_content_items, 3);
        assert_eq!(config.tracking.match_threshold, 0.30);
        assert!((config.tracking.weights.total() - 1.0).abs() < 1e-9);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.generation.min_content_items = 5;
        config.extraction.utc_offset_minutes = -300;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.generation.min_content_items, 5);
        assert_eq!(loaded.extraction.utc_offset_minutes, -300);
        assert_eq!(loaded.paths.db_file, tmp.path().join("playbooks.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tracking]
            match_threshold = 0.5

            [tracking.weights]
            hook = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.tracking.match_threshold, 0.5);
        assert_eq!(config.tracking.weights.hook, 0.5);
        assert_eq!(config.tracking.weights.format, 0.20);
        assert_eq!(config.extraction.max_hashtags, 10);
        assert!(config.extraction.cta_phrases.contains(&"swipe up".to_string()));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.generation.winner_percentile = 0.0;
        assert!(config.validate().is_err());
        config.generation.winner_percentile = 0.25;

        config.extraction.hook_min_chars = 100;
        assert!(config.validate().is_err());
        config.extraction.hook_min_chars = 10;

        config.tracking.match_threshold = 1.5;
        assert!(config.validate().is_err());
        config.tracking.match_threshold = 0.3;

        config.tracking.weights = MatchWeights {
            format: 0.0,
            hook: 0.0,
            hashtag: 0.0,
            time: 0.0,
            cta: 0.0,
        };
        assert!(config.validate().is_err());

        config.tracking.weights = MatchWeights::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_local_offset() {
        let mut config = Config::default();
        config.extraction.utc_offset_minutes = 120;
        assert_eq!(config.extraction.local_offset().local_minus_utc(), 7200);
    }
}
