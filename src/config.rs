//! Engine configuration, read from kebab-case YAML.
//!
//! ```yaml
//! quality:
//!   threshold: 6.0
//! aggregation:
//!   top-n: 5
//!   default-instrument: piano
//! generator:
//!   temperature: 0.7
//!   soft-quality-threshold: 5.0
//! ```
//!
//! Every field is optional; missing fields keep their defaults.

use crate::error::EtudeError;
use crate::quality::QUALITY_THRESHOLD;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub quality: QualityConfig,
    pub aggregation: AggregationConfig,
    pub generator: GeneratorConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct QualityConfig {
    /// Minimum learning value score for publication
    pub threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: QUALITY_THRESHOLD,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AggregationConfig {
    /// Weak spots kept after ranking
    pub top_n: usize,
    pub high_student_ratio: f64,
    pub high_avg_loops: f64,
    pub medium_student_ratio: f64,
    pub medium_avg_loops: f64,
    /// Used when no student reported a target tempo
    pub default_tempo: u32,
    /// Used when no student reported an instrument
    pub default_instrument: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            high_student_ratio: 0.5,
            high_avg_loops: 5.0,
            medium_student_ratio: 0.3,
            medium_avg_loops: 4.0,
            default_tempo: 120,
            default_instrument: "piano".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GeneratorConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Token budget for a weak-spot drill (three full variations)
    pub drill_max_tokens: u32,
    /// Generated problems scoring below this are logged, not rejected
    pub soft_quality_threshold: f64,
    pub bars_per_problem: u32,
    pub default_estimated_minutes: u32,
    pub default_problem_seconds: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            drill_max_tokens: 2500,
            soft_quality_threshold: 5.0,
            bars_per_problem: 8,
            default_estimated_minutes: 5,
            default_problem_seconds: 75,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, EtudeError> {
        // An empty document is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig =
            serde_yaml::from_str(content).map_err(|e| EtudeError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EtudeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EtudeError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<(), EtudeError> {
        let score_range = 0.0..=10.0;
        if !score_range.contains(&self.quality.threshold) {
            return Err(EtudeError::ConfigError(format!(
                "quality threshold must be between 0 and 10, got {}",
                self.quality.threshold
            )));
        }
        if !score_range.contains(&self.generator.soft_quality_threshold) {
            return Err(EtudeError::ConfigError(format!(
                "soft-quality-threshold must be between 0 and 10, got {}",
                self.generator.soft_quality_threshold
            )));
        }
        if self.aggregation.top_n == 0 {
            return Err(EtudeError::ConfigError("top-n must be at least 1".to_string()));
        }
        for (name, ratio) in [
            ("high-student-ratio", self.aggregation.high_student_ratio),
            ("medium-student-ratio", self.aggregation.medium_student_ratio),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(EtudeError::ConfigError(format!(
                    "{} must be between 0 and 1, got {}",
                    name, ratio
                )));
            }
        }
        if self.generator.bars_per_problem == 0 {
            return Err(EtudeError::ConfigError(
                "bars-per-problem must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
