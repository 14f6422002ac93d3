//! # Quality Gate
//!
//! Decides whether generated material is good enough to publish.
//!
//! The gate itself is a single comparison: a tune passes when its learning
//! value score reaches the threshold (6.0 unless configured otherwise).
//! [`check_quality_gate`] wraps it for free-form lesson content, finding the
//! first notation block and mapping the outcome to a publication status:
//!
//! | Content                        | Status     |
//! |--------------------------------|------------|
//! | no notation block              | `pending`  |
//! | block that cannot be analyzed  | `draft`    |
//! | score below threshold          | `draft`    |
//! | score at or above threshold    | `approved` |
//!
//! Cohort helpers ([`dynamic_threshold`], [`quality_trend`]) work on a
//! history of learning value scores.

use crate::analysis::{analyze, NotationStatistics};
use serde::Serialize;
use tracing::info;

/// Minimum learning value score for publication
pub const QUALITY_THRESHOLD: f64 = 6.0;

/// Below this many scores the cohort threshold falls back to the default
const MIN_COHORT_SCORES: usize = 10;

const DYNAMIC_THRESHOLD_FLOOR: f64 = 5.0;
const DYNAMIC_THRESHOLD_CEILING: f64 = 7.0;

/// Recent window and dead band for [`quality_trend`]
const TREND_WINDOW: usize = 10;
const TREND_BAND: f64 = 0.5;

/// `learning_value_score >= threshold`
pub fn passes_quality_gate(stats: &NotationStatistics, threshold: f64) -> bool {
    stats.learning_value_score >= threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityStatus {
    /// No notation found; needs a human
    Pending,
    Draft,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityGateResult {
    pub status: QualityStatus,
    pub can_publish: bool,
    pub playability_score: f64,
    pub learning_value_score: f64,
    pub statistics: Option<NotationStatistics>,
    pub message: String,
}

impl QualityGateResult {
    fn unscored(status: QualityStatus, message: &str) -> Self {
        Self {
            status,
            can_publish: false,
            playability_score: 0.0,
            learning_value_score: 0.0,
            statistics: None,
            message: message.to_string(),
        }
    }
}

/// Pull notation out of lesson content.
///
/// Fenced blocks tagged `abc` win. Without any, each bare tune starting at an
/// `X:` line and running to the next blank line is a block.
pub fn extract_notation_blocks(content: &str) -> Vec<String> {
    let fenced = fenced_blocks(content);
    if !fenced.is_empty() {
        return fenced;
    }

    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in content.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            Some(lines) if trimmed.is_empty() => {
                blocks.push(lines.join("\n"));
                current = None;
            }
            Some(lines) => lines.push(trimmed),
            None if trimmed.starts_with("X:") => current = Some(vec![trimmed]),
            None => {}
        }
    }
    if let Some(lines) = current {
        blocks.push(lines.join("\n"));
    }
    blocks
}

fn fenced_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;
    for line in content.lines() {
        let trimmed = line.trim();
        match current.as_mut() {
            Some(lines) if trimmed.starts_with("```") => {
                let block = lines.join("\n");
                if !block.trim().is_empty() {
                    blocks.push(block);
                }
                current = None;
            }
            Some(lines) => lines.push(line),
            None => {
                if let Some(tag) = trimmed.strip_prefix("```") {
                    if tag.trim().eq_ignore_ascii_case("abc") {
                        current = Some(Vec::new());
                    }
                }
            }
        }
    }
    blocks
}

/// Run the gate over lesson content for an instrument
pub fn check_quality_gate(content: &str, instrument: &str, threshold: f64) -> QualityGateResult {
    let blocks = extract_notation_blocks(content);
    let primary = match blocks.first() {
        Some(block) => block,
        None => {
            info!("no notation in content, leaving for manual review");
            return QualityGateResult::unscored(
                QualityStatus::Pending,
                "Notation not found. Manual review required.",
            );
        }
    };

    let stats = match analyze(primary, instrument) {
        Some(stats) => stats,
        None => {
            return QualityGateResult::unscored(
                QualityStatus::Draft,
                "Failed to analyze notation. Invalid syntax.",
            )
        }
    };

    let passes = passes_quality_gate(&stats, threshold);
    let (status, message) = if passes {
        (
            QualityStatus::Approved,
            format!(
                "Quality gate passed. Learning value score: {:.1}/10",
                stats.learning_value_score
            ),
        )
    } else {
        (
            QualityStatus::Draft,
            format!(
                "Quality gate failed. Learning value score: {:.1}/10 (threshold: {})",
                stats.learning_value_score, threshold
            ),
        )
    };
    info!(?status, score = stats.learning_value_score, threshold, "quality gate");

    QualityGateResult {
        status,
        can_publish: passes,
        playability_score: stats.playability_score,
        learning_value_score: stats.learning_value_score,
        statistics: Some(stats),
        message,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Cohort threshold: one (population) standard deviation below the mean of
/// recent scores, kept within 5.0..=7.0. Fewer than ten scores gives `default`.
pub fn dynamic_threshold(recent_scores: &[f64], default: f64) -> f64 {
    if recent_scores.len() < MIN_COHORT_SCORES {
        return default;
    }

    let mean = mean(recent_scores);
    let variance = recent_scores
        .iter()
        .map(|score| (score - mean).powi(2))
        .sum::<f64>()
        / recent_scores.len() as f64;

    (mean - variance.sqrt()).clamp(DYNAMIC_THRESHOLD_FLOOR, DYNAMIC_THRESHOLD_CEILING)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityTrend {
    pub average: f64,
    pub trend: TrendDirection,
    /// Mean of the last ten scores
    pub recent_average: f64,
    pub overall_average: f64,
    /// Percentage of scores at or above the threshold
    pub pass_rate: f64,
}

/// Compare the last ten scores with the whole history
pub fn quality_trend(scores: &[f64], threshold: f64) -> QualityTrend {
    if scores.is_empty() {
        return QualityTrend {
            average: 0.0,
            trend: TrendDirection::Stable,
            recent_average: 0.0,
            overall_average: 0.0,
            pass_rate: 0.0,
        };
    }

    let overall_average = mean(scores);
    let recent_average = mean(&scores[scores.len().saturating_sub(TREND_WINDOW)..]);
    let diff = recent_average - overall_average;
    let trend = if diff > TREND_BAND {
        TrendDirection::Improving
    } else if diff < -TREND_BAND {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };

    let passed = scores.iter().filter(|&&score| score >= threshold).count();

    QualityTrend {
        average: overall_average,
        trend,
        recent_average,
        overall_average,
        pass_rate: passed as f64 / scores.len() as f64 * 100.0,
    }
}
