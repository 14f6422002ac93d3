//! Quick test type definitions

use crate::aggregate::{AggregatedWeakSpot, WeakSpotDifficulty, WeakSpotsAggregation};
use crate::analysis::DifficultyLevel;
use serde::{Deserialize, Serialize};

/// What to generate a quick test for
#[derive(Debug, Clone, PartialEq)]
pub struct QuickTestParams {
    pub material_title: String,
    pub instrument: String,
    pub target_tempo: u32,
    /// Ranked weak spots; only the first `sections_count` are used
    pub weak_spots: Vec<AggregatedWeakSpot>,
    pub difficulty: DifficultyLevel,
    /// Number of problems to ask for (usually 3-5)
    pub sections_count: usize,
}

impl QuickTestParams {
    /// Parameters for a class, taken from its weak-spot aggregation
    pub fn from_aggregation(
        aggregation: &WeakSpotsAggregation,
        difficulty: DifficultyLevel,
        sections_count: usize,
    ) -> Self {
        Self {
            material_title: aggregation.material_title.clone(),
            instrument: aggregation.instrument.clone(),
            target_tempo: aggregation.target_tempo,
            weak_spots: aggregation.top_weak_spots.clone(),
            difficulty,
            sections_count,
        }
    }

    /// The spots the test will cover
    pub fn selected_spots(&self) -> &[AggregatedWeakSpot] {
        let count = self.sections_count.max(1).min(self.weak_spots.len());
        &self.weak_spots[..count]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBars {
    pub start_bar: u32,
    pub end_bar: u32,
}

/// One practice problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickTestProblem {
    pub problem_number: u32,
    pub title: String,
    pub instruction: String,
    /// ABC notation, eight bars with a full header
    pub notation: String,
    pub target_bars: TargetBars,
    pub difficulty: WeakSpotDifficulty,
    /// Seconds
    pub estimated_time: u32,
}

/// A validated quick test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickTestResult {
    pub title: String,
    pub description: String,
    pub problems: Vec<QuickTestProblem>,
    /// Minutes
    pub estimated_time: u32,
    pub total_bars: u32,
}
