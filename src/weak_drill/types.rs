//! Weak-spot drill type definitions

use crate::analysis::{DifficultyLevel, NotationStatistics};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to build a drill for: one student's looped passage
#[derive(Debug, Clone, PartialEq)]
pub struct WeakDrillParams {
    /// The full piece, in ABC notation
    pub source_notation: String,
    /// First looped bar, counted from 1
    pub loop_start_bar: u32,
    /// Last looped bar, inclusive
    pub loop_end_bar: u32,
    pub instrument: String,
    /// Tempo the student currently manages, in BPM
    pub current_tempo: u32,
    pub material_title: String,
}

impl WeakDrillParams {
    pub fn bars(&self) -> BarRange {
        BarRange {
            start: self.loop_start_bar,
            end: self.loop_end_bar,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRange {
    pub start: u32,
    pub end: u32,
}

impl BarRange {
    /// Number of bars, both ends included
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

impl fmt::Display for BarRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Which of the three variations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrillKind {
    Same,
    Easier,
    Harder,
}

impl DrillKind {
    pub const ALL: [DrillKind; 3] = [DrillKind::Same, DrillKind::Easier, DrillKind::Harder];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrillKind::Same => "same",
            DrillKind::Easier => "easier",
            DrillKind::Harder => "harder",
        }
    }

    /// Position in the response, counted from 1
    pub fn number(&self) -> u32 {
        match self {
            DrillKind::Same => 1,
            DrillKind::Easier => 2,
            DrillKind::Harder => 3,
        }
    }
}

impl fmt::Display for DrillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One practice variation of the passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillVariation {
    pub title: String,
    pub description: String,
    /// ABC notation with a full header, as long as the original section
    pub notation: String,
    pub difficulty: DifficultyLevel,
    /// BPM
    pub target_tempo: u32,
    /// Seconds
    pub estimated_time: u32,
    pub focus_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillSet {
    pub same: DrillVariation,
    pub easier: DrillVariation,
    pub harder: DrillVariation,
}

impl DrillSet {
    pub fn get(&self, kind: DrillKind) -> &DrillVariation {
        match kind {
            DrillKind::Same => &self.same,
            DrillKind::Easier => &self.easier,
            DrillKind::Harder => &self.harder,
        }
    }

    /// Variations in response order: same, easier, harder
    pub fn iter(&self) -> impl Iterator<Item = (DrillKind, &DrillVariation)> {
        DrillKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// The passage the drill was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalSection {
    pub notation: String,
    pub bars: BarRange,
    pub difficulty: DifficultyLevel,
    pub analysis: NotationStatistics,
}

/// A validated drill: the original section and three variations of it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeakDrillResult {
    pub title: String,
    pub original_section: OriginalSection,
    pub drills: DrillSet,
}
