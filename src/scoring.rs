//! # Quality Scores
//!
//! Two bounded scores computed from notation statistics.
//!
//! ## Playability (0-10)
//! Starts at 10 and subtracts penalties:
//! - a fixed penalty when the pitch range leaves the instrument's comfortable band
//! - a tiered penalty for the mean leap, after the instrument's leap coefficient
//! - a tiered penalty for chromatic density
//! - a tiered penalty for tempo outside 90-130 quarter notes per minute, after
//!   the instrument's tempo coefficient, in both directions
//!
//! ## Learning value (0-10)
//! Starts from playability and adds peaked bonuses: moderate repetition, a
//! handful of repeated groups, and a readable note density score best, while
//! too much or too little of each costs points. A difficulty bonus rewards a
//! match with the requested level, or intermediate material when no level was
//! requested.
//!
//! Every table is ordered so that the first matching tier is the one that
//! applies.

use crate::analysis::DifficultyLevel;
use crate::instrument;

/// Penalty applied when the pitch range is outside the comfortable band
pub const RANGE_PENALTY: f64 = 3.0;

/// Condition under which a tier applies
#[derive(Debug, Clone, Copy)]
enum Tier {
    Above(f64),
    Below(f64),
    Within(f64, f64),
}

impl Tier {
    fn matches(&self, value: f64) -> bool {
        match *self {
            Tier::Above(threshold) => value > threshold,
            Tier::Below(threshold) => value < threshold,
            Tier::Within(low, high) => value >= low && value <= high,
        }
    }
}

use Tier::*;

/// Adjusted mean leap in semitones
const LEAP_PENALTIES: &[(Tier, f64)] = &[(Above(7.0), 2.5), (Above(5.0), 1.5), (Above(3.0), 0.5)];

const CHROMATIC_PENALTIES: &[(Tier, f64)] = &[(Above(0.4), 1.5), (Above(0.2), 0.5)];

/// Adjusted tempo in quarter notes per minute
const TEMPO_PENALTIES: &[(Tier, f64)] = &[
    (Above(160.0), 2.0),
    (Above(130.0), 1.0),
    (Below(60.0), 1.0),
    (Below(90.0), 0.5),
];

const REPETITION_ADJUSTMENTS: &[(Tier, f64)] = &[
    (Within(0.3, 0.6), 1.5),
    (Above(0.6), -1.0),
    (Below(0.1), -0.5),
];

const SEQUENCE_ADJUSTMENTS: &[(Tier, f64)] = &[(Within(3.0, 8.0), 1.0), (Above(8.0), -0.5)];

const DENSITY_ADJUSTMENTS: &[(Tier, f64)] = &[
    (Within(4.0, 8.0), 0.5),
    (Above(12.0), -1.0),
    (Below(2.0), -0.5),
];

/// Amount from the first matching tier, 0 when none matches
fn first_tier(value: f64, tiers: &[(Tier, f64)]) -> f64 {
    tiers
        .iter()
        .find(|(tier, _)| tier.matches(value))
        .map(|(_, amount)| *amount)
        .unwrap_or(0.0)
}

fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0)
}

/// How comfortably the material can be played on the instrument, 0-10
pub fn playability_score(
    range_ok: bool,
    leap_mean: f64,
    chromatic_density: f64,
    tempo_qpm: f64,
    instrument: &str,
) -> f64 {
    let profile = instrument::lookup(instrument);
    let mut score = 10.0;

    if !range_ok {
        score -= RANGE_PENALTY;
    }

    score -= first_tier(leap_mean * profile.leap_coefficient, LEAP_PENALTIES);
    score -= first_tier(chromatic_density, CHROMATIC_PENALTIES);
    score -= first_tier(tempo_qpm * profile.tempo_coefficient, TEMPO_PENALTIES);

    clamp_score(score)
}

fn difficulty_bonus(level: DifficultyLevel, target: Option<DifficultyLevel>) -> f64 {
    match target {
        Some(target) if target == level => 0.5,
        Some(_) => 0.0,
        None => match level {
            DifficultyLevel::Intermediate => 0.5,
            DifficultyLevel::Beginner => 0.3,
            DifficultyLevel::Advanced => 0.0,
        },
    }
}

/// How useful the material is for practice, 0-10
pub fn learning_value_score(
    playability: f64,
    repetition_ratio: f64,
    sequence_count: usize,
    notes_per_measure: f64,
    difficulty: DifficultyLevel,
    target: Option<DifficultyLevel>,
) -> f64 {
    let mut score = playability;

    score += first_tier(repetition_ratio, REPETITION_ADJUSTMENTS);
    score += first_tier(sequence_count as f64, SEQUENCE_ADJUSTMENTS);
    score += first_tier(notes_per_measure, DENSITY_ADJUSTMENTS);
    score += difficulty_bonus(difficulty, target);

    clamp_score(score)
}
