//! Parsing model completions into drill sets.
//!
//! The JSON object is located with the same extraction the quick test uses,
//! then read leniently: only a title and notation are required per
//! variation, everything else falls back to a default for its kind.

use super::types::{DrillKind, DrillSet, DrillVariation};
use crate::analysis::DifficultyLevel;
use crate::error::EtudeError;
use crate::quick_test::extract_json_candidate;
use serde::Deserialize;
use std::str::FromStr;

fn response_error(message: impl Into<String>) -> EtudeError {
    EtudeError::ResponseError(message.into())
}

#[derive(Deserialize, Debug, Default)]
struct RawDrillResponse {
    drills: Option<RawDrills>,
}

#[derive(Deserialize, Debug, Default)]
struct RawDrills {
    same: Option<RawVariation>,
    easier: Option<RawVariation>,
    harder: Option<RawVariation>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawVariation {
    title: Option<String>,
    description: Option<String>,
    #[serde(alias = "abc")]
    notation: Option<String>,
    difficulty: Option<String>,
    target_tempo: Option<f64>,
    estimated_time: Option<f64>,
    focus_points: Option<Vec<String>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn positive(value: Option<f64>) -> Option<u32> {
    value.filter(|v| *v > 0.0).map(|v| v.round() as u32)
}

/// What a variation falls back to when the model leaves a field out
struct Defaults {
    difficulty: DifficultyLevel,
    tempo: u32,
    seconds: u32,
}

fn defaults(kind: DrillKind, section_level: DifficultyLevel, tempo: u32) -> Defaults {
    match kind {
        DrillKind::Same => Defaults {
            difficulty: section_level,
            tempo,
            seconds: 120,
        },
        DrillKind::Easier => Defaults {
            difficulty: section_level.easier(),
            tempo: tempo.saturating_sub(20).max(60),
            seconds: 90,
        },
        DrillKind::Harder => Defaults {
            difficulty: section_level.harder(),
            tempo: tempo.saturating_add(20),
            seconds: 150,
        },
    }
}

fn build_variation(
    kind: DrillKind,
    raw: Option<RawVariation>,
    section_level: DifficultyLevel,
    tempo: u32,
) -> Result<DrillVariation, EtudeError> {
    let raw = raw.ok_or_else(|| response_error(format!("missing {} variation", kind)))?;
    let missing = |field: &str| response_error(format!("{} variation is missing {}", kind, field));
    let fallback = defaults(kind, section_level, tempo);

    Ok(DrillVariation {
        title: non_empty(raw.title).ok_or_else(|| missing("title"))?,
        description: raw.description.unwrap_or_default(),
        notation: non_empty(raw.notation).ok_or_else(|| missing("notation"))?,
        difficulty: raw
            .difficulty
            .as_deref()
            .and_then(|d| DifficultyLevel::from_str(d).ok())
            .unwrap_or(fallback.difficulty),
        target_tempo: positive(raw.target_tempo).unwrap_or(fallback.tempo),
        estimated_time: positive(raw.estimated_time).unwrap_or(fallback.seconds),
        focus_points: raw.focus_points.unwrap_or_default(),
    })
}

/// Parse a completion into the three drill variations. All three must be
/// present; `section_level` and `tempo` seed the defaults.
pub fn parse_weak_drill_response(
    content: &str,
    section_level: DifficultyLevel,
    tempo: u32,
) -> Result<DrillSet, EtudeError> {
    let candidate = extract_json_candidate(content)?;
    let raw: RawDrillResponse = serde_json::from_str(candidate)
        .map_err(|e| response_error(format!("malformed JSON: {}", e)))?;
    let drills = raw
        .drills
        .ok_or_else(|| response_error("missing drills"))?;

    Ok(DrillSet {
        same: build_variation(DrillKind::Same, drills.same, section_level, tempo)?,
        easier: build_variation(DrillKind::Easier, drills.easier, section_level, tempo)?,
        harder: build_variation(DrillKind::Harder, drills.harder, section_level, tempo)?,
    })
}
