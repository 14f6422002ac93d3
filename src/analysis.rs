//! # Notation Statistics
//!
//! Turns ABC text into a flat statistics record and the two quality scores.
//!
//! ## Pitch sequence
//! Every sounding pitch in order, chord members included, as MIDI numbers.
//! The alteration of a note is, in order of precedence:
//! 1. its own accidental
//! 2. an accidental written earlier in the same measure on the same letter and octave
//! 3. the key signature in force (the header key, replaced by any `K:` change)
//!
//! A note is chromatic when that alteration differs from what the key
//! signature alone would give it.
//!
//! ## Repetition
//! Four-note windows over the pitch sequence. A window that occurs at least
//! twice is a repeated group; `sequence_count` is the number of distinct
//! repeated groups and `repetition_ratio` the share of measures touched by
//! any occurrence of one.
//!
//! ## Difficulty
//! Points from lookup tables over range span, mean leap, note density, tempo
//! and chromatic density. Six or more points is advanced, three or more
//! intermediate. Each table only ever adds points as its metric grows.

use crate::ast::{Key, NoteName, Tune};
use crate::error::EtudeError;
use crate::instrument;
use crate::parser::parse_lenient;
use crate::scoring::{learning_value_score, playability_score};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Tempo assumed when the tune has no `Q:` field
pub const DEFAULT_TEMPO_QPM: f64 = 120.0;

/// Leaps of this many semitones or more (a fourth) are counted as large
pub const LARGE_LEAP: u32 = 5;

const REPETITION_WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
        }
    }

    /// One level down, staying at beginner
    pub fn easier(&self) -> Self {
        match self {
            DifficultyLevel::Advanced => DifficultyLevel::Intermediate,
            _ => DifficultyLevel::Beginner,
        }
    }

    /// One level up, staying at advanced
    pub fn harder(&self) -> Self {
        match self {
            DifficultyLevel::Beginner => DifficultyLevel::Intermediate,
            _ => DifficultyLevel::Advanced,
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(DifficultyLevel::Beginner),
            "intermediate" => Ok(DifficultyLevel::Intermediate),
            "advanced" => Ok(DifficultyLevel::Advanced),
            other => Err(format!(
                "unknown difficulty '{}' (expected beginner, intermediate or advanced)",
                other
            )),
        }
    }
}

/// Objective statistics and quality scores for one tune
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotationStatistics {
    pub note_count: usize,
    pub measure_count: usize,
    pub unique_pitches: usize,

    pub range_min: i16,
    pub range_max: i16,
    pub range_span: i16,
    /// Whole range inside the instrument's comfortable band
    pub range_ok: bool,

    pub leap_mean: f64,
    pub leap_max: u32,
    /// Leaps of a fourth (5 semitones) or more
    pub leap_count: usize,

    pub chromatic_density: f64,
    pub notes_per_measure: f64,

    pub repetition_ratio: f64,
    pub sequence_count: usize,

    pub tempo_qpm: f64,

    pub instrument: String,
    pub difficulty_level: DifficultyLevel,
    pub playability_score: f64,
    pub learning_value_score: f64,
}

/// One sounding pitch and where it sits
#[derive(Debug, Clone, Copy)]
struct Pitch {
    midi: i16,
    measure: usize,
    chromatic: bool,
}

/// Resolve every note of the tune to a MIDI pitch, applying the key
/// signature and accidentals carried through each measure
fn collect_pitches(tune: &Tune) -> Vec<Pitch> {
    let mut pitches = Vec::new();
    let mut key: Key = tune.header.key();

    for (index, measure) in tune.measures.iter().enumerate() {
        if let Some(change) = measure.key_change {
            key = change;
        }
        let mut carried: HashMap<(NoteName, i8), i8> = HashMap::new();

        for element in &measure.elements {
            for note in element.notes() {
                let signature = key.alteration_for(note.name);
                let alteration = match note.accidental {
                    Some(accidental) => {
                        let semitones = accidental.semitones();
                        carried.insert((note.name, note.octave), semitones);
                        semitones
                    }
                    None => carried
                        .get(&(note.name, note.octave))
                        .copied()
                        .unwrap_or(signature),
                };

                pitches.push(Pitch {
                    midi: note.to_midi_note(alteration),
                    measure: index,
                    chromatic: alteration != signature,
                });
            }
        }
    }

    pitches
}

/// Absolute intervals between consecutive pitches, repeated notes excluded
fn leaps(midi: &[i16]) -> Vec<u32> {
    midi.windows(2)
        .map(|pair| (pair[1] - pair[0]).unsigned_abs() as u32)
        .filter(|&leap| leap > 0)
        .collect()
}

/// (repetition_ratio, sequence_count)
fn analyze_repetition(pitches: &[Pitch], measure_count: usize) -> (f64, usize) {
    if pitches.len() < REPETITION_WINDOW {
        return (0.0, 0);
    }

    let midi: Vec<i16> = pitches.iter().map(|p| p.midi).collect();
    let mut occurrences: HashMap<&[i16], Vec<usize>> = HashMap::new();
    for (start, window) in midi.windows(REPETITION_WINDOW).enumerate() {
        occurrences.entry(window).or_default().push(start);
    }

    let mut sequence_count = 0;
    let mut covered: BTreeSet<usize> = BTreeSet::new();
    for starts in occurrences.values().filter(|starts| starts.len() >= 2) {
        sequence_count += 1;
        for &start in starts {
            covered.extend(pitches[start..start + REPETITION_WINDOW].iter().map(|p| p.measure));
        }
    }

    let ratio = (covered.len() as f64 / measure_count.max(1) as f64).min(1.0);
    (ratio, sequence_count)
}

/// (threshold, points): points from the first threshold the value exceeds
type PointTable = [(f64, u32); 2];

const RANGE_POINTS: PointTable = [(24.0, 2), (12.0, 1)];
const LEAP_POINTS: PointTable = [(5.0, 2), (3.0, 1)];
const DENSITY_POINTS: PointTable = [(8.0, 2), (4.0, 1)];
const TEMPO_POINTS: PointTable = [(140.0, 2), (100.0, 1)];
const CHROMATIC_POINTS: PointTable = [(0.4, 2), (0.2, 1)];

const ADVANCED_POINTS: u32 = 6;
const INTERMEDIATE_POINTS: u32 = 3;

fn points(value: f64, table: &PointTable) -> u32 {
    table
        .iter()
        .find(|(threshold, _)| value > *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

/// Estimate the difficulty level from the headline metrics
pub fn estimate_difficulty(
    range_span: i16,
    leap_mean: f64,
    notes_per_measure: f64,
    tempo_qpm: f64,
    chromatic_density: f64,
) -> DifficultyLevel {
    let total = points(range_span as f64, &RANGE_POINTS)
        + points(leap_mean, &LEAP_POINTS)
        + points(notes_per_measure, &DENSITY_POINTS)
        + points(tempo_qpm, &TEMPO_POINTS)
        + points(chromatic_density, &CHROMATIC_POINTS);

    if total >= ADVANCED_POINTS {
        DifficultyLevel::Advanced
    } else if total >= INTERMEDIATE_POINTS {
        DifficultyLevel::Intermediate
    } else {
        DifficultyLevel::Beginner
    }
}

/// Analyze a tune, returning the reason when no statistics can be produced.
pub fn try_analyze(
    text: &str,
    instrument: &str,
    target: Option<DifficultyLevel>,
) -> Result<NotationStatistics, EtudeError> {
    let tune = parse_lenient(text)?;
    let pitches = collect_pitches(&tune);
    if pitches.is_empty() {
        return Err(EtudeError::ParseError {
            line: 1,
            column: 1,
            message: "No notes found".to_string(),
        });
    }

    let midi: Vec<i16> = pitches.iter().map(|p| p.midi).collect();
    let note_count = midi.len();
    let measure_count = tune.measures.len().max(1);
    let unique_pitches = midi.iter().collect::<BTreeSet<_>>().len();

    let range_min = midi.iter().copied().min().unwrap_or_default();
    let range_max = midi.iter().copied().max().unwrap_or_default();
    let range_span = range_max - range_min;
    let range_ok = instrument::lookup(instrument).is_comfortable(range_min, range_max);

    let leaps = leaps(&midi);
    let leap_mean = if leaps.is_empty() {
        0.0
    } else {
        leaps.iter().sum::<u32>() as f64 / leaps.len() as f64
    };
    let leap_max = leaps.iter().copied().max().unwrap_or(0);
    let leap_count = leaps.iter().filter(|&&leap| leap >= LARGE_LEAP).count();

    let chromatic_density =
        pitches.iter().filter(|p| p.chromatic).count() as f64 / note_count as f64;
    let notes_per_measure = note_count as f64 / measure_count as f64;

    let (repetition_ratio, sequence_count) = analyze_repetition(&pitches, measure_count);

    let tempo_qpm = tune
        .header
        .tempo
        .map(|tempo| tempo.to_quarter_note_bpm())
        .unwrap_or(DEFAULT_TEMPO_QPM);

    let difficulty_level = estimate_difficulty(
        range_span,
        leap_mean,
        notes_per_measure,
        tempo_qpm,
        chromatic_density,
    );
    let playability =
        playability_score(range_ok, leap_mean, chromatic_density, tempo_qpm, instrument);
    let learning_value = learning_value_score(
        playability,
        repetition_ratio,
        sequence_count,
        notes_per_measure,
        difficulty_level,
        target,
    );

    debug!(
        note_count,
        measure_count,
        difficulty = %difficulty_level,
        playability,
        learning_value,
        "analyzed notation"
    );

    Ok(NotationStatistics {
        note_count,
        measure_count,
        unique_pitches,
        range_min,
        range_max,
        range_span,
        range_ok,
        leap_mean,
        leap_max,
        leap_count,
        chromatic_density,
        notes_per_measure,
        repetition_ratio,
        sequence_count,
        tempo_qpm,
        instrument: instrument.to_string(),
        difficulty_level,
        playability_score: playability,
        learning_value_score: learning_value,
    })
}

/// Analyze a tune for an instrument. Returns `None` (after logging a warning)
/// for empty or unreadable notation.
pub fn analyze(text: &str, instrument: &str) -> Option<NotationStatistics> {
    log_absence(try_analyze(text, instrument, None))
}

/// Like [`analyze`], with the learning value rewarding a match with `target`.
pub fn analyze_with_target(
    text: &str,
    instrument: &str,
    target: DifficultyLevel,
) -> Option<NotationStatistics> {
    log_absence(try_analyze(text, instrument, Some(target)))
}

fn log_absence(result: Result<NotationStatistics, EtudeError>) -> Option<NotationStatistics> {
    match result {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "could not analyze notation");
            None
        }
    }
}
