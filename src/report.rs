//! Human-readable feedback on analyzed notation.

use crate::analysis::NotationStatistics;
use crate::instrument::midi_note_name;
use crate::quality::{passes_quality_gate, QUALITY_THRESHOLD};
use serde::Serialize;

/// Concrete suggestions for material with out-of-band statistics
pub fn suggest_improvements(stats: &NotationStatistics) -> Vec<String> {
    let mut suggestions = Vec::new();

    if !stats.range_ok {
        suggestions.push(format!(
            "The pitch range {}-{} leaves the comfortable range for {}. Keep the material inside it.",
            midi_note_name(stats.range_min),
            midi_note_name(stats.range_max),
            stats.instrument
        ));
    }

    if stats.leap_mean > 5.0 {
        suggestions.push(format!(
            "The mean leap is {:.1} semitones. Use more stepwise motion.",
            stats.leap_mean
        ));
    }

    if stats.chromatic_density > 0.4 {
        suggestions.push(format!(
            "{:.0}% of the notes are chromatic. Favour notes of the key.",
            stats.chromatic_density * 100.0
        ));
    }

    if stats.tempo_qpm > 160.0 {
        suggestions.push(format!(
            "A tempo of {} BPM is too fast for practice; 120-140 BPM works better.",
            stats.tempo_qpm
        ));
    } else if stats.tempo_qpm < 60.0 {
        suggestions.push(format!(
            "A tempo of {} BPM is too slow to practice efficiently.",
            stats.tempo_qpm
        ));
    }

    if stats.repetition_ratio < 0.1 {
        suggestions.push(format!(
            "Only {:.0}% of the measures repeat a pattern. Add some repetition to help retention.",
            stats.repetition_ratio * 100.0
        ));
    } else if stats.repetition_ratio > 0.6 {
        suggestions.push(format!(
            "{:.0}% of the measures repeat a pattern. Add variation to keep it from becoming monotonous.",
            stats.repetition_ratio * 100.0
        ));
    }

    if stats.notes_per_measure > 12.0 {
        suggestions.push(format!(
            "{:.1} notes per measure is hard to read. Thin out the texture.",
            stats.notes_per_measure
        ));
    } else if stats.notes_per_measure < 2.0 {
        suggestions.push(format!(
            "{:.1} notes per measure is too sparse to practice efficiently.",
            stats.notes_per_measure
        ));
    }

    if suggestions.is_empty() {
        suggestions.push("The material looks good. No improvements needed.".to_string());
    }

    suggestions
}

/// One sentence per score plus the gate verdict
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreExplanation {
    pub playability: String,
    pub learning_value: String,
    pub overall: String,
}

fn band_text(score: f64, texts: [&str; 4]) -> String {
    let text = if score >= 8.0 {
        texts[0]
    } else if score >= 6.0 {
        texts[1]
    } else if score >= 4.0 {
        texts[2]
    } else {
        texts[3]
    };
    text.to_string()
}

pub fn explain_quality_score(stats: &NotationStatistics) -> ScoreExplanation {
    let playability = band_text(
        stats.playability_score,
        [
            "Very easy to play.",
            "Playable.",
            "Somewhat awkward to play.",
            "Hard to play.",
        ],
    );
    let learning_value = band_text(
        stats.learning_value_score,
        [
            "Very high learning value.",
            "Good learning value.",
            "Somewhat low learning value.",
            "Insufficient learning value.",
        ],
    );
    let overall = if passes_quality_gate(stats, QUALITY_THRESHOLD) {
        "Meets the quality bar and can be published.".to_string()
    } else {
        "Does not meet the quality bar and needs improvement.".to_string()
    };

    ScoreExplanation {
        playability,
        learning_value,
        overall,
    }
}

/// Multi-line statistics report
pub fn explain_analysis(stats: &NotationStatistics) -> String {
    let gate = if passes_quality_gate(stats, QUALITY_THRESHOLD) {
        "Quality gate: passed (publishable)"
    } else {
        "Quality gate: failed (draft only)"
    };

    [
        format!("Instrument: {}", stats.instrument),
        format!("Difficulty: {}", stats.difficulty_level),
        format!("Notes: {}", stats.note_count),
        format!("Measures: {}", stats.measure_count),
        format!("Tempo: {} BPM", stats.tempo_qpm),
        String::new(),
        format!(
            "Range: {}-{} ({} semitones)",
            midi_note_name(stats.range_min),
            midi_note_name(stats.range_max),
            stats.range_span
        ),
        format!(
            "Range comfortable: {}",
            if stats.range_ok { "yes" } else { "no" }
        ),
        format!("Mean leap: {:.1} semitones", stats.leap_mean),
        format!("Largest leap: {} semitones", stats.leap_max),
        format!("Chromatic density: {:.1}%", stats.chromatic_density * 100.0),
        String::new(),
        format!(
            "Repeated patterns: {} ({:.1}% of measures)",
            stats.sequence_count,
            stats.repetition_ratio * 100.0
        ),
        format!("Notes per measure: {:.1}", stats.notes_per_measure),
        String::new(),
        format!("Playability: {:.1}/10", stats.playability_score),
        format!("Learning value: {:.1}/10", stats.learning_value_score),
        String::new(),
        gate.to_string(),
    ]
    .join("\n")
}
