//! # Instrument Profiles
//!
//! Pitch bands and difficulty coefficients per instrument.
//!
//! Every profile carries two MIDI bands: the full playable range and the
//! comfortable range a student can be expected to handle in a practice
//! exercise. Only the comfortable band feeds `range_ok`.
//!
//! The coefficients scale how hard the same tempo or the same mean leap is on
//! a given instrument. A trumpet player hitting 120 BPM is doing more work
//! than a pianist at 120 BPM, so tempo and leaps are multiplied by the
//! coefficient before the playability penalty tiers are applied.
//!
//! Names are matched case-insensitively with whitespace folded to `_`
//! ("French Horn" → `french_horn`). Unknown instruments get a generic profile.

/// Pitch bands and difficulty coefficients for one instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentProfile {
    pub name: &'static str,
    pub full_min: i16,
    pub full_max: i16,
    pub comfortable_min: i16,
    pub comfortable_max: i16,
    pub tempo_coefficient: f64,
    pub leap_coefficient: f64,
}

impl InstrumentProfile {
    const fn new(
        name: &'static str,
        (full_min, full_max): (i16, i16),
        (comfortable_min, comfortable_max): (i16, i16),
        tempo_coefficient: f64,
        leap_coefficient: f64,
    ) -> Self {
        Self {
            name,
            full_min,
            full_max,
            comfortable_min,
            comfortable_max,
            tempo_coefficient,
            leap_coefficient,
        }
    }

    /// True when the whole pitch span lies inside the comfortable band
    pub fn is_comfortable(&self, lowest: i16, highest: i16) -> bool {
        lowest >= self.comfortable_min && highest <= self.comfortable_max
    }
}

/// Profile used for instruments not in the table
pub const GENERIC_PROFILE: InstrumentProfile =
    InstrumentProfile::new("generic", (40, 88), (48, 84), 1.0, 1.0);

const PROFILES: &[InstrumentProfile] = &[
    // Keyboards
    InstrumentProfile::new("piano", (21, 108), (40, 88), 1.0, 1.0),
    InstrumentProfile::new("keyboard", (21, 108), (40, 88), 1.0, 1.0),
    InstrumentProfile::new("organ", (21, 108), (36, 96), 1.0, 1.0),
    // Strings
    InstrumentProfile::new("guitar", (40, 84), (40, 76), 1.2, 1.3),
    InstrumentProfile::new("bass", (28, 67), (28, 60), 1.1, 1.2),
    InstrumentProfile::new("violin", (55, 103), (55, 91), 1.3, 1.4),
    InstrumentProfile::new("viola", (48, 91), (48, 84), 1.3, 1.4),
    InstrumentProfile::new("cello", (36, 84), (36, 76), 1.2, 1.3),
    InstrumentProfile::new("ukulele", (60, 84), (60, 81), 1.1, 1.2),
    // Winds and brass
    InstrumentProfile::new("trumpet", (55, 82), (60, 79), 1.4, 1.5),
    InstrumentProfile::new("trombone", (40, 72), (46, 67), 1.3, 1.4),
    InstrumentProfile::new("french_horn", (41, 77), (46, 72), 1.5, 1.6),
    InstrumentProfile::new("tuba", (28, 58), (33, 53), 1.3, 1.3),
    InstrumentProfile::new("flute", (60, 96), (60, 91), 1.2, 1.3),
    InstrumentProfile::new("clarinet", (50, 91), (50, 84), 1.2, 1.3),
    InstrumentProfile::new("saxophone", (49, 87), (54, 82), 1.3, 1.4),
    InstrumentProfile::new("oboe", (58, 91), (58, 84), 1.3, 1.4),
    // Percussion
    InstrumentProfile::new("drums", (36, 81), (36, 81), 1.5, 0.5),
    InstrumentProfile::new("percussion", (48, 84), (48, 84), 1.4, 0.5),
    // Voice
    InstrumentProfile::new("vocal", (48, 84), (55, 79), 1.3, 1.5),
];

/// Fold an instrument name to its table key: "French Horn" → "french_horn"
pub fn normalize_name(instrument: &str) -> String {
    instrument
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Look up an instrument, falling back to the generic profile
pub fn lookup(instrument: &str) -> &'static InstrumentProfile {
    let key = normalize_name(instrument);
    PROFILES
        .iter()
        .find(|p| p.name == key)
        .unwrap_or(&GENERIC_PROFILE)
}

/// Tempo achievement in percent after the instrument coefficient, capped at 100
pub fn adjusted_tempo_rate(achieved: f64, target: f64, instrument: &str) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    let rate = achieved / target * lookup(instrument).tempo_coefficient;
    (rate * 100.0).min(100.0)
}

/// Mean leap scaled by the instrument's leap coefficient
pub fn adjusted_leap(leap_mean: f64, instrument: &str) -> f64 {
    leap_mean * lookup(instrument).leap_coefficient
}

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Scientific pitch name for a MIDI note: 60 → "C4", 21 → "A0"
pub fn midi_note_name(midi: i16) -> String {
    let octave = midi.div_euclid(12) - 1;
    let name = PITCH_CLASS_NAMES[midi.rem_euclid(12) as usize];
    format!("{}{}", name, octave)
}
