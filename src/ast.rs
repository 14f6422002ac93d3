//! # Tune Types
//!
//! This module defines the parsed form of an ABC tune.
//!
//! ## Type Hierarchy
//! ```text
//! Tune
//!   ├── Header (X index, T title, M meter, L unit length, Q tempo, K key)
//!   └── Vec<Measure>
//!         ├── Vec<Element> (Note | Chord | Rest)
//!         ├── repeat_start/end: bool
//!         ├── ending: Option<u32>
//!         └── key_change: Option<Key>
//! ```
//!
//! ## Pitch System
//! - `C D E F G A B` is the octave starting at middle C (MIDI 60)
//! - `c d e f g a b` is one octave higher (MIDI 72)
//! - Each `'` raises and each `,` lowers by an octave: `c'` = 84, `C,` = 48
//! - Accidentals: `^` sharp, `^^` double sharp, `_` flat, `__` double flat, `=` natural
//! - An explicit accidental holds for the same letter and octave until the next bar line
//! - Notes without an accidental follow the key signature
//!
//! ## Durations
//! Element durations are stored as fractions of a whole note, already resolved
//! against the unit note length, broken rhythms and tuplets in effect.

/// Meter (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meter {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for Meter {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl Meter {
    /// Parse an `M:` field value: `4/4`, `6/8`, `C` (common time), `C|` (cut time).
    /// Returns `None` for `none` (free meter) and for anything unreadable.
    pub fn from_str(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        match trimmed {
            "C" => return Some(Self { beats: 4, beat_type: 4 }),
            "C|" => return Some(Self { beats: 2, beat_type: 2 }),
            _ => {}
        }

        let (beats, beat_type) = trimmed.split_once('/')?;
        let beats: u8 = beats.trim().parse().ok()?;
        let beat_type: u8 = beat_type.trim().parse().ok()?;
        if beats == 0 || beat_type == 0 {
            return None;
        }
        Some(Self { beats, beat_type })
    }

    /// Length of one measure as a fraction of a whole note
    pub fn as_fraction(&self) -> f64 {
        self.beats as f64 / self.beat_type as f64
    }
}

/// Modes accepted in a `K:` field
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
}

impl Mode {
    fn from_str(s: &str) -> Option<Self> {
        let lower = s.to_ascii_lowercase();
        if lower.is_empty() {
            return Some(Mode::Major);
        }
        if lower == "m" {
            return Some(Mode::Minor);
        }
        // ABC only looks at the first three letters: "min", "minor", "mixolydian"...
        let prefix: String = lower.chars().take(3).collect();
        match prefix.as_str() {
            "maj" | "ion" => Some(Mode::Major),
            "min" | "aeo" => Some(Mode::Minor),
            "dor" => Some(Mode::Dorian),
            "phr" => Some(Mode::Phrygian),
            "lyd" => Some(Mode::Lydian),
            "mix" => Some(Mode::Mixolydian),
            "loc" => Some(Mode::Locrian),
            _ => None,
        }
    }

    /// Fifths offset relative to the major key on the same tonic
    fn fifths_offset(&self) -> i8 {
        match self {
            Mode::Lydian => 1,
            Mode::Major => 0,
            Mode::Mixolydian => -1,
            Mode::Dorian => -2,
            Mode::Minor => -3,
            Mode::Phrygian => -4,
            Mode::Locrian => -5,
        }
    }
}

/// Key signature (number of sharps/flats)
/// Positive = sharps, Negative = flats, Zero = C major / A minor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Key {
    pub fifths: i8, // -7 to +7 (flats to sharps)
    pub mode: Mode,
}

/// Order in which sharps are added to a key signature; flats use the reverse
const SHARP_ORDER: [NoteName; 7] = [
    NoteName::F,
    NoteName::C,
    NoteName::G,
    NoteName::D,
    NoteName::A,
    NoteName::E,
    NoteName::B,
];

impl Key {
    /// Parse a `K:` field value like "G", "Bb", "F#m", "Amin", "D dorian", "Cmaj".
    /// Trailing clef and octave modifiers ("clef=treble") are ignored.
    /// "none" and "HP" map to C major.
    pub fn from_str(s: &str) -> Option<Self> {
        let mut words = s.split_whitespace();
        let first = match words.next() {
            Some(w) => w,
            None => return Some(Self::default()),
        };

        if first.eq_ignore_ascii_case("none") || first == "HP" || first == "Hp" {
            return Some(Self::default());
        }

        let mut chars = first.chars();
        let letter_fifths: i8 = match chars.next()? {
            'F' => -1,
            'C' => 0,
            'G' => 1,
            'D' => 2,
            'A' => 3,
            'E' => 4,
            'B' => 5,
            _ => return None,
        };

        let rest = chars.as_str();
        let (accidental_fifths, mode_text) = if let Some(stripped) = rest.strip_prefix('#') {
            (7, stripped)
        } else if let Some(stripped) = rest.strip_prefix('b') {
            (-7, stripped)
        } else {
            (0, rest)
        };

        // "A minor" spells the mode as a separate word
        let mode = if mode_text.is_empty() {
            match words.next() {
                Some(word) if !word.contains('=') => Mode::from_str(word).unwrap_or_default(),
                _ => Mode::Major,
            }
        } else {
            Mode::from_str(mode_text)?
        };

        let fifths = letter_fifths + accidental_fifths + mode.fifths_offset();
        if !(-7..=7).contains(&fifths) {
            return None;
        }
        Some(Self { fifths, mode })
    }

    /// Semitone alteration the key signature applies to a letter (-1, 0 or +1).
    pub fn alteration_for(&self, note: NoteName) -> i8 {
        if self.fifths > 0 {
            let sharped = &SHARP_ORDER[..self.fifths as usize];
            if sharped.contains(&note) {
                return 1;
            }
        } else if self.fifths < 0 {
            let mut flatted = SHARP_ORDER.iter().rev().take(self.fifths.unsigned_abs() as usize);
            if flatted.any(|n| *n == note) {
                return -1;
            }
        }
        0
    }
}

/// Tempo from a `Q:` field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    pub bpm: u16,                  // Beats per minute at the beat unit
    pub unit: Option<(u16, u16)>,  // Beat unit as a fraction ("1/4", "3/8"); None for bare BPM
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120, unit: None }
    }
}

impl Tempo {
    /// Parse `1/4=120`, `3/8=80`, `"Allegro" 1/4=132` or a bare `120`.
    pub fn from_str(s: &str) -> Option<Self> {
        // Drop quoted tempo text
        let mut unquoted = String::new();
        let mut in_quote = false;
        for c in s.chars() {
            if c == '"' {
                in_quote = !in_quote;
            } else if !in_quote {
                unquoted.push(c);
            }
        }
        let trimmed = unquoted.trim();

        if let Some((unit, bpm)) = trimmed.split_once('=') {
            let bpm: u16 = bpm.trim().parse().ok()?;
            // Only the first beat unit matters ("1/4 1/8=..." is rare)
            let unit = unit.split_whitespace().next().and_then(parse_fraction);
            return Some(Self { bpm, unit });
        }

        let bpm: u16 = trimmed.parse().ok()?;
        Some(Self { bpm, unit: None })
    }

    /// Convert to quarter-note BPM.
    /// A bare BPM is taken as quarter notes per minute; `3/8=80` becomes 120.
    pub fn to_quarter_note_bpm(&self) -> f64 {
        match self.unit {
            Some((num, den)) if den > 0 => self.bpm as f64 * 4.0 * num as f64 / den as f64,
            _ => self.bpm as f64,
        }
    }
}

/// Parse "1/8" into (1, 8)
pub fn parse_fraction(s: &str) -> Option<(u16, u16)> {
    let (num, den) = s.trim().split_once('/')?;
    let num: u16 = num.trim().parse().ok()?;
    let den: u16 = den.trim().parse().ok()?;
    if num == 0 || den == 0 {
        return None;
    }
    Some((num, den))
}

/// Tune header fields
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub index: Option<u32>,
    pub title: Option<String>,
    pub meter: Option<Meter>,
    pub unit_length: Option<(u16, u16)>,
    pub tempo: Option<Tempo>,
    pub key: Option<Key>,
}

impl Header {
    /// Default note length: explicit `L:`, else 1/16 for meters below 3/4, else 1/8.
    pub fn unit_length(&self) -> f64 {
        if let Some((num, den)) = self.unit_length {
            return num as f64 / den as f64;
        }
        match self.meter {
            Some(meter) if meter.as_fraction() < 0.75 => 1.0 / 16.0,
            _ => 1.0 / 8.0,
        }
    }

    pub fn key(&self) -> Key {
        self.key.unwrap_or_default()
    }
}

/// Note letters C through B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NoteName {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    /// Semitones above C
    pub fn semitone(&self) -> i8 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }
}

/// Explicit accidentals written before a note
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accidental {
    DoubleSharp, // ^^
    Sharp,       // ^
    Natural,     // =
    Flat,        // _
    DoubleFlat,  // __
}

impl Accidental {
    pub fn semitones(&self) -> i8 {
        match self {
            Accidental::DoubleSharp => 2,
            Accidental::Sharp => 1,
            Accidental::Natural => 0,
            Accidental::Flat => -1,
            Accidental::DoubleFlat => -2,
        }
    }
}

/// A single pitched note
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub name: NoteName,
    pub accidental: Option<Accidental>,
    pub octave: i8,     // 0 = middle-C octave, c = 1, c' = 2, C, = -1
    pub duration: f64,  // Fraction of a whole note
    pub tie_start: bool,
}

impl Note {
    /// Returns the MIDI note number given the alteration in force for this note
    /// (explicit, carried from earlier in the bar, or from the key signature).
    pub fn to_midi_note(&self, alteration: i8) -> i16 {
        60 + 12 * self.octave as i16 + self.name.semitone() as i16 + alteration as i16
    }
}

/// Element of a measure
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Note(Note),
    Chord { notes: Vec<Note>, duration: f64 },
    Rest { duration: f64 },
}

impl Element {
    pub fn duration(&self) -> f64 {
        match self {
            Element::Note(note) => note.duration,
            Element::Chord { duration, .. } | Element::Rest { duration } => *duration,
        }
    }

    /// Stretch or shrink the element (broken rhythms, tuplets)
    pub fn scale_duration(&mut self, factor: f64) {
        match self {
            Element::Note(note) => note.duration *= factor,
            Element::Chord { notes, duration } => {
                *duration *= factor;
                for note in notes {
                    note.duration *= factor;
                }
            }
            Element::Rest { duration } => *duration *= factor,
        }
    }

    /// Pitched notes sounding in this element
    pub fn notes(&self) -> &[Note] {
        match self {
            Element::Note(note) => std::slice::from_ref(note),
            Element::Chord { notes, .. } => notes,
            Element::Rest { .. } => &[],
        }
    }
}

/// A measure between two bar lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measure {
    pub elements: Vec<Element>,
    pub repeat_start: bool,
    pub repeat_end: bool,
    pub ending: Option<u32>,
    pub key_change: Option<Key>,
}

impl Measure {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// A parsed tune
#[derive(Debug, Clone, Default)]
pub struct Tune {
    pub header: Header,
    pub measures: Vec<Measure>,
}
