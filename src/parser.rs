use crate::ast::*;
use crate::error::EtudeError;
use crate::lexer::{Lexer, LocatedToken, Token};
use tracing::debug;

/// How header values that cannot be read are treated
#[derive(Debug, Clone, Copy, PartialEq)]
enum Strictness {
    /// Any unreadable header value is an error
    Strict,
    /// Unreadable header values fall back to their defaults
    Lenient,
}

/// Tuplet in progress: how many notes remain and the length factor applied to each
struct TupletContext {
    remaining: u32,
    factor: f64,
}

/// Parser for an ABC tune body
pub struct Parser {
    tokens: Vec<LocatedToken>,
    position: usize,
    strictness: Strictness,
    unit_length: f64,
    measures: Vec<Measure>,
    current: Measure,
    tuplet: Option<TupletContext>,
    broken_next: Option<f64>,
    /// First readable `Q:` met in the body
    tempo: Option<Tempo>,
}

/// Measures of a tune body and any tempo it declares
struct Body {
    measures: Vec<Measure>,
    tempo: Option<Tempo>,
}

impl Parser {
    fn new(tokens: Vec<LocatedToken>, unit_length: f64, strictness: Strictness) -> Self {
        Self {
            tokens,
            position: 0,
            strictness,
            unit_length,
            measures: Vec::new(),
            current: Measure::default(),
            tuplet: None,
            broken_next: None,
            tempo: None,
        }
    }

    fn current_token(&self) -> Option<&LocatedToken> {
        self.tokens.get(self.position)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.current_token().map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<LocatedToken> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn error_here(&self, message: impl Into<String>) -> EtudeError {
        let (line, column) = self
            .current_token()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        EtudeError::ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Parse the note stream into measures
    fn parse_body(mut self) -> Result<Body, EtudeError> {
        while let Some(located) = self.advance() {
            match located.token {
                Token::Note(_)
                | Token::DoubleSharp
                | Token::Sharp
                | Token::Natural
                | Token::Flat
                | Token::DoubleFlat => {
                    self.position -= 1;
                    let note = self.parse_note()?;
                    self.push_element(Element::Note(note));
                }
                Token::Rest => {
                    let duration = self.parse_length() * self.unit_length;
                    self.push_element(Element::Rest { duration });
                }
                Token::ChordStart => {
                    let chord = self.parse_chord()?;
                    self.push_element(chord);
                }
                Token::Bar => self.close_measure(false),
                Token::RepeatStart => self.close_measure(true),
                Token::RepeatEnd => {
                    self.current.repeat_end = true;
                    self.close_measure(false);
                }
                Token::RepeatBoth => {
                    self.current.repeat_end = true;
                    self.close_measure(true);
                }
                Token::Ending(n) => self.current.ending = Some(n),
                Token::Tuplet(p) => {
                    if p > 1 {
                        self.tuplet = Some(TupletContext {
                            remaining: p,
                            factor: tuplet_time(p) as f64 / p as f64,
                        });
                    }
                }
                Token::BrokenRight(n) => self.apply_broken_rhythm(n, true),
                Token::BrokenLeft(n) => self.apply_broken_rhythm(n, false),
                Token::Field(letter, value) => self.apply_body_field(letter, &value)?,
                token @ (Token::OctaveUp | Token::OctaveDown | Token::ChordEnd) => {
                    return Err(EtudeError::ParseError {
                        line: located.line,
                        column: located.column,
                        message: format!("Unexpected {:?} outside of a note", token),
                    });
                }
                // Slurs, stray ties and lengths, spacing: no effect on pitch statistics
                Token::LeftParen
                | Token::RightParen
                | Token::Tie
                | Token::Number(_)
                | Token::Slash
                | Token::Newline
                | Token::Whitespace => {}
            }
        }

        self.close_measure(false);
        Ok(Body {
            measures: self.measures,
            tempo: self.tempo,
        })
    }

    fn parse_accidental(&mut self) -> Option<Accidental> {
        let accidental = match self.peek_token()? {
            Token::DoubleSharp => Accidental::DoubleSharp,
            Token::Sharp => Accidental::Sharp,
            Token::Natural => Accidental::Natural,
            Token::Flat => Accidental::Flat,
            Token::DoubleFlat => Accidental::DoubleFlat,
            _ => return None,
        };
        self.advance();
        Some(accidental)
    }

    /// Parse accidental + letter + octave marks + length (+ tie)
    fn parse_note(&mut self) -> Result<Note, EtudeError> {
        let accidental = self.parse_accidental();

        let letter = match self.peek_token() {
            Some(Token::Note(c)) => *c,
            _ => return Err(self.error_here("Accidental must be followed by a note")),
        };
        self.advance();

        let name = NoteName::from_char(letter)
            .ok_or_else(|| self.error_here(format!("Invalid note letter '{}'", letter)))?;
        let mut octave: i8 = if letter.is_ascii_lowercase() { 1 } else { 0 };
        while let Some(token) = self.peek_token() {
            match token {
                Token::OctaveUp => octave = octave.saturating_add(1),
                Token::OctaveDown => octave = octave.saturating_sub(1),
                _ => break,
            }
            self.advance();
        }

        let duration = self.parse_length() * self.unit_length;

        let tie_start = matches!(self.peek_token(), Some(Token::Tie));
        if tie_start {
            self.advance();
        }

        Ok(Note {
            name,
            accidental,
            octave,
            duration,
            tie_start,
        })
    }

    /// Parse `[CEG]2`; the opening bracket has been consumed
    fn parse_chord(&mut self) -> Result<Element, EtudeError> {
        let mut notes = Vec::new();
        loop {
            match self.peek_token() {
                Some(Token::ChordEnd) => {
                    self.advance();
                    break;
                }
                Some(Token::Note(_))
                | Some(Token::DoubleSharp)
                | Some(Token::Sharp)
                | Some(Token::Natural)
                | Some(Token::Flat)
                | Some(Token::DoubleFlat) => notes.push(self.parse_note()?),
                Some(Token::Whitespace) | Some(Token::Tie) => {
                    self.advance();
                }
                Some(other) => {
                    let message = format!("Unexpected {:?} inside chord", other);
                    return Err(self.error_here(message));
                }
                None => return Err(self.error_here("Unterminated chord")),
            }
        }

        // Outer length multiplies the length written on the notes
        let factor = self.parse_length();
        for note in notes.iter_mut() {
            note.duration *= factor;
        }
        let duration = notes.first().map(|n| n.duration).unwrap_or(0.0);
        Ok(Element::Chord { notes, duration })
    }

    /// Length multiplier: `2`, `/`, `//`, `3/2`, `/4`
    fn parse_length(&mut self) -> f64 {
        let mut numerator = 1.0;
        if let Some(Token::Number(n)) = self.peek_token() {
            numerator = (*n).max(1) as f64;
            self.advance();
        }

        let mut denominator = 1.0;
        while let Some(Token::Slash) = self.peek_token() {
            self.advance();
            if let Some(Token::Number(d)) = self.peek_token() {
                denominator *= (*d).max(1) as f64;
                self.advance();
            } else {
                denominator *= 2.0;
            }
        }

        numerator / denominator
    }

    fn push_element(&mut self, mut element: Element) {
        if let Some(factor) = self.broken_next.take() {
            element.scale_duration(factor);
        }
        if let Some(tuplet) = self.tuplet.as_mut() {
            element.scale_duration(tuplet.factor);
            tuplet.remaining -= 1;
            if tuplet.remaining == 0 {
                self.tuplet = None;
            }
        }
        self.current.elements.push(element);
    }

    /// `A>B` dots the first note and halves the second; `A<B` the reverse
    fn apply_broken_rhythm(&mut self, count: u8, first_longer: bool) {
        let short = 0.5f64.powi(count.max(1) as i32);
        let long = 2.0 - short;
        let (previous, next) = if first_longer { (long, short) } else { (short, long) };
        if let Some(last) = self.current.elements.last_mut() {
            last.scale_duration(previous);
        }
        self.broken_next = Some(next);
    }

    fn apply_body_field(&mut self, letter: char, value: &str) -> Result<(), EtudeError> {
        match letter {
            'K' => {
                if let Some(key) = read_field(self.strictness, "key", value, Key::from_str)? {
                    self.current.key_change = Some(key);
                }
            }
            'L' => {
                if let Some((num, den)) =
                    read_field(self.strictness, "unit note length", value, parse_fraction)?
                {
                    self.unit_length = num as f64 / den as f64;
                }
            }
            'Q' => {
                if self.tempo.is_none() {
                    self.tempo = read_field(self.strictness, "tempo", value, Tempo::from_str)?;
                }
            }
            // Meter, lyrics and other fields do not change pitch content
            _ => {}
        }
        Ok(())
    }

    fn close_measure(&mut self, next_starts_repeat: bool) {
        if self.current.is_empty() {
            // Nothing to close: keep markers for the next measure
            self.current.repeat_start |= next_starts_repeat;
            return;
        }
        let finished = std::mem::take(&mut self.current);
        self.measures.push(finished);
        self.current.repeat_start = next_starts_repeat;
    }
}

/// How many notes' time a tuplet of `p` notes takes
fn tuplet_time(p: u32) -> u32 {
    match p {
        2 | 4 | 8 => 3,
        _ => 2,
    }
}

/// Read a header value, turning failures into errors or logged defaults
fn read_field<T>(
    strictness: Strictness,
    name: &str,
    value: &str,
    read: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, EtudeError> {
    match read(value) {
        Some(parsed) => Ok(Some(parsed)),
        None if strictness == Strictness::Strict => Err(EtudeError::HeaderError(format!(
            "invalid {}: '{}'",
            name, value
        ))),
        None => {
            debug!(field = name, value, "ignoring unreadable header value");
            Ok(None)
        }
    }
}

/// Header lines and where the body begins
pub(crate) struct SplitTune<'a> {
    pub(crate) fields: Vec<(char, &'a str)>,
    pub(crate) body: &'a str,
    pub(crate) body_line: usize,
}

pub(crate) fn is_field_line(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Split the header from the note stream. The header ends after the `K:`
/// field, or at the first line that is not a field.
pub(crate) fn split_header(source: &str) -> SplitTune<'_> {
    let mut fields = Vec::new();
    let mut offset = 0;
    let mut line_number = 1;

    for raw_line in source.split_inclusive('\n') {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('%') {
            offset += raw_line.len();
            line_number += 1;
            continue;
        }
        if !is_field_line(line) {
            break;
        }

        let mut chars = line.chars();
        let letter = chars.next().unwrap_or(' ');
        chars.next(); // ':'
        fields.push((letter, chars.as_str().trim()));
        offset += raw_line.len();
        line_number += 1;

        if letter == 'K' {
            break;
        }
    }

    SplitTune {
        fields,
        body: &source[offset..],
        body_line: line_number,
    }
}

fn parse_header(fields: &[(char, &str)], strictness: Strictness) -> Result<Header, EtudeError> {
    let mut header = Header::default();

    for &(letter, value) in fields {
        match letter {
            'X' => header.index = read_field(strictness, "index", value, |v| v.parse().ok())?,
            'T' => {
                if header.title.is_none() && !value.is_empty() {
                    header.title = Some(value.to_string());
                }
            }
            'M' => {
                if value.eq_ignore_ascii_case("none") {
                    header.meter = None;
                } else {
                    header.meter = read_field(strictness, "meter", value, Meter::from_str)?;
                }
            }
            'L' => {
                header.unit_length =
                    read_field(strictness, "unit note length", value, parse_fraction)?
            }
            'Q' => header.tempo = read_field(strictness, "tempo", value, Tempo::from_str)?,
            'K' => header.key = read_field(strictness, "key", value, Key::from_str)?,
            _ => {}
        }
    }

    Ok(header)
}

fn parse_with(source: &str, strictness: Strictness) -> Result<Tune, EtudeError> {
    let split = split_header(source);
    let mut header = parse_header(&split.fields, strictness)?;

    let mut lexer = Lexer::starting_at_line(split.body, split.body_line);
    let tokens = lexer.tokenize()?;
    let body = Parser::new(tokens, header.unit_length(), strictness).parse_body()?;

    // A tempo written after K: still counts when the header has none
    if header.tempo.is_none() {
        header.tempo = body.tempo;
    }

    Ok(Tune {
        header,
        measures: body.measures,
    })
}

/// Parse ABC source into a Tune. Unreadable header values are errors.
pub fn parse(source: &str) -> Result<Tune, EtudeError> {
    parse_with(source, Strictness::Strict)
}

/// Parse ABC source, falling back to defaults for unreadable header values.
/// Errors in the note stream are still reported.
pub fn parse_lenient(source: &str) -> Result<Tune, EtudeError> {
    parse_with(source, Strictness::Lenient)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: &str = "X:1
T:C Major Scale
M:4/4
L:1/4
Q:1/4=120
K:Cmaj
C D E F | G A B c | c B A G | F E D C |";

    fn notes_of(measure: &Measure) -> Vec<&Note> {
        measure.elements.iter().flat_map(|e| e.notes()).collect()
    }

    #[test]
    fn test_header_fields() {
        let tune = parse(SCALE).unwrap();
        assert_eq!(tune.header.index, Some(1));
        assert_eq!(tune.header.title, Some("C Major Scale".to_string()));
        assert_eq!(tune.header.meter, Some(Meter { beats: 4, beat_type: 4 }));
        assert_eq!(tune.header.unit_length, Some((1, 4)));
        assert_eq!(tune.header.tempo.unwrap().bpm, 120);
        assert_eq!(tune.header.key().fifths, 0);
    }

    #[test]
    fn test_simple_measures() {
        let tune = parse(SCALE).unwrap();
        assert_eq!(tune.measures.len(), 4);
        assert_eq!(tune.measures[0].elements.len(), 4);
        assert_eq!(tune.measures[3].elements.len(), 4);
    }

    #[test]
    fn test_trailing_measure_without_bar() {
        let tune = parse("K:C\nC D E F | G A B c").unwrap();
        assert_eq!(tune.measures.len(), 2);
    }

    #[test]
    fn test_lengths_use_unit() {
        let tune = parse("L:1/8\nK:C\nC2 D E/ F3/2 G//").unwrap();
        let durations: Vec<f64> = tune.measures[0].elements.iter().map(|e| e.duration()).collect();
        assert_eq!(durations, vec![0.25, 0.125, 0.0625, 0.1875, 0.03125]);
    }

    #[test]
    fn test_octaves_and_accidentals() {
        let tune = parse("K:C\n^C, _e' =G").unwrap();
        let notes = notes_of(&tune.measures[0]);
        assert_eq!(notes[0].octave, -1);
        assert_eq!(notes[0].accidental, Some(Accidental::Sharp));
        assert_eq!(notes[1].octave, 2);
        assert_eq!(notes[1].accidental, Some(Accidental::Flat));
        assert_eq!(notes[2].accidental, Some(Accidental::Natural));
    }

    #[test]
    fn test_chord_is_one_element() {
        let tune = parse("L:1/4\nK:C\n[CEG]2 c").unwrap();
        let elements = &tune.measures[0].elements;
        assert_eq!(elements.len(), 2);
        if let Element::Chord { notes, duration } = &elements[0] {
            assert_eq!(notes.len(), 3);
            assert_eq!(*duration, 0.5);
        } else {
            panic!("Expected chord");
        }
    }

    #[test]
    fn test_unterminated_chord() {
        let result = parse("K:C\n[CEG");
        assert!(matches!(result, Err(EtudeError::ParseError { .. })));
    }

    #[test]
    fn test_broken_rhythm() {
        let tune = parse("L:1/8\nK:C\nA>B c<d").unwrap();
        let durations: Vec<f64> = tune.measures[0].elements.iter().map(|e| e.duration()).collect();
        assert_eq!(durations, vec![0.1875, 0.0625, 0.0625, 0.1875]);
    }

    #[test]
    fn test_triplet() {
        let tune = parse("L:1/8\nK:C\n(3CDE F").unwrap();
        let durations: Vec<f64> = tune.measures[0].elements.iter().map(|e| e.duration()).collect();
        let third = 0.125 * 2.0 / 3.0;
        assert!((durations[0] - third).abs() < 1e-9);
        assert!((durations[2] - third).abs() < 1e-9);
        assert_eq!(durations[3], 0.125);
    }

    #[test]
    fn test_repeats_and_endings() {
        let tune = parse("K:C\n|: C D E F |1 G A B c :|2 c B A G |]").unwrap();
        assert_eq!(tune.measures.len(), 3);
        assert!(tune.measures[0].repeat_start);
        assert_eq!(tune.measures[1].ending, Some(1));
        assert!(tune.measures[1].repeat_end);
        assert_eq!(tune.measures[2].ending, Some(2));
    }

    #[test]
    fn test_key_change_in_body() {
        let tune = parse("K:C\nC D E F |\nK:G\nG A B c |").unwrap();
        assert_eq!(tune.measures[0].key_change, None);
        assert_eq!(tune.measures[1].key_change.map(|k| k.fifths), Some(1));
    }

    #[test]
    fn test_strict_header_error() {
        let result = parse("X:1\nM:four\nK:C\nC D E F");
        assert!(matches!(result, Err(EtudeError::HeaderError(_))));
    }

    #[test]
    fn test_lenient_header_defaults() {
        let tune = parse_lenient("X:1\nM:four\nQ:fast\nK:C\nC D E F").unwrap();
        assert_eq!(tune.header.meter, None);
        assert_eq!(tune.header.tempo, None);
        assert_eq!(tune.measures.len(), 1);
    }

    #[test]
    fn test_body_without_header() {
        let tune = parse("C D E F | G A B c |").unwrap();
        assert!(tune.header.key.is_none());
        assert_eq!(tune.measures.len(), 2);
    }

    #[test]
    fn test_error_lines_count_header() {
        match parse("X:1\nT:Oops\nK:C\nC D ? E") {
            Err(EtudeError::ParseError { line, column, .. }) => {
                assert_eq!(line, 4);
                assert_eq!(column, 5);
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_source() {
        let tune = parse("").unwrap();
        assert!(tune.measures.is_empty());
    }

    #[test]
    fn test_tempo_after_key() {
        let tune = parse("X:1\nK:C\nQ:1/4=90\nC D E F |").unwrap();
        assert_eq!(tune.header.tempo.map(|t| t.to_quarter_note_bpm()), Some(90.0));
        assert_eq!(tune.measures.len(), 1);

        // The header tempo wins over a later one
        let tune = parse("X:1\nQ:1/4=100\nK:C\nQ:1/4=60\nC D E F |").unwrap();
        assert_eq!(tune.header.tempo.map(|t| t.to_quarter_note_bpm()), Some(100.0));
    }
}
