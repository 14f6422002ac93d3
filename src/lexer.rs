use crate::error::EtudeError;

/// Token types for the ABC note stream
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Pitches and rests
    Note(char),     // A-G, a-g
    Rest,           // z, Z, x, X

    // Accidentals
    DoubleSharp,    // ^^
    Sharp,          // ^
    Natural,        // =
    Flat,           // _
    DoubleFlat,     // __

    // Octave marks
    OctaveUp,       // '
    OctaveDown,     // ,

    // Lengths
    Number(u32),
    Slash,          // /

    // Bar lines
    Bar,            // |, ||, |], [|
    RepeatStart,    // |:
    RepeatEnd,      // :|
    RepeatBoth,     // ::, :|:
    Ending(u32),    // |1, [2

    // Grouping
    ChordStart,     // [
    ChordEnd,       // ]
    Tuplet(u32),    // (3
    LeftParen,      // ( slur
    RightParen,     // )

    // Rhythm modifiers
    Tie,            // -
    BrokenRight(u8), // >, >>, >>>
    BrokenLeft(u8),  // <, <<, <<<

    // Header field inside the body: "K:G" on its own line or inline "[K:G]"
    Field(char, String),

    // Structure
    Newline,
    Whitespace,
}

/// A token with its position in the source
#[derive(Debug, Clone)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for tokenizing an ABC tune body
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::starting_at_line(input, 1)
    }

    /// Lexer for a body that begins partway through a file, so reported
    /// lines match the source file.
    pub fn starting_at_line(input: &'a str, line: usize) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            line,
            column: 1,
            position: 0,
            at_line_start: true,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// "K:" style field at the start of a line
    fn check_field_line(&self) -> bool {
        let mut rest = self.remaining().chars();
        matches!(
            (rest.next(), rest.next()),
            (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
        )
    }

    /// "[K:" style inline field
    fn check_inline_field(&self) -> bool {
        let mut rest = self.remaining().chars();
        matches!(
            (rest.next(), rest.next(), rest.next()),
            (Some('['), Some(letter), Some(':')) if letter.is_ascii_alphabetic()
        )
    }

    fn read_number(&mut self) -> u32 {
        let mut value: u32 = 0;
        while let Some(&c) = self.peek() {
            match c.to_digit(10) {
                Some(d) => {
                    value = value.saturating_mul(10).saturating_add(d);
                    self.advance();
                }
                None => break,
            }
        }
        value
    }

    fn read_until_line_end(&mut self) -> &'a str {
        let start = self.position;
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        &self.input[start..self.position]
    }

    /// Skip a delimited run such as `"Am7"`, `!trill!` or `{g}`.
    /// The opening delimiter has already been consumed.
    fn skip_delimited(
        &mut self,
        close: char,
        single_line: bool,
        line: usize,
        column: usize,
        what: &str,
    ) -> Result<(), EtudeError> {
        while let Some(&c) = self.peek() {
            if c == close {
                self.advance();
                return Ok(());
            }
            if single_line && c == '\n' {
                break;
            }
            self.advance();
        }
        Err(EtudeError::ParseError {
            line,
            column,
            message: format!("Unterminated {}", what),
        })
    }

    fn count_repeated(&mut self, c: char) -> u8 {
        let mut count = 0u8;
        while let Some(&next) = self.peek() {
            if next != c {
                break;
            }
            self.advance();
            count = count.saturating_add(1);
        }
        count
    }

    pub fn tokenize(&mut self) -> Result<Vec<LocatedToken>, EtudeError> {
        let mut tokens = Vec::new();

        while let Some(&c) = self.peek() {
            let line = self.line;
            let column = self.column;

            if self.at_line_start && self.check_field_line() {
                let letter = c;
                self.advance(); // letter
                self.advance(); // :
                let value = self.read_until_line_end().trim().to_string();
                tokens.push(LocatedToken {
                    token: Token::Field(letter, value),
                    line,
                    column,
                });
                continue;
            }
            self.at_line_start = c == '\n';

            if self.check_inline_field() {
                self.advance(); // [
                let letter = self.advance().unwrap_or(' ');
                self.advance(); // :
                let start = self.position;
                self.skip_delimited(']', true, line, column, "inline field")?;
                let value = self.input[start..self.position - 1].trim().to_string();
                tokens.push(LocatedToken {
                    token: Token::Field(letter, value),
                    line,
                    column,
                });
                continue;
            }

            let token = match c {
                'A'..='G' | 'a'..='g' => {
                    self.advance();
                    Token::Note(c)
                }
                'z' | 'Z' | 'x' | 'X' => {
                    self.advance();
                    Token::Rest
                }
                '^' => {
                    self.advance();
                    if let Some(&'^') = self.peek() {
                        self.advance();
                        Token::DoubleSharp
                    } else {
                        Token::Sharp
                    }
                }
                '_' => {
                    self.advance();
                    if let Some(&'_') = self.peek() {
                        self.advance();
                        Token::DoubleFlat
                    } else {
                        Token::Flat
                    }
                }
                '=' => {
                    self.advance();
                    Token::Natural
                }
                '\'' => {
                    self.advance();
                    Token::OctaveUp
                }
                ',' => {
                    self.advance();
                    Token::OctaveDown
                }
                '0'..='9' => Token::Number(self.read_number()),
                '/' => {
                    self.advance();
                    Token::Slash
                }
                '|' => {
                    self.advance();
                    match self.peek().copied() {
                        Some(':') => {
                            self.advance();
                            Token::RepeatStart
                        }
                        Some('|') | Some(']') => {
                            self.advance();
                            Token::Bar
                        }
                        Some(d) if d.is_ascii_digit() => {
                            tokens.push(LocatedToken {
                                token: Token::Bar,
                                line,
                                column,
                            });
                            Token::Ending(self.read_number())
                        }
                        _ => Token::Bar,
                    }
                }
                ':' => {
                    self.advance();
                    match self.peek().copied() {
                        Some(':') => {
                            self.advance();
                            Token::RepeatBoth
                        }
                        Some('|') => {
                            self.advance();
                            match self.peek().copied() {
                                Some(':') => {
                                    self.advance();
                                    Token::RepeatBoth
                                }
                                Some('|') | Some(']') => {
                                    self.advance();
                                    Token::RepeatEnd
                                }
                                Some(d) if d.is_ascii_digit() => {
                                    tokens.push(LocatedToken {
                                        token: Token::RepeatEnd,
                                        line,
                                        column,
                                    });
                                    Token::Ending(self.read_number())
                                }
                                _ => Token::RepeatEnd,
                            }
                        }
                        _ => {
                            return Err(EtudeError::ParseError {
                                line,
                                column,
                                message: "Unexpected ':'. Did you mean ':|' for repeat end?".to_string(),
                            });
                        }
                    }
                }
                '[' => {
                    self.advance();
                    match self.peek().copied() {
                        Some('|') => {
                            self.advance();
                            Token::Bar
                        }
                        Some(d) if d.is_ascii_digit() => Token::Ending(self.read_number()),
                        _ => Token::ChordStart,
                    }
                }
                ']' => {
                    self.advance();
                    Token::ChordEnd
                }
                '(' => {
                    self.advance();
                    match self.peek().copied() {
                        Some(d) if d.is_ascii_digit() => {
                            let n = self.read_number();
                            // (p:q:r - only p changes note lengths here
                            while let Some(&next) = self.peek() {
                                if next == ':' || next.is_ascii_digit() {
                                    self.advance();
                                } else {
                                    break;
                                }
                            }
                            Token::Tuplet(n)
                        }
                        _ => Token::LeftParen,
                    }
                }
                ')' => {
                    self.advance();
                    Token::RightParen
                }
                '-' => {
                    self.advance();
                    Token::Tie
                }
                '>' => Token::BrokenRight(self.count_repeated('>')),
                '<' => Token::BrokenLeft(self.count_repeated('<')),
                '"' => {
                    self.advance();
                    self.skip_delimited('"', true, line, column, "chord symbol")?;
                    continue;
                }
                '!' | '+' => {
                    self.advance();
                    self.skip_delimited(c, true, line, column, "decoration")?;
                    continue;
                }
                '{' => {
                    // Grace notes are ornaments, not part of the melodic line
                    self.advance();
                    self.skip_delimited('}', false, line, column, "grace note group")?;
                    continue;
                }
                '%' => {
                    self.read_until_line_end();
                    continue;
                }
                // Decoration shorthands, spacers, line continuations, voice overlay
                '~' | '.' | 'H' | 'L' | 'M' | 'O' | 'P' | 'S' | 'T' | 'u' | 'v' | 'y' | '`'
                | '$' | '\\' | '&' => {
                    self.advance();
                    continue;
                }
                '\n' => {
                    self.advance();
                    Token::Newline
                }
                ' ' | '\t' | '\r' => {
                    self.advance();
                    Token::Whitespace
                }
                _ => {
                    return Err(EtudeError::ParseError {
                        line,
                        column,
                        message: format!("Unexpected character: '{}'", c),
                    });
                }
            };

            tokens.push(LocatedToken {
                token,
                line,
                column,
            });
        }

        Ok(tokens)
    }
}
