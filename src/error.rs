//! # Error Types
//!
//! This module defines all error types for the etude engine.
//!
//! Errors raised while reading notation carry line/column information so a
//! bad exercise can be traced back to the offending token. Errors raised by
//! the quick-test pipeline name the problem number that failed.
//!
//! ## Error Types
//! - `ParseError` - Lexer/parser errors with line and column information
//! - `HeaderError` - Invalid header field (meter, unit length, tempo, key)
//! - `ResponseError` - Language model output that is not a usable quick test
//! - `SyntaxError` - A generated problem rejected by the notation validator
//! - `LanguageModel` - The language model port failed to produce a completion
//! - `Telemetry` - The telemetry store could not be read
//! - `ConfigError` - Invalid YAML configuration
//! - `BarRange` - A requested bar range the tune does not contain
//!
//! Public pipeline entry points log these and return `None`; the `try_*`
//! variants hand them to the caller instead.
//!
//! ## Usage
//! ```rust
//! use etude::{parse, EtudeError};
//!
//! match parse("X:1\nK:C\nC D E F |") {
//!     Ok(tune) => println!("{} measures", tune.measures.len()),
//!     Err(EtudeError::ParseError { line, column, message }) => {
//!         eprintln!("Parse error at {}:{}: {}", line, column, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtudeError {
    /// Parse error with location information.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::ParseError {
    ///     line: 7,
    ///     column: 3,
    ///     message: "Unexpected character: 'h'".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Parse error at line 7, column 3: Unexpected character: 'h'");
    /// ```
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Invalid header field.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::HeaderError("meter must be in format N/D".to_string());
    /// assert_eq!(err.to_string(), "Invalid header: meter must be in format N/D");
    /// ```
    #[error("Invalid header: {0}")]
    HeaderError(String),

    /// The language model answered with something that is not a quick test.
    #[error("Invalid model response: {0}")]
    ResponseError(String),

    /// A generated problem failed notation syntax validation.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::SyntaxError { problem: 2, message: "missing K: field".to_string() };
    /// assert_eq!(err.to_string(), "Problem 2 failed syntax validation: missing K: field");
    /// ```
    #[error("Problem {problem} failed syntax validation: {message}")]
    SyntaxError { problem: u32, message: String },

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("Telemetry store error: {0}")]
    Telemetry(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Bars requested outside the tune.
    ///
    /// # Example
    /// ```
    /// # use etude::EtudeError;
    /// let err = EtudeError::BarRange("bars 9-12 but the tune has 8".to_string());
    /// assert_eq!(err.to_string(), "Invalid bar range: bars 9-12 but the tune has 8");
    /// ```
    #[error("Invalid bar range: {0}")]
    BarRange(String),
}
