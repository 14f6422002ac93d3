//! Ports to the services the pipeline depends on, and offline adapters for them.

use crate::error::EtudeError;
use crate::parser::parse;
use std::cell::Cell;

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Text completion service
pub trait LanguageModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String, EtudeError>;
}

/// Notation syntax checker: `Ok(())` or a description of the problem
pub trait NotationValidator {
    fn validate(&self, notation: &str) -> Result<(), String>;
}

/// Built-in validator: the tune must carry `X:` and `K:` fields, parse
/// cleanly and contain at least one note.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalValidator;

impl NotationValidator for LexicalValidator {
    fn validate(&self, notation: &str) -> Result<(), String> {
        let tune = parse(notation).map_err(|e| e.to_string())?;
        if tune.header.index.is_none() {
            return Err("missing X: field".to_string());
        }
        if tune.header.key.is_none() {
            return Err("missing K: field".to_string());
        }
        let has_note = tune
            .measures
            .iter()
            .flat_map(|m| &m.elements)
            .any(|e| !e.notes().is_empty());
        if !has_note {
            return Err("no notes in tune body".to_string());
        }
        Ok(())
    }
}

/// Language model that answers every request with the same recorded text
#[derive(Debug, Clone)]
pub struct ReplayModel {
    completion: String,
    calls: Cell<usize>,
}

impl ReplayModel {
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
            calls: Cell::new(0),
        }
    }

    /// Number of requests answered so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl LanguageModel for ReplayModel {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, EtudeError> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.completion.clone())
    }
}
