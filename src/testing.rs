//! Fake ports and log capture shared by the pipeline unit tests.

use crate::error::EtudeError;
use crate::services::{CompletionRequest, LanguageModel, NotationValidator};
use std::cell::{Cell, RefCell};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Language model answering with a fixed completion (or failure), counting
/// calls and keeping the last request
pub struct FakeModel {
    completion: Result<String, String>,
    pub calls: Cell<usize>,
    pub last_request: RefCell<Option<CompletionRequest>>,
}

impl FakeModel {
    pub fn answering(completion: impl Into<String>) -> Self {
        Self {
            completion: Ok(completion.into()),
            calls: Cell::new(0),
            last_request: RefCell::new(None),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            completion: Err(message.to_string()),
            calls: Cell::new(0),
            last_request: RefCell::new(None),
        }
    }

    pub fn request(&self) -> CompletionRequest {
        self.last_request
            .borrow()
            .clone()
            .expect("model was never called")
    }
}

impl LanguageModel for FakeModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String, EtudeError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_request.borrow_mut() = Some(request.clone());
        self.completion.clone().map_err(EtudeError::LanguageModel)
    }
}

/// Rejects any notation containing the marker text
pub struct ScriptedValidator {
    reject_marker: &'static str,
    pub calls: Cell<usize>,
}

impl ScriptedValidator {
    pub fn rejecting(reject_marker: &'static str) -> Self {
        Self {
            reject_marker,
            calls: Cell::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::rejecting("")
    }
}

impl NotationValidator for ScriptedValidator {
    fn validate(&self, notation: &str) -> Result<(), String> {
        self.calls.set(self.calls.get() + 1);
        if !self.reject_marker.is_empty() && notation.contains(self.reject_marker) {
            Err("unexpected token".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber recording formatted events, returning its
/// result and everything logged at debug level or above
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = buffer
        .0
        .lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    (result, logs)
}
