//! Deterministic stand-in model for tests and offline runs.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::{CompletionRequest, TextModel};
use crate::error::{Result, ScribeError};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String>>;

/// A model whose answers are decided up front.
///
/// Either replays a queue of canned results in order, or computes each
/// answer from the request with a closure. Every request is recorded.
pub struct ScriptedModel {
    queue: RefCell<VecDeque<Result<String>>>,
    responder: Option<Responder>,
    calls: RefCell<Vec<CompletionRequest>>,
}

impl std::fmt::Debug for ScriptedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedModel")
            .field("queued", &self.queue.borrow().len())
            .field("calls", &self.calls.borrow().len())
            .finish()
    }
}

impl ScriptedModel {
    /// Replay `responses` in order; once exhausted every call fails.
    pub fn queue(responses: impl IntoIterator<Item = Result<String>>) -> Self {
        Self {
            queue: RefCell::new(responses.into_iter().collect()),
            responder: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::from_fn(move |_| Ok(text.clone()))
    }

    /// Compute every answer from the request.
    pub fn from_fn(f: impl Fn(&CompletionRequest) -> Result<String> + 'static) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Copies of every request received so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.borrow().clone()
    }
}

impl TextModel for ScriptedModel {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.borrow_mut().push(request.clone());
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        self.queue.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(ScribeError::ModelUnavailable(
                "scripted model has no responses left".to_string(),
            ))
        })
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
