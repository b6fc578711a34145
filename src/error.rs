use thiserror::Error;

/// Failure raised by a script-side callable (listener, timer or module callback).
///
/// These never unwind through the dispatch loop; they are handed to
/// [`ExecutingContext::report_error`](crate::context::ExecutingContext::report_error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
}

impl BridgeError {
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, BridgeError::InvalidState(_))
    }
}
