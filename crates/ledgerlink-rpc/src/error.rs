//! Errors surfaced by the resilience layer

use thiserror::Error;

use crate::CallError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    #[error("Remote call failed: {0}")]
    Permanent(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Request could not be encoded: {0}")]
    Encode(String),
}

impl ResilienceError {
    /// Terminal error for a failed attempt
    pub(crate) fn from_call(error: CallError, attempts: u32) -> Self {
        match error {
            CallError::Transient(last_error) => ResilienceError::Exhausted {
                attempts,
                last_error,
            },
            CallError::Permanent(message) => ResilienceError::Permanent(message),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, ResilienceError::Exhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, ResilienceError>;
