use thiserror::Error;
use uuid::Uuid;

use crate::types::{EventType, HolidayStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoanError {
    /// non-positive or excessive amounts, out-of-range counts and rates
    #[error("invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    /// an event arrived that belongs to another handler or has nothing to act on
    #[error("sequencing error: {message}")]
    Sequencing {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("no amortization strategy supports this loan")]
    NoApplicableStrategy,

    #[error("no handler registered for event type {event_type}")]
    UnsupportedEvent {
        event_type: EventType,
    },

    #[error("invalid state: current {current:?}, expected {expected:?}")]
    InvalidState {
        current: HolidayStatus,
        expected: HolidayStatus,
    },

    #[error("payment holiday not found: {id}")]
    HolidayNotFound {
        id: Uuid,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },
}

impl LoanError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        LoanError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn sequencing(message: impl Into<String>) -> Self {
        LoanError::Sequencing {
            message: message.into(),
        }
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        LoanError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
