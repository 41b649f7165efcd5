//! The per-message domain operation a worker runs.

use thiserror::Error;

use crate::bus::Event;
use crate::error::{Classify, ErrorKind};
use crate::store::StoreError;

/// Why a handler could not (or did not need to) apply its effect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Infrastructure hiccup; a redelivery may succeed.
    #[error("transient failure: {0}")]
    TransientInfra(String),
    /// Decoding or validation failed; every redelivery will fail the same way.
    #[error("poison message: {0}")]
    PoisonMessage(String),
    /// The effect was already applied by an earlier delivery.
    #[error("effect already applied: {0}")]
    DuplicateEffect(String),
}

impl Classify for HandlerError {
    fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::TransientInfra(_) => ErrorKind::TransientInfra,
            HandlerError::PoisonMessage(_) => ErrorKind::PoisonMessage,
            HandlerError::DuplicateEffect(_) => ErrorKind::DuplicateEffect,
        }
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        match err.kind() {
            ErrorKind::TransientInfra => HandlerError::TransientInfra(err.to_string()),
            ErrorKind::DuplicateEffect => HandlerError::DuplicateEffect(err.to_string()),
            ErrorKind::PoisonMessage => HandlerError::PoisonMessage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::PoisonMessage(err.to_string())
    }
}

/// Processes one delivered event.
///
/// Implementations must tolerate seeing the same event more than once.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, event: &Event) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        self(event)
    }
}
