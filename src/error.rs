//! Failure classification shared by every stage of the pipeline.
//!
//! Each module owns its own error enum. `ErrorKind` is the common
//! vocabulary that tells a caller what to do with a failure:
//!
//! - `TransientInfra`: a network/service blip; retrying (or letting the
//!   queue redeliver) may succeed.
//! - `PoisonMessage`: decoding or validation failed and will fail the same
//!   way every time; dead-lettering is the only way out.
//! - `DuplicateEffect`: the effect was already applied by an earlier
//!   delivery. Expected under at-least-once delivery, not a hard failure.

use std::fmt;

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TransientInfra,
    PoisonMessage,
    DuplicateEffect,
}

impl ErrorKind {
    /// Whether a later attempt of the same operation can succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::TransientInfra)
    }

    /// Whether the failure should be treated as success by a consumer.
    pub fn is_benign(self) -> bool {
        matches!(self, ErrorKind::DuplicateEffect)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TransientInfra => write!(f, "transient"),
            ErrorKind::PoisonMessage => write!(f, "poison"),
            ErrorKind::DuplicateEffect => write!(f, "duplicate"),
        }
    }
}

/// Implemented by every error type in the crate.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
