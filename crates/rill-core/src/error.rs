//! Error types shared across the rill crates.

use thiserror::Error;

/// Errors surfaced by channels, sequences, and combinators.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Write attempted on a channel that has been ended.
    #[error("channel is closed for writing")]
    ClosedForWriting,

    /// A demand hook is already installed; clear it before setting a new one.
    #[error("a demand hook is already installed")]
    HookAlreadySet,

    /// Malformed argument, rejected before any side effect.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The settling side of a deferred was dropped before settling.
    #[error("producer dropped before settling")]
    Disconnected,

    /// An error raised by an upstream source or task, delivered at the
    /// sequence position the value would have occupied.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl FlowError {
    /// Build a validation error from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wrap an arbitrary error as an upstream failure.
    pub fn upstream(error: impl Into<anyhow::Error>) -> Self {
        Self::Upstream(error.into())
    }

    /// Check if this is a lifecycle-state violation.
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::ClosedForWriting | Self::HookAlreadySet)
    }

    /// Check if this is an argument-validation failure.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
