use std::fmt;
use thiserror::Error;

use crate::verifier::Mismatch;

/// Errors raised by an observable collection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Collection closed: {0}")]
    Closed(String),

    #[error("Subscription error: {0}")]
    SubscriptionError(String),
}

/// Errors raised while loading a verifier configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised by a [`ChangeVerifier`](crate::verifier::ChangeVerifier).
#[derive(Error, Debug)]
pub enum VerifyError<T: fmt::Debug> {
    /// The collection to observe was already gone at construction time.
    #[error("Collection to verify is missing")]
    MissingCollection,

    #[error("Failed to observe collection: {0}")]
    Subscription(#[from] CollectionError),

    /// Replayed notifications and live contents disagree.
    #[error("{0}")]
    Mismatch(Mismatch<T>),
}

impl<T: fmt::Debug> VerifyError<T> {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, VerifyError::Mismatch(_))
    }

    pub fn mismatch(&self) -> Option<&Mismatch<T>> {
        match self {
            VerifyError::Mismatch(m) => Some(m),
            _ => None,
        }
    }
}
