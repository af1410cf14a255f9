use std::time::Duration;

use thiserror::Error;

use crate::types::{DeltaId, EngagementField, EntityType, ItemKey};

/// Failure reported by an injected capability (network, backend, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("decode failure: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A single collection's fetch failed. Always retryable; the collection's
/// cursor is left where it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetching {entity_type} failed: {cause}")]
pub struct FetchError {
    pub entity_type: EntityType,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(entity_type: EntityType, cause: FetchCause) -> Self {
        Self { entity_type, cause }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FetchCause::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{field} action on {key} is still pending")]
    Conflict { key: ItemKey, field: EngagementField },

    #[error("{key} already has the requested {field} state")]
    Redundant { key: ItemKey, field: EngagementField },

    #[error("{field} is not supported for {entity_type}")]
    Unsupported { entity_type: EntityType, field: EngagementField },

    #[error("item not in working set: {0}")]
    ItemNotFound(ItemKey),

    #[error("unknown engagement delta: {0}")]
    UnknownDelta(DeltaId),

    #[error("engagement submission failed: {0}")]
    Engagement(#[from] TransportError),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
