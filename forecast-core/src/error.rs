use thiserror::Error;

use crate::provider::ProviderId;

/// Coarse classification of an adapter failure, used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Transport,
    DataShape,
    OutOfRange,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::DataShape => "data shape",
            FailureKind::OutOfRange => "out of range",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a source adapter is allowed to fail with.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure or non-success HTTP status.
    #[error("{provider}: request failed: {message}")]
    Transport { provider: ProviderId, message: String },

    /// Payload is missing a key, has a wrong type, or is otherwise malformed.
    #[error("{provider}: unexpected response data: {message}")]
    DataShape { provider: ProviderId, message: String },

    /// Payload didn't cover a requested position.
    #[error("{provider}: index {index} is out of range for `{field}` (length {len})")]
    OutOfRange { provider: ProviderId, field: String, index: usize, len: usize },
}

impl FetchError {
    pub fn transport(provider: ProviderId, message: impl Into<String>) -> Self {
        FetchError::Transport { provider, message: message.into() }
    }

    pub fn data_shape(provider: ProviderId, message: impl Into<String>) -> Self {
        FetchError::DataShape { provider, message: message.into() }
    }

    pub fn out_of_range(provider: ProviderId, field: impl Into<String>, index: usize, len: usize) -> Self {
        FetchError::OutOfRange { provider, field: field.into(), index, len }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Transport { .. } => FailureKind::Transport,
            FetchError::DataShape { .. } => FailureKind::DataShape,
            FetchError::OutOfRange { .. } => FailureKind::OutOfRange,
        }
    }

    pub fn provider(&self) -> ProviderId {
        match self {
            FetchError::Transport { provider, .. }
            | FetchError::DataShape { provider, .. }
            | FetchError::OutOfRange { provider, .. } => *provider,
        }
    }
}
