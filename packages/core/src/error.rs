//! Error types for chain queries and their collaborators.

use thiserror::Error;

/// Unified query error.
///
/// Errors recorded on a query instance are cloned into every snapshot, so
/// all variants carry owned strings rather than source errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Unknown chain: {chain_id}")]
    UnknownChain { chain_id: String },

    #[error("Config error: {message}")]
    Config { message: String },
}

impl QueryError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn unknown_chain(chain_id: impl Into<String>) -> Self {
        Self::UnknownChain { chain_id: chain_id.into() }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        assert_eq!(
            QueryError::network("connection refused").to_string(),
            "Network error: connection refused"
        );
        assert_eq!(
            QueryError::unknown_chain("osmosis-1").to_string(),
            "Unknown chain: osmosis-1"
        );
    }
}
