//! Error types for collaborator calls

use thiserror::Error;

/// Errors returned by outbound network loggers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The send could not complete on the network
    #[error("Network send failed: {0}")]
    Network(String),

    /// Connectivity dropped between the status check and the send
    #[error("No connectivity")]
    NoConnectivity,

    /// The remote end refused the payload
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl UploadError {
    /// Create a new Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

/// Errors returned by the authentication session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Sign-in finished unsuccessfully
    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    /// Sign-in has not completed yet
    #[error("Sign-in still pending")]
    Pending,
}
