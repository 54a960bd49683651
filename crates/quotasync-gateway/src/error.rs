//! Gateway errors

use quotasync_types::ExternalAccountId;
use thiserror::Error;

/// Errors returned by the external quota service client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Administrator credentials rejected or admin session refused
    #[error("upstream authentication failed: {0}")]
    AuthFailed(String),

    /// End-user credentials rejected
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Transport failure, timeout or server error
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    /// The remote understood the request and refused it
    #[error("upstream rejected request: {0}")]
    Rejected(String),

    /// No remote account with this id
    #[error("external account {0} not found")]
    AccountNotFound(ExternalAccountId),

    /// Response body did not match the expected shape
    #[error("undecodable upstream response: {0}")]
    Decode(String),
}

/// Result alias for gateway calls
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AccountNotFound(_))
    }

    /// Check if the remote could not be reached or answered garbage
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Decode(_))
    }

    /// Check if retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Decode(_) | Self::AuthFailed(_)
        )
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Unavailable(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
