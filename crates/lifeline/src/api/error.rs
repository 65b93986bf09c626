//! Error taxonomy for remote API calls

/// Failure of a single API request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server rejected the bearer token (HTTP 401)
    #[error("Session rejected by server")]
    Unauthorized,
    /// No token is available to authenticate the request
    #[error("Not signed in")]
    NotSignedIn,
    /// Any other non-2xx status
    #[error("Server returned status {status}")]
    Status { status: u16 },
    /// Connection, DNS, TLS or timeout failure
    #[error("Network error: {0}")]
    Transport(String),
    /// The response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Authentication failures are expected while a session is expiring
    /// and are handled globally by forcing a logout.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(ApiError::Unauthorized.is_auth());
        assert!(ApiError::NotSignedIn.is_auth());
        assert!(!ApiError::Status { status: 500 }.is_auth());
        assert!(!ApiError::Transport("connection refused".into()).is_auth());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ApiError::Status { status: 503 }.to_string(),
            "Server returned status 503"
        );
    }
}
