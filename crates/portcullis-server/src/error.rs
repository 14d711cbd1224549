//! Server error types.

use thiserror::Error;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be parsed or bound.
    #[error("Bind error: {0}")]
    Bind(String),

    /// A collaborator client could not be constructed.
    #[error("Client error: {0}")]
    Client(#[from] reqwest::Error),

    /// I/O error on the listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Bind("Failed to bind to 0.0.0.0:80: permission denied".to_string());
        assert_eq!(
            err.to_string(),
            "Bind error: Failed to bind to 0.0.0.0:80: permission denied"
        );

        let err = ServerError::from(std::io::Error::other("listener closed"));
        assert_eq!(err.to_string(), "I/O error: listener closed");
    }
}
