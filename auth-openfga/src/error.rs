use thiserror::Error;

#[derive(Error, Debug)]
pub enum FgaError {
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    #[error("Invalid relation: {0}")]
    InvalidRelation(String),

    #[error("Invalid tuple: {0}")]
    InvalidTuple(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenFGA API error ({status}) {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Batch check item {index} failed: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<FgaError>,
    },

    #[error("Authorization service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl FgaError {
    /// Whether a failed idempotent request may be sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FgaError::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request()
            }
            FgaError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FgaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_errors_retryable_by_status() {
        let throttled = FgaError::Api {
            status: 429,
            code: "rate_limit_exceeded".to_string(),
            message: "slow down".to_string(),
        };
        let server = FgaError::Api {
            status: 503,
            code: "unavailable".to_string(),
            message: "down".to_string(),
        };
        let invalid = FgaError::Api {
            status: 400,
            code: "validation_error".to_string(),
            message: "bad tuple".to_string(),
        };

        assert!(throttled.is_retryable());
        assert!(server.is_retryable());
        assert!(!invalid.is_retryable());
        assert!(!FgaError::Decode("x".to_string()).is_retryable());
    }

    #[test]
    fn test_batch_item_message_carries_index() {
        let err = FgaError::BatchItem {
            index: 2,
            source: Box::new(FgaError::Unavailable("boom".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Batch check item 2 failed: Authorization service unavailable: boom"
        );
    }
}
