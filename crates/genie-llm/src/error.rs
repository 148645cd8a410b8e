use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM not configured")]
    NotConfigured,

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("service unavailable after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Transient failures worth another attempt: rate limiting, server
    /// overload, and requests that never got a response.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Status { status, .. } => matches!(status, 429 | 500 | 503),
            LlmError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> LlmError {
        LlmError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn retryable_statuses() {
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn other_errors_are_final() {
        assert!(!LlmError::NotConfigured.is_retryable());
        assert!(!LlmError::Parse("bad".into()).is_retryable());
        let exhausted = LlmError::RetriesExhausted {
            attempts: 3,
            last: Box::new(status(503)),
        };
        assert!(!exhausted.is_retryable());
        assert!(exhausted.to_string().contains("3 attempts"));
    }
}
