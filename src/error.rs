use thiserror::Error;

#[derive(Error, Debug)]
pub enum KaocheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Subtitle parse error: {0}")]
    Parse(String),

    #[error("Alignment failed: {0}")]
    Alignment(String),

    #[error("LQA error: {0}")]
    Lqa(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Project file error: {0}")]
    Project(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl KaocheError {
    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Llm(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, KaocheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(KaocheError::Api { status: 503, message: "busy".into() }.is_retryable());
        assert!(KaocheError::Api { status: 429, message: "slow down".into() }.is_retryable());
        assert!(!KaocheError::Api { status: 401, message: "bad key".into() }.is_retryable());
        assert!(!KaocheError::Config("x".into()).is_retryable());
    }

    #[test]
    fn test_alignment_message() {
        let err = KaocheError::Alignment("no cues".into());
        assert_eq!(err.to_string(), "Alignment failed: no cues");
    }
}
