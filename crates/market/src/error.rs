use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("market data request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("market data returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed market data: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http(err) if err.is_timeout() => "timeout",
            FetchError::Http(_) => "http",
            FetchError::Status(_) => "status",
            FetchError::Decode(_) => "decode",
        }
    }
}
