use thiserror::Error;

#[derive(Error, Debug)]
pub enum NostreamError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Segment unavailable: {0}")]
    SegmentUnavailable(url::Url),

    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Content hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Invalid file header event: {0}")]
    InvalidEvent(String),

    #[error("Subscription failed: {0}")]
    Subscription(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl NostreamError {
    /// Whether a failed segment fetch may succeed on a later drain pass.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::SegmentUnavailable(_) | Self::Configuration(_) | Self::InvalidEvent(_)
        )
    }
}

pub type NostreamResult<T> = Result<T, NostreamError>;
