//! Error types for the now-playing client

/// Result type alias for now-playing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to a streaming server
///
/// Now-playing fetches never surface these: transport and parse failures are
/// logged and turned into a fallback or a blank result. They reach the
/// caller from client roster requests, configuration and adapter
/// construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned HTTP status {0}")]
    Status(u16),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing failed
    #[error("XML parsing failed: {0}")]
    Xml(#[from] quick_xml::de::DeError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Payload did not have the expected shape
    #[error("Unexpected payload: {0}")]
    Parse(String),

    /// Regex error
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// Requested mount point or stream id absent from the response
    #[error("Mount not found: {0}")]
    MountNotFound(String),

    /// Station name absent from the configuration
    #[error("Station not found: {0}")]
    StationNotFound(String),

    /// The protocol has no equivalent for the requested operation
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// The operation needs admin credentials and none are configured
    #[error("Admin credentials required: {0}")]
    CredentialsRequired(String),

    /// Adapter name not recognised
    #[error("Unknown adapter type: {0}")]
    UnknownAdapter(String),

    /// Configuration error (from pmoconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    /// Create a payload shape error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// True for [`Error::Unsupported`], as opposed to a failed or empty result
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
