use std::time::Duration;

use thiserror::Error;

const KEY_REMEDIATION: &str = "Use your Clarity AI API key by:\n\
1. Setting the CAI_API_KEY environment variable to your API key\n\
2. Placing it inside cai_platform_key.txt\n\
3. Passing it per call as the api_key_override parameter";

/// Machine-readable classification of a [`ClarityError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingCredentials,
    Unauthorized,
    InsufficientCredits,
    BadRequest,
    Timeout,
    Api,
    Transport,
    Codec,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingCredentials => "missing_credentials",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InsufficientCredits => "insufficient_credits",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Api => "api",
            ErrorKind::Transport => "transport",
            ErrorKind::Codec => "codec",
            ErrorKind::Config => "config",
        }
    }
}

#[derive(Debug, Error)]
pub enum ClarityError {
    #[error("No Clarity AI key set.\n\n{}", KEY_REMEDIATION)]
    MissingCredentials,

    #[error("Clarity AI API Error: Unauthorized.\n\n{}", KEY_REMEDIATION)]
    Unauthorized,

    #[error("Clarity AI API Error: Not enough credits.\n\nPlease ensure your Clarity AI API account has enough credits to complete this action.")]
    InsufficientCredits,

    #[error("Clarity AI API Error: Bad request.\n\n{0}")]
    BadRequest(String),

    #[error("Clarity AI API Timeout: request took too long to complete ({}s)", .elapsed.as_secs())]
    Timeout { elapsed: Duration },

    #[error("Clarity AI API Error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request error: {0}")]
    Request(String),

    #[error("Image encoding error: {0}")]
    Encode(String),

    #[error("Response decoding error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClarityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClarityError::MissingCredentials => ErrorKind::MissingCredentials,
            ClarityError::Unauthorized => ErrorKind::Unauthorized,
            ClarityError::InsufficientCredits => ErrorKind::InsufficientCredits,
            ClarityError::BadRequest(_) => ErrorKind::BadRequest,
            ClarityError::Timeout { .. } => ErrorKind::Timeout,
            ClarityError::Api { .. } => ErrorKind::Api,
            ClarityError::Request(_) => ErrorKind::Transport,
            ClarityError::Encode(_) | ClarityError::Decode(_) => ErrorKind::Codec,
            ClarityError::Config(_) => ErrorKind::Config,
        }
    }

    /// Maps a failed submission status to its error.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => ClarityError::BadRequest(body),
            401 => ClarityError::Unauthorized,
            402 => ClarityError::InsufficientCredits,
            _ => ClarityError::Api { status, body },
        }
    }
}

impl From<reqwest::Error> for ClarityError {
    fn from(e: reqwest::Error) -> Self {
        ClarityError::Request(e.to_string())
    }
}

impl From<image::ImageError> for ClarityError {
    fn from(e: image::ImageError) -> Self {
        ClarityError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClarityError>;
