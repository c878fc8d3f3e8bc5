/*!
 * Error types for the dualsub application.
 *
 * Each stage of the episode pipeline has its own error enum so callers can
 * decide per variant whether to retry, degrade or fail the episode.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting or quota exhaustion
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and body onto a provider error
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            429 => Self::RateLimitExceeded(message),
            401 | 403 => Self::AuthenticationError(message),
            _ => Self::ApiError { status_code, message },
        }
    }

    /// Whether this error signals a rate limit or exhausted quota
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, message } => {
                *status_code == 429 || message.contains("RESOURCE_EXHAUSTED")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur while loading or writing subtitle files
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// No candidate encoding produced a parseable track
    #[error("Could not load {path:?} with any of the encodings [{tried}]")]
    Load {
        /// File that failed to load
        path: PathBuf,
        /// Comma separated list of attempted encodings
        tried: String,
    },

    /// Content decoded but is not a valid subtitle document
    #[error("Invalid subtitle content: {0}")]
    Parse(String),

    /// File extension is not a supported subtitle format
    #[error("Unsupported subtitle format: {0:?}")]
    UnsupportedFormat(PathBuf),

    /// Underlying filesystem failure
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the external alignment step
#[derive(Error, Debug)]
pub enum AlignmentError {
    /// The alignment binary could not be located
    #[error("Alignment tool '{0}' not found in PATH")]
    ToolNotFound(String),

    /// The tool ran but reported failure
    #[error("Alignment tool exited with {status}: {stderr}")]
    ToolFailed {
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The tool did not finish within the configured timeout
    #[error("Alignment tool timed out after {0} seconds")]
    Timeout(u64),

    /// Spawning or waiting on the process failed
    #[error("Alignment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during a single batch translation attempt
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The oracle asked us to back off
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The response list does not line up with the request list
    #[error("Response has {actual} items, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// The response is too close to the source text to be a translation
    #[error("Response looks untranslated (similarity {ratio:.2})")]
    LazyTranslation { ratio: f64 },

    /// Every attempt failed
    #[error("Translation failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl TranslationError {
    /// Classify a provider failure, promoting rate limits to their own variant
    pub fn from_provider(error: ProviderError) -> Self {
        if error.is_rate_limit() {
            Self::RateLimited(error.to_string())
        } else {
            Self::Provider(error)
        }
    }
}
