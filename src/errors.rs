/*!
 * Error types for the yadtwai application.
 *
 * Each pipeline stage has its own error enum, built with thiserror.
 * Extraction and translation errors abort a job; evaluation errors are
 * recovered by the evaluator and only ever surface as a missing score.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
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

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not answer within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

/// Errors raised while reading or rebuilding an office document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file extension is not one of the supported formats
    #[error("Unsupported document format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The package or one of its parts is malformed
    #[error("Failed to process '{part}': {reason}")]
    Extraction { part: String, reason: String },

    /// Input exceeds the configured size limit
    #[error("Document is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },
}

impl DocumentError {
    /// Shorthand for an extraction failure on a named package part
    pub fn extraction(part: impl Into<String>, reason: impl ToString) -> Self {
        Self::Extraction {
            part: part.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The completion service failed, was unreachable or timed out
    #[error("Translation of {address} failed: {source}")]
    Service {
        address: String,
        #[source]
        source: ProviderError,
    },

    /// The completion service answered with nothing for non-empty input
    #[error("Translation of {address} returned an empty result")]
    EmptyResult { address: String },

    /// Two results were written for the same structural address
    #[error("Duplicate translation written for {address}")]
    AddressCollision { address: String },
}

/// Errors that can occur while scoring a translation
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The method needs a reference text and none was given
    #[error("Evaluation method requires a reference text")]
    MissingReference,

    /// The embedding service failed
    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    /// Back-translation for self evaluation failed
    #[error("Back-translation failed: {0}")]
    BackTranslation(String),

    /// Inputs produce no meaningful score (empty text, zero vectors)
    #[error("Cannot score: {0}")]
    Degenerate(&'static str),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from document extraction or reconstruction
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
