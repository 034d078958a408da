// Typed errors with thiserror. Surface meaningful messages to JS.

use thiserror::Error;

/// Why a shape resource could not be turned into a `Shape`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid SVG document: {0}")]
    InvalidDocument(String),

    #[error("Document has no <svg> root")]
    MissingSvgRoot,

    #[error("Document has neither width/height nor a usable viewBox")]
    MissingDimensions,

    #[error("Document contains no circle or ellipse")]
    NoDots,
}

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Shape '{id}' failed to parse: {source}")]
    Parse {
        id: String,
        #[source]
        source: ParseError,
    },

    #[error("Fetching '{url}' failed: {message}")]
    Fetch { url: String, message: String },

    #[error("No fetcher installed for shape loading")]
    NoFetcher,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
