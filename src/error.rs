//! Error types for the UCS asset reconciler

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while collecting and reconciling inventory
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Transport / Protocol Errors
    // =========================================================================
    /// Connection refused, TLS failure, timeout
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Remote answered with something other than 200
    #[error("{endpoint} returned HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Malformed XML in a UCS Manager response
    #[error("Failed to parse XML response: {0}")]
    XmlParse(String),

    /// Failed to build an XML request document
    #[error("Failed to build XML request: {0}")]
    XmlWrite(String),

    /// Malformed JSON in a Performance Manager response
    #[error("Failed to parse JSON response: {0}")]
    JsonParse(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Login was answered but refused or carried no cookie
    #[error("Login to {endpoint} failed: {reason}")]
    Login { endpoint: String, reason: String },

    /// UCS Manager answered 200 with an error code, e.g. an expired cookie
    #[error("{endpoint} rejected request: {reason} (code {code})")]
    Protocol {
        endpoint: String,
        code: String,
        reason: String,
    },

    /// A call the run depends on came back without a result
    #[error("No data from {0}")]
    NoData(String),

    /// Operation needs an active session
    #[error("No active session for {0}")]
    NotConnected(String),

    /// Run was cancelled or hit its deadline
    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Configuration / Output Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration could not be read
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV report could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JsonParse(e.to_string())
    }
}

impl Error {
    /// True for failures that only abandon one unit of work.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::HttpStatus { .. }
                | Error::XmlParse(_)
                | Error::JsonParse(_)
                | Error::Login { .. }
                | Error::Protocol { .. }
                | Error::NoData(_)
                | Error::NotConnected(_)
        )
    }
}
