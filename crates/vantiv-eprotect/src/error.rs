//! Handshake Error Types

use thiserror::Error;

/// Result type alias for the tokenization handshake
pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Tokenization handshake failures. None of these escape the browser
/// boundary: each one ends in a user-visible message and a halted form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Tokenization library could not be loaded
    #[error("Tokenization library unavailable: {0}")]
    LibraryUnavailable(String),

    /// Processor rejected the card data
    #[error("Tokenization declined with code {code} ({message})")]
    Declined { code: String, message: String },

    /// Round trip exceeded its deadline
    #[error("Tokenization timed out")]
    TimedOut,

    /// Form element missing or not usable
    #[error("Form error: {0}")]
    Form(String),
}
