//! Error Types

use thiserror::Error;

/// Result type alias for payment operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment error types
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Malformed or missing caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted from a state that forbids it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Stored payment method is no longer usable
    #[error("Payment method expired: {0}")]
    ExpiredMethod(String),

    /// Transport or protocol failure talking to the processor
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Processor declined or returned a business error code
    #[error("{transaction_type} failed with code {code} ({message}) ({transaction_id}).")]
    SoftDecline {
        transaction_type: String,
        code: String,
        message: String,
        transaction_id: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Processor document could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PaymentError {
    /// Check if error is retryable by the caller
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Storage(_))
    }

    /// Whether the processor itself refused the transaction
    pub const fn is_decline(&self) -> bool {
        matches!(self, Self::SoftDecline { .. } | Self::ExpiredMethod(_))
    }

    /// Processor response code, if this error carries one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::SoftDecline { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Payer-facing message that does not leak processor details
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::SoftDecline { .. } | Self::ExpiredMethod(_) => {
                "We encountered an error processing your payment method. Please verify your details and try again."
            }
            Self::InvalidArgument(_) => "The submitted payment details are incomplete or invalid.",
            Self::InvalidState(_) => "This operation is not allowed for the payment in its current state.",
            _ => "We encountered an unexpected error processing your payment method. Please try again later.",
        }
    }
}

impl From<anyhow::Error> for PaymentError {
    fn from(err: anyhow::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<quick_xml::Error> for PaymentError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_decline_message() {
        let err = PaymentError::SoftDecline {
            transaction_type: "Payment".into(),
            code: "110".into(),
            message: "Insufficient Funds".into(),
            transaction_id: "82924701437133501".into(),
        };
        assert_eq!(
            err.to_string(),
            "Payment failed with code 110 (Insufficient Funds) (82924701437133501)."
        );
        assert_eq!(err.code(), Some("110"));
        assert!(err.is_decline());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(PaymentError::InvalidRequest("timeout".into()).is_retryable());
        assert!(!PaymentError::InvalidState("new".into()).is_retryable());
    }
}
