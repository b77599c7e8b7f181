//! Remote operations and their dispatch table

use serde::{Deserialize, Serialize};

/// Remote transaction API operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Authorization,
    Sale,
    Capture,
    AuthReversal,
    Void,
    Credit,
    RegisterToken,
}

impl Operation {
    pub const ALL: [Self; 7] = [
        Self::Authorization,
        Self::Sale,
        Self::Capture,
        Self::AuthReversal,
        Self::Void,
        Self::Credit,
        Self::RegisterToken,
    ];

    /// Transaction element name in the request document
    pub const fn element(self) -> &'static str {
        match self {
            Self::Authorization => "authorization",
            Self::Sale => "sale",
            Self::Capture => "capture",
            Self::AuthReversal => "authReversal",
            Self::Void => "void",
            Self::Credit => "credit",
            Self::RegisterToken => "registerTokenRequest",
        }
    }

    /// Payload key of the response document
    pub const fn response_key(self) -> &'static str {
        match self {
            Self::Authorization => "authorizationResponse",
            Self::Sale => "saleResponse",
            Self::Capture => "captureResponse",
            Self::AuthReversal => "authReversalResponse",
            Self::Void => "voidResponse",
            Self::Credit => "creditResponse",
            Self::RegisterToken => "registerTokenResponse",
        }
    }

    /// Label used when reporting a failed transaction
    pub const fn transaction_type(self) -> &'static str {
        match self {
            Self::Authorization | Self::Sale => "Payment",
            Self::Capture => "Capture",
            Self::AuthReversal => "authReversal",
            Self::Void => "void",
            Self::Credit => "Refund",
            Self::RegisterToken => "Token registration",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_token_names() {
        assert_eq!(Operation::RegisterToken.element(), "registerTokenRequest");
        assert_eq!(Operation::RegisterToken.response_key(), "registerTokenResponse");
    }

    #[test]
    fn test_response_keys_follow_element() {
        for op in Operation::ALL {
            if op != Operation::RegisterToken {
                assert_eq!(op.response_key(), format!("{}Response", op.element()));
            }
        }
    }
}
