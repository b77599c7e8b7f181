//! eProtect Settings
//!
//! What the backend hands to the page: the processor environment and which
//! form variant is being enhanced.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser-side ceiling for one tokenization round trip
pub const TOKENIZATION_TIMEOUT: Duration = Duration::from_millis(15_000);

const LIVE_HOST: &str = "https://request.securepaypage-litle.com";
const PRELIVE_HOST: &str = "https://request-prelive.np-securepaypage-litle.com";
const LIBRARY_PATH: &str = "/LitlePayPage/litle-api2.js";

/// eProtect environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Live,
    #[serde(rename = "prelive")]
    PreLive,
}

impl Environment {
    /// `live` selects production; every other mode uses pre-live
    pub fn from_mode(mode: &str) -> Self {
        if mode == "live" { Self::Live } else { Self::PreLive }
    }

    /// eProtect host without a trailing slash
    pub const fn host(self) -> &'static str {
        match self {
            Self::Live => LIVE_HOST,
            Self::PreLive => PRELIVE_HOST,
        }
    }

    /// URL of the browser-loadable tokenization library
    pub fn library_url(self) -> String {
        format!("{}{LIBRARY_PATH}", self.host())
    }
}

/// Which payment form the client is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormVariant {
    /// "Add payment method" inside the checkout payment pane
    CheckoutPane,
    /// Standalone stored-payment-method creation form
    PaymentMethodCreate,
}

impl FormVariant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "checkout_pane" => Some(Self::CheckoutPane),
            "payment_method_create" => Some(Self::PaymentMethodCreate),
            _ => None,
        }
    }
}

/// Settings object passed from the backend to the page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EprotectSettings {
    /// Gateway mode: "live" or "test"
    pub mode: String,
    pub variant: FormVariant,
}

impl EprotectSettings {
    pub fn new(mode: impl Into<String>, variant: FormVariant) -> Self {
        Self {
            mode: mode.into(),
            variant,
        }
    }

    pub fn environment(&self) -> Environment {
        Environment::from_mode(&self.mode)
    }

    pub fn host(&self) -> &'static str {
        self.environment().host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_hosts() {
        assert_eq!(Environment::from_mode("live").host(), LIVE_HOST);
        assert_eq!(Environment::from_mode("test").host(), PRELIVE_HOST);
        assert_eq!(
            Environment::Live.library_url(),
            "https://request.securepaypage-litle.com/LitlePayPage/litle-api2.js"
        );
    }

    #[test]
    fn test_settings_json() {
        let settings: EprotectSettings =
            serde_json::from_str(r#"{"mode":"live","variant":"checkout_pane"}"#).unwrap();
        assert_eq!(settings.variant, FormVariant::CheckoutPane);
        assert_eq!(settings.environment(), Environment::Live);
    }
}
