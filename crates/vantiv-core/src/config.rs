//! Gateway Configuration
//!
//! Resolves processor credentials and settings from layered sources with a
//! fixed precedence:
//!
//! ```text
//! secret store (environment)  >  stored configuration (JSON)  >  defaults
//! ```
//!
//! Credentials belong in the secret store; stored values are only a fallback.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Environment variable names of the secret store
pub mod env {
    pub const API_USER: &str = "VANTIV_API_USER";
    pub const API_PASS: &str = "VANTIV_API_PASS";
    pub const MERCHANT_ID_DEFAULT: &str = "VANTIV_API_MERCHANT_ID_DEFAULT";
    pub const PAYPAGE_ID: &str = "VANTIV_API_PAYPAGE_ID";
    /// Path of the stored configuration file
    pub const CONFIG_PATH: &str = "VANTIV_CONFIG";
}

/// Key of the fallback entry in the currency → merchant id map
pub const DEFAULT_MERCHANT_KEY: &str = "default";

const PRELIVE_ONLINE_URL: &str = "https://payments.vantivprelive.com/vap/communicator/online";
const LIVE_ONLINE_URL: &str = "https://payments.vantivcnp.com/vap/communicator/online";

/// Processor environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Test,
    Live,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }

    /// Default online transaction endpoint for this environment
    pub const fn online_endpoint(self) -> &'static str {
        match self {
            Self::Test => PRELIVE_ONLINE_URL,
            Self::Live => LIVE_ONLINE_URL,
        }
    }
}

/// Persisted gateway configuration. Every field has a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    pub user: String,
    pub password: String,
    /// Currency code → merchant id, with a `default` entry
    pub merchant_ids: HashMap<String, String>,
    pub paypage_id: String,
    pub url: String,
    pub proxy: String,
    pub timeout_ms: u64,
    pub report_group: String,
    pub mode: Mode,
    pub version: String,
}

impl Default for StoredConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: String::new(),
            merchant_ids: HashMap::from([(DEFAULT_MERCHANT_KEY.to_string(), String::new())]),
            paypage_id: String::new(),
            url: String::new(),
            proxy: String::new(),
            timeout_ms: 500,
            report_group: "Default Report Group".into(),
            mode: Mode::Test,
            version: "9.12".into(),
        }
    }
}

impl StoredConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PaymentError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

/// Deployment-time secret store overrides
#[derive(Debug, Default)]
pub struct SecretSource {
    pub user: Option<SecretString>,
    pub password: Option<SecretString>,
    pub merchant_id: Option<String>,
    pub paypage_id: Option<String>,
}

impl SecretSource {
    /// Read overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup. Empty values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            user: get(env::API_USER).map(SecretString::from),
            password: get(env::API_PASS).map(SecretString::from),
            merchant_id: get(env::MERCHANT_ID_DEFAULT),
            paypage_id: get(env::PAYPAGE_ID),
        }
    }
}

/// Resolved gateway configuration
#[derive(Debug)]
pub struct GatewayConfig {
    pub user: SecretString,
    pub password: SecretString,
    /// Currency code → merchant id; always holds a non-empty `default`
    pub merchant_ids: HashMap<String, String>,
    pub paypage_id: String,
    pub url: Option<String>,
    pub proxy: Option<String>,
    pub timeout: Duration,
    pub report_group: String,
    pub mode: Mode,
    pub version: String,
}

impl GatewayConfig {
    /// Merge the layers: secret store > stored configuration > defaults
    pub fn resolve(secrets: SecretSource, stored: StoredConfig) -> Result<Self> {
        if secrets.user.is_none() && !stored.user.is_empty() {
            tracing::warn!("API user read from stored configuration; set {} instead", env::API_USER);
        }
        if secrets.password.is_none() && !stored.password.is_empty() {
            tracing::warn!("API password read from stored configuration; set {} instead", env::API_PASS);
        }

        let user = secrets.user.unwrap_or_else(|| SecretString::from(stored.user));
        let password = secrets.password.unwrap_or_else(|| SecretString::from(stored.password));

        let mut merchant_ids = stored.merchant_ids;
        if let Some(merchant_id) = secrets.merchant_id {
            merchant_ids.insert(DEFAULT_MERCHANT_KEY.to_string(), merchant_id);
        }
        let paypage_id = secrets.paypage_id.unwrap_or(stored.paypage_id);

        if user.expose_secret().is_empty() {
            return Err(PaymentError::Config(format!("{} not set", env::API_USER)));
        }
        if password.expose_secret().is_empty() {
            return Err(PaymentError::Config(format!("{} not set", env::API_PASS)));
        }
        if merchant_ids.get(DEFAULT_MERCHANT_KEY).is_none_or(String::is_empty) {
            return Err(PaymentError::Config(format!(
                "{} not set",
                env::MERCHANT_ID_DEFAULT
            )));
        }

        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        Ok(Self {
            user,
            password,
            merchant_ids,
            paypage_id,
            url: non_empty(stored.url),
            proxy: non_empty(stored.proxy),
            timeout: Duration::from_millis(stored.timeout_ms),
            report_group: stored.report_group,
            mode: stored.mode,
            version: stored.version,
        })
    }

    /// Resolve from the process environment and the optional stored file
    pub fn from_env() -> Result<Self> {
        let stored = match std::env::var(env::CONFIG_PATH) {
            Ok(path) if !path.is_empty() => StoredConfig::from_file(path)?,
            _ => StoredConfig::default(),
        };
        Self::resolve(SecretSource::from_env(), stored)
    }

    /// Online transaction endpoint
    pub fn endpoint(&self) -> &str {
        self.url.as_deref().unwrap_or_else(|| self.mode.online_endpoint())
    }

    /// Merchant id for a currency, falling back to the default merchant
    pub fn merchant_id(&self, currency: &str) -> &str {
        self.merchant_ids
            .get(currency)
            .filter(|id| !id.is_empty())
            .or_else(|| self.merchant_ids.get(DEFAULT_MERCHANT_KEY))
            .map_or("", String::as_str)
    }

    pub fn default_merchant_id(&self) -> &str {
        self.merchant_id(DEFAULT_MERCHANT_KEY)
    }

    pub fn is_test(&self) -> bool {
        self.mode == Mode::Test
    }
}
