//! Request Documents
//!
//! Wire structures of the processor's online request document. Every
//! request carries the same envelope (schema version, merchant id and
//! credentials) around exactly one transaction element:
//!
//! ```text
//! <litleOnlineRequest version=".." xmlns=".." merchantId="..">
//!   <authentication><user/><password/></authentication>
//!   <sale id=".." reportGroup=".."> ... </sale>
//! </litleOnlineRequest>
//! ```

use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::Serialize;
use sha2::{Digest, Sha256};

use vantiv_core::normalize::format_amount;
use vantiv_core::{GatewayConfig, PaymentError, Result};

use crate::operation::Operation;

pub const SCHEMA_NAMESPACE: &str = "http://www.litle.com/schema";
const ROOT_ELEMENT: &str = "litleOnlineRequest";
const ORDER_SOURCE: &str = "ecommerce";
const MAX_ID_LEN: usize = 25;

/// Deterministic transaction id: the same payment, operation and amount
/// always yield the same id, so a retry reuses it.
pub fn request_id(payment_id: &str, operation: Operation, amount: Option<&Decimal>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payment_id.as_bytes());
    hasher.update(b":");
    hasher.update(operation.element().as_bytes());
    if let Some(amount) = amount {
        hasher.update(b":");
        hasher.update(format_amount(amount).as_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(MAX_ID_LEN);
    id
}

/// Processor credentials
#[derive(Clone, Serialize)]
pub struct Authentication {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillToAddress {
    pub name: String,
    pub address_line1: String,
    pub city: String,
    /// Two-letter subdivision code
    pub state: String,
    pub zip: String,
    pub country: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub litle_token: String,
    /// `MMYY`
    pub exp_date: String,
}

/// Body shared by `authorization` and `sale`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@reportGroup")]
    pub report_group: String,
    #[serde(rename = "@customerId", skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub order_id: String,
    pub amount: String,
    pub order_source: String,
    pub bill_to_address: BillToAddress,
    pub token: TokenData,
}

impl PaymentBody {
    pub fn new(
        id: String,
        report_group: &str,
        order_id: &str,
        amount: &Decimal,
        bill_to_address: BillToAddress,
        token: TokenData,
    ) -> Self {
        Self {
            id,
            report_group: report_group.to_string(),
            customer_id: None,
            order_id: order_id.to_string(),
            amount: format_amount(amount),
            order_source: ORDER_SOURCE.to_string(),
            bill_to_address,
            token,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@reportGroup")]
    pub report_group: String,
    /// Set on every capture split off an authorization
    #[serde(rename = "@partial", skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    pub litle_txn_id: String,
    pub amount: String,
}

/// Body of `authReversal` and `void`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceBody {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@reportGroup")]
    pub report_group: String,
    pub litle_txn_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBody {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@reportGroup")]
    pub report_group: String,
    pub litle_txn_id: String,
    pub amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTokenBody {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@reportGroup")]
    pub report_group: String,
    #[serde(rename = "@customerId", skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub paypage_registration_id: String,
}

/// One transaction element with its body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    Authorization(PaymentBody),
    Sale(PaymentBody),
    Capture(CaptureBody),
    AuthReversal(ReferenceBody),
    Void(ReferenceBody),
    Credit(CreditBody),
    RegisterToken(RegisterTokenBody),
}

impl Transaction {
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Authorization(_) => Operation::Authorization,
            Self::Sale(_) => Operation::Sale,
            Self::Capture(_) => Operation::Capture,
            Self::AuthReversal(_) => Operation::AuthReversal,
            Self::Void(_) => Operation::Void,
            Self::Credit(_) => Operation::Credit,
            Self::RegisterToken(_) => Operation::RegisterToken,
        }
    }

    /// Transaction id attribute
    pub fn id(&self) -> &str {
        match self {
            Self::Authorization(body) | Self::Sale(body) => &body.id,
            Self::Capture(body) => &body.id,
            Self::AuthReversal(body) | Self::Void(body) => &body.id,
            Self::Credit(body) => &body.id,
            Self::RegisterToken(body) => &body.id,
        }
    }
}

/// Complete online request document
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineRequest {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "@merchantId")]
    pub merchant_id: String,
    pub authentication: Authentication,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<PaymentBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<PaymentBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture: Option<CaptureBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_reversal: Option<ReferenceBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub void: Option<ReferenceBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<CreditBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_token_request: Option<RegisterTokenBody>,
}

impl OnlineRequest {
    /// Wrap a transaction in the envelope for the given merchant
    pub fn new(config: &GatewayConfig, merchant_id: &str, transaction: Transaction) -> Self {
        let mut request = Self {
            version: config.version.clone(),
            xmlns: SCHEMA_NAMESPACE.to_string(),
            merchant_id: merchant_id.to_string(),
            authentication: Authentication {
                user: config.user.expose_secret().to_string(),
                password: config.password.expose_secret().to_string(),
            },
            authorization: None,
            sale: None,
            capture: None,
            auth_reversal: None,
            void: None,
            credit: None,
            register_token_request: None,
        };
        match transaction {
            Transaction::Authorization(body) => request.authorization = Some(body),
            Transaction::Sale(body) => request.sale = Some(body),
            Transaction::Capture(body) => request.capture = Some(body),
            Transaction::AuthReversal(body) => request.auth_reversal = Some(body),
            Transaction::Void(body) => request.void = Some(body),
            Transaction::Credit(body) => request.credit = Some(body),
            Transaction::RegisterToken(body) => request.register_token_request = Some(body),
        }
        request
    }

    /// The single transaction element carried by this request
    pub fn transaction(&self) -> Option<Transaction> {
        let Self {
            authorization,
            sale,
            capture,
            auth_reversal,
            void,
            credit,
            register_token_request,
            ..
        } = self.clone();
        authorization
            .map(Transaction::Authorization)
            .or_else(|| sale.map(Transaction::Sale))
            .or_else(|| capture.map(Transaction::Capture))
            .or_else(|| auth_reversal.map(Transaction::AuthReversal))
            .or_else(|| void.map(Transaction::Void))
            .or_else(|| credit.map(Transaction::Credit))
            .or_else(|| register_token_request.map(Transaction::RegisterToken))
    }

    pub fn operation(&self) -> Option<Operation> {
        self.transaction().map(|t| t.operation())
    }

    /// Serialize to an XML document with declaration
    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string_with_root(ROOT_ELEMENT, self)
            .map_err(|e| PaymentError::Codec(e.to_string()))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use vantiv_core::{SecretSource, StoredConfig};

    fn config() -> GatewayConfig {
        let secrets = SecretSource::from_lookup(|key| match key {
            "VANTIV_API_USER" => Some("merchant-user".into()),
            "VANTIV_API_PASS" => Some("s3cret".into()),
            "VANTIV_API_MERCHANT_ID_DEFAULT" => Some("01234".into()),
            _ => None,
        });
        GatewayConfig::resolve(secrets, StoredConfig::default()).unwrap()
    }

    #[test]
    fn test_request_id_deterministic() {
        let a = request_id("pay-1", Operation::Capture, Some(&dec!(10.00)));
        let b = request_id("pay-1", Operation::Capture, Some(&dec!(10.00)));
        let c = request_id("pay-1", Operation::Capture, Some(&dec!(5.00)));
        let d = request_id("pay-1", Operation::Credit, Some(&dec!(10.00)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.len(), 25);
    }

    #[test]
    fn test_capture_xml() {
        let request = OnlineRequest::new(
            &config(),
            "01234",
            Transaction::Capture(CaptureBody {
                id: "abc".into(),
                report_group: "Default Report Group".into(),
                partial: Some(true),
                litle_txn_id: "82924701437133501".into(),
                amount: format_amount(&dec!(5.50)),
            }),
        );
        let xml = request.to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><litleOnlineRequest"));
        assert!(xml.contains(r#"merchantId="01234""#));
        assert!(xml.contains(r#"xmlns="http://www.litle.com/schema""#));
        assert!(xml.contains(r#"<capture id="abc" reportGroup="Default Report Group" partial="true">"#));
        assert!(xml.contains("<litleTxnId>82924701437133501</litleTxnId>"));
        assert!(xml.contains("<amount>550</amount>"));
        assert!(!xml.contains("<sale"));
        assert_eq!(request.operation(), Some(Operation::Capture));
    }

    #[test]
    fn test_register_token_xml() {
        let request = OnlineRequest::new(
            &config(),
            "01234",
            Transaction::RegisterToken(RegisterTokenBody {
                id: "xyz".into(),
                report_group: "Default Report Group".into(),
                customer_id: Some("42".into()),
                paypage_registration_id: "reg-1".into(),
            }),
        );
        let xml = request.to_xml().unwrap();
        assert!(xml.contains(r#"<registerTokenRequest id="xyz" reportGroup="Default Report Group" customerId="42">"#));
        assert!(xml.contains("<paypageRegistrationId>reg-1</paypageRegistrationId>"));
    }

    #[test]
    fn test_password_not_in_debug() {
        let request = OnlineRequest::new(
            &config(),
            "01234",
            Transaction::Void(ReferenceBody {
                id: "v".into(),
                report_group: "g".into(),
                litle_txn_id: "1".into(),
            }),
        );
        assert!(!format!("{request:?}").contains("s3cret"));
    }
}
