//! Form Boundary
//!
//! Stable identifiers of the hidden fields exchanged between the page, the
//! processor and the merchant backend, the selectors the client targets per
//! form variant, and the request/response shapes of the tokenization call.
//!
//! Raw card inputs never carry a `name` attribute, so an ordinary form
//! submission cannot send card data to the merchant backend.

use std::borrow::Cow;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::settings::FormVariant;

/// Hidden request fields rendered by the backend
pub mod request {
    pub const PAYPAGE_ID: &str = "request$paypageId";
    pub const MERCHANT_TXN_ID: &str = "request$merchantTxnId";
    pub const ORDER_ID: &str = "request$orderId";
    pub const REPORT_GROUP: &str = "request$reportGroup";
}

/// Hidden response fields written by the client, read by the backend
pub mod response {
    pub const REGISTRATION_ID: &str = "response$paypageRegistrationId";
    pub const BIN: &str = "response$bin";
    pub const CODE: &str = "response$code";
    pub const MESSAGE: &str = "response$message";
    pub const RESPONSE_TIME: &str = "response$responseTime";
    pub const TYPE: &str = "response$type";
    pub const TXN_ID: &str = "response$litleTxnId";
    pub const FIRST_SIX: &str = "response$firstSix";
    pub const LAST_FOUR: &str = "response$lastFour";

    pub const ALL: [&str; 9] = [
        REGISTRATION_ID,
        BIN,
        CODE,
        MESSAGE,
        RESPONSE_TIME,
        TYPE,
        TXN_ID,
        FIRST_SIX,
        LAST_FOUR,
    ];
}

/// Expiration inputs posted with the ordinary form submission
pub mod expiration {
    pub const MONTH: &str = "expiration$month";
    pub const YEAR: &str = "expiration$year";
}

/// Names a form builder gives the raw card inputs. They are stripped before
/// the markup reaches the page.
pub mod card {
    pub const NUMBER: &str = "payment_details[number]";
    pub const SECURITY_CODE: &str = "payment_details[security_code]";
}

/// Attribute marking a submit activation that should pass through
pub const PASSTHROUGH_ATTRIBUTE: &str = "data-eprotect-passthrough";

/// Primary submit control of a form variant
pub const fn submit_selector(variant: FormVariant) -> &'static str {
    match variant {
        FormVariant::CheckoutPane => "#edit-actions #edit-actions-next",
        FormVariant::PaymentMethodCreate => "#payment-method-add-form #edit-submit",
    }
}

/// Selectors of the raw card inputs of a form variant
pub const fn card_input_selectors(variant: FormVariant) -> CardInputs {
    match variant {
        FormVariant::CheckoutPane => CardInputs {
            account_number: "[data-eprotect-selector=\"payment-information-card-number\"]",
            security_code: "[data-eprotect-selector=\"payment-information-security-code\"]",
        },
        FormVariant::PaymentMethodCreate => CardInputs {
            account_number: "[data-eprotect-selector=\"payment-method-card-number\"]",
            security_code: "[data-eprotect-selector=\"payment-method-security-code\"]",
        },
    }
}

/// Raw card input selectors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardInputs {
    pub account_number: &'static str,
    pub security_code: &'static str,
}

/// Fields handed to the tokenization library: where to read card data and
/// where the library writes its own two response values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMap {
    pub account_num: String,
    pub cvv2: String,
    pub paypage_registration_id: String,
    pub bin: String,
}

impl FieldMap {
    pub fn for_variant(variant: FormVariant) -> Self {
        let inputs = card_input_selectors(variant);
        Self {
            account_num: inputs.account_number.to_string(),
            cvv2: inputs.security_code.to_string(),
            paypage_registration_id: format!("#{}", css_escape_id(response::REGISTRATION_ID)),
            bin: format!("#{}", css_escape_id(response::BIN)),
        }
    }
}

/// Tokenization request sent from the browser to the processor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EprotectRequest {
    pub paypage_id: String,
    pub report_group: String,
    pub order_id: String,
    /// Merchant transaction id
    pub id: String,
    /// eProtect host
    pub url: String,
}

/// Tokenization response delivered to the success/error callbacks
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenizationResponse {
    pub paypage_registration_id: String,
    pub bin: String,
    /// Response code
    pub response: String,
    pub message: String,
    pub response_time: String,
    pub litle_txn_id: String,
    /// Processor card brand code
    #[serde(rename = "type")]
    pub card_type: String,
    pub first_six: String,
    pub last_four: String,
}

impl TokenizationResponse {
    /// Values to write into the hidden response fields
    pub fn hidden_values(&self) -> [(&'static str, &str); 9] {
        [
            (response::REGISTRATION_ID, &self.paypage_registration_id),
            (response::BIN, &self.bin),
            (response::CODE, &self.response),
            (response::MESSAGE, &self.message),
            (response::RESPONSE_TIME, &self.response_time),
            (response::TYPE, &self.card_type),
            (response::TXN_ID, &self.litle_txn_id),
            (response::FIRST_SIX, &self.first_six),
            (response::LAST_FOUR, &self.last_four),
        ]
    }
}

/// A hidden input the backend renders into the payment form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiddenField {
    pub id: String,
    pub value: String,
}

impl HiddenField {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Hidden request fields with their values. A missing order id renders as `0`.
pub fn hidden_request_fields(
    paypage_id: &str,
    merchant_txn_id: &str,
    order_id: Option<&str>,
    report_group: &str,
) -> Vec<HiddenField> {
    vec![
        HiddenField::new(request::PAYPAGE_ID, paypage_id),
        HiddenField::new(request::MERCHANT_TXN_ID, merchant_txn_id),
        HiddenField::new(request::ORDER_ID, order_id.unwrap_or("0")),
        HiddenField::new(request::REPORT_GROUP, report_group),
    ]
}

/// Empty hidden response fields
pub fn hidden_response_fields() -> Vec<HiddenField> {
    response::ALL.iter().map(|id| HiddenField::new(*id, "")).collect()
}

/// Remove the `name` attribute carrying `name` from rendered markup
pub fn strip_name_attribute<'a>(markup: &'a str, name: &str) -> Cow<'a, str> {
    let pattern = format!(r#"\sname\s*=\s*['"]?{}['"]?"#, regex::escape(name));
    match Regex::new(&pattern) {
        Ok(re) => re.replace_all(markup, ""),
        Err(e) => {
            tracing::error!(error = %e, "Invalid name pattern");
            Cow::Borrowed(markup)
        }
    }
}

/// Raw card inputs of a variant as the backend renders them: marked for the
/// client, with their `name` attributes removed.
pub fn card_input_markup(variant: FormVariant) -> String {
    let inputs = card_input_selectors(variant);
    let marker = |selector: &'static str| selector.trim_start_matches('[').trim_end_matches(']');
    let markup = format!(
        r#"<input type="text" {} name="{}" autocomplete="cc-number" maxlength="19">
<input type="text" {} name="{}" autocomplete="cc-csc" maxlength="4">"#,
        marker(inputs.account_number),
        card::NUMBER,
        marker(inputs.security_code),
        card::SECURITY_CODE,
    );
    let markup = strip_name_attribute(&markup, card::NUMBER);
    strip_name_attribute(&markup, card::SECURITY_CODE).into_owned()
}

/// Escape `$` so an id can be used in a CSS `#id` selector
fn css_escape_id(id: &str) -> String {
    id.replace('$', "\\$")
}
