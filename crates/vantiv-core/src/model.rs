//! Domain Models
//!
//! Payments, stored payment methods and the billing data that travels with
//! them. Uses `rust_decimal` for all monetary values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::{format_exp_date, CardBrand};

/// Unique payment identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique stored payment method identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(String);

impl PaymentMethodId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PaymentMethodId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentMethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment lifecycle states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    New,
    Authorized,
    /// Captured and completed
    Captured,
    AuthorizationVoided,
    PartiallyRefunded,
    Refunded,
    Declined,
}

impl PaymentState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::AuthorizationVoided => "authorization_voided",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Declined => "declined",
        }
    }

    /// No further money movement is possible from this state
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AuthorizationVoided | Self::Refunded | Self::Declined)
    }

    /// Money has been captured (whether or not some was refunded)
    pub const fn is_captured(self) -> bool {
        matches!(self, Self::Captured | Self::PartiallyRefunded | Self::Refunded)
    }

    /// Whether the transition table allows moving from `self` to `next`
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Authorized | Self::Captured | Self::Declined)
                | (Self::Authorized, Self::Captured | Self::AuthorizationVoided | Self::Declined)
                | (Self::Captured, Self::PartiallyRefunded | Self::Refunded | Self::Declined)
                | (Self::PartiallyRefunded, Self::PartiallyRefunded | Self::Refunded | Self::Declined)
        )
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One money-movement attempt against an order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    /// Order this payment belongs to
    pub order_id: String,

    /// Stored payment method charged by this payment
    pub payment_method_id: PaymentMethodId,

    /// Amount (authorized, then captured)
    pub amount: Decimal,

    /// ISO 4217 currency code
    pub currency: String,

    pub state: PaymentState,

    /// Processor transaction id of the last successful remote call
    pub remote_id: Option<String>,

    pub authorized_at: Option<DateTime<Utc>>,

    /// Only set while the payment is authorized
    pub authorization_expires_at: Option<DateTime<Utc>>,

    pub captured_at: Option<DateTime<Utc>>,

    /// Running refunded total, never above `amount`
    pub refunded_amount: Decimal,

    /// Marks the transient duplicate created for a split capture
    #[serde(skip)]
    pub partial: bool,

    /// Created against the processor's test environment
    pub test: bool,

    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a payment in the `new` state
    pub fn new(
        order_id: impl Into<String>,
        payment_method_id: PaymentMethodId,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_id: order_id.into(),
            payment_method_id,
            amount,
            currency: currency.into(),
            state: PaymentState::New,
            remote_id: None,
            authorized_at: None,
            authorization_expires_at: None,
            captured_at: None,
            refunded_amount: Decimal::ZERO,
            partial: false,
            test: false,
            created_at: Utc::now(),
        }
    }

    /// Unrefunded balance
    pub fn balance(&self) -> Decimal {
        self.amount - self.refunded_amount
    }

    /// Copy of this payment under a fresh id
    pub fn duplicate(&self) -> Self {
        Self {
            id: PaymentId::new(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Whether an authorization is still capturable at `now`
    pub fn authorization_expired(&self, now: DateTime<Utc>) -> bool {
        if self.state != PaymentState::Authorized {
            return true;
        }
        self.authorization_expires_at.is_none_or(|expires| expires <= now)
    }

    /// Time of the last remote transaction (capture time once captured)
    pub fn last_transaction_at(&self) -> Option<DateTime<Utc>> {
        if self.state.is_captured() {
            self.captured_at.or(self.authorized_at)
        } else {
            self.authorized_at
        }
    }
}

/// Postal address and contact data of the payer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingProfile {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub locality: String,
    /// Region, e.g. "US-CA" or "CA"
    #[serde(default)]
    pub administrative_area: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub email: String,
}

impl BillingProfile {
    /// Full name as printed on the bill
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name).trim().to_string()
    }

    /// Two-letter state code (last two characters of the region)
    pub fn state_code(&self) -> &str {
        let area = self.administrative_area.as_str();
        let start = area
            .char_indices()
            .rev()
            .nth(1)
            .map_or(0, |(idx, _)| idx);
        &area[start..]
    }
}

/// A reusable stored-card reference
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,

    /// Owning customer; `None` for guest checkout
    pub owner_id: Option<String>,

    pub brand: CardBrand,

    pub last_four: String,

    pub exp_month: u32,

    pub exp_year: i32,

    /// Registration id until registered, then the durable processor token
    pub remote_id: String,

    /// Instant the card stops being valid
    pub expires_at: DateTime<Utc>,

    pub reusable: bool,

    pub billing_profile: BillingProfile,

    pub created_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Whether the method can no longer be charged at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Expiration in the processor's `MMYY` format
    pub fn exp_date(&self) -> String {
        format_exp_date(self.exp_month, self.exp_year)
    }

    /// Guest methods are never reusable
    pub const fn is_guest(&self) -> bool {
        self.owner_id.is_none()
    }
}
