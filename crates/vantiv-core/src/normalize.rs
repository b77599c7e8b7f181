//! Amount and Card Normalizers
//!
//! Pure conversions between the merchant's vocabulary and the processor's:
//! minor-unit amounts, card brand codes, card expiration formats and the
//! authorization lifespan per brand.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

const DAY_SECONDS: i64 = 86_400;

/// Card brands accepted by the processor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Amex,
    #[serde(rename = "dc")]
    DinersClub,
    Discover,
    Jcb,
    Mastercard,
    Visa,
}

impl CardBrand {
    /// Merchant-side brand code (e.g. "visa")
    pub const fn merchant_code(self) -> &'static str {
        match self {
            Self::Amex => "amex",
            Self::DinersClub => "dc",
            Self::Discover => "discover",
            Self::Jcb => "jcb",
            Self::Mastercard => "mastercard",
            Self::Visa => "visa",
        }
    }

    /// Processor brand code (e.g. "VI")
    pub const fn processor_code(self) -> &'static str {
        match self {
            Self::Amex => "AX",
            Self::DinersClub => "DC",
            Self::Discover => "DI",
            Self::Jcb => "JC",
            Self::Mastercard => "MC",
            Self::Visa => "VI",
        }
    }

    /// Parse a merchant-side brand code. "dci" is accepted as an alias of "dc".
    pub fn from_merchant_code(code: &str) -> Option<Self> {
        match code {
            "amex" => Some(Self::Amex),
            "dc" | "dci" => Some(Self::DinersClub),
            "discover" => Some(Self::Discover),
            "jcb" => Some(Self::Jcb),
            "mastercard" => Some(Self::Mastercard),
            "visa" => Some(Self::Visa),
            _ => None,
        }
    }

    /// Parse a processor brand code
    pub fn from_processor_code(code: &str) -> Option<Self> {
        match code {
            "AX" => Some(Self::Amex),
            "DC" => Some(Self::DinersClub),
            "DI" => Some(Self::Discover),
            "JC" => Some(Self::Jcb),
            "MC" => Some(Self::Mastercard),
            "VI" => Some(Self::Visa),
            _ => None,
        }
    }

    /// How long an authorization on this brand stays capturable
    pub fn authorization_lifespan(self) -> Duration {
        match self {
            Self::Discover => Duration::seconds(10 * DAY_SECONDS),
            _ => Duration::seconds(7 * DAY_SECONDS),
        }
    }
}

impl std::fmt::Display for CardBrand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.merchant_code())
    }
}

/// Map a merchant brand code to the processor's code
pub fn processor_brand_code(merchant_code: &str) -> Option<&'static str> {
    CardBrand::from_merchant_code(merchant_code).map(CardBrand::processor_code)
}

/// Map a processor brand code to the merchant's code
pub fn merchant_brand_code(processor_code: &str) -> Option<&'static str> {
    CardBrand::from_processor_code(processor_code).map(CardBrand::merchant_code)
}

/// Format a decimal amount in the processor's minor-unit format.
///
/// The decimal point is removed as written, without re-scaling:
/// - `22.00` becomes `2200`
/// - `22` becomes `2200`
/// - `5.5` becomes `55`
pub fn format_amount(amount: &Decimal) -> String {
    format_amount_str(&amount.to_string())
}

/// Same as [`format_amount`] for an amount already rendered as text
pub fn format_amount_str(amount: &str) -> String {
    if amount.contains('.') {
        amount.replace('.', "")
    } else {
        format!("{amount}00")
    }
}

/// Card expiration date formatted `MMYY`
pub fn format_exp_date(month: u32, year: i32) -> String {
    let year = year.to_string();
    let short_year = &year[year.len().saturating_sub(2)..];
    format!("{month:02}{short_year}")
}

/// Timestamp at which a card with the given expiration stops being valid:
/// the first instant of the month following the expiration month.
pub fn expiration_timestamp(month: u32, year: i32) -> Result<DateTime<Utc>> {
    if !(1..=12).contains(&month) {
        return Err(PaymentError::InvalidArgument(format!(
            "expiration month {month} is out of range"
        )));
    }
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let date = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        PaymentError::InvalidArgument(format!("invalid expiration {month}/{year}"))
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        PaymentError::InvalidArgument(format!("invalid expiration {month}/{year}"))
    })?;
    Ok(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_format() {
        assert_eq!(format_amount(&dec!(22.00)), "2200");
        assert_eq!(format_amount(&dec!(22)), "2200");
        assert_eq!(format_amount(&dec!(5.5)), "55");
        assert_eq!(format_amount_str("22.00"), "2200");
        assert_eq!(format_amount_str("22"), "2200");
        assert_eq!(format_amount_str("5.5"), "55");
    }

    #[test]
    fn test_brand_round_trip() {
        let processor = processor_brand_code("visa").unwrap();
        assert_eq!(processor, "VI");
        assert_eq!(merchant_brand_code(processor), Some("visa"));

        for brand in [
            CardBrand::Amex,
            CardBrand::DinersClub,
            CardBrand::Discover,
            CardBrand::Jcb,
            CardBrand::Mastercard,
            CardBrand::Visa,
        ] {
            assert_eq!(CardBrand::from_processor_code(brand.processor_code()), Some(brand));
            assert_eq!(CardBrand::from_merchant_code(brand.merchant_code()), Some(brand));
        }
    }

    #[test]
    fn test_unknown_brand() {
        assert_eq!(merchant_brand_code("ZZ"), None);
        assert_eq!(processor_brand_code("unionpay"), None);
        assert_eq!(processor_brand_code("dci"), Some("DC"));
    }

    #[test]
    fn test_authorization_lifespan() {
        assert_eq!(CardBrand::Discover.authorization_lifespan().num_seconds(), 10 * 86_400);
        assert_eq!(CardBrand::Visa.authorization_lifespan().num_seconds(), 7 * 86_400);
        assert_eq!(CardBrand::Amex.authorization_lifespan().num_seconds(), 7 * 86_400);
        assert_eq!(CardBrand::Mastercard.authorization_lifespan().num_seconds(), 7 * 86_400);
    }

    #[test]
    fn test_exp_date() {
        assert_eq!(format_exp_date(3, 2027), "0327");
        assert_eq!(format_exp_date(11, 2030), "1130");
    }

    #[test]
    fn test_expiration_timestamp() {
        let ts = expiration_timestamp(12, 2026).unwrap();
        assert_eq!(ts.to_rfc3339(), "2027-01-01T00:00:00+00:00");
        assert!(expiration_timestamp(13, 2026).is_err());
    }
}
