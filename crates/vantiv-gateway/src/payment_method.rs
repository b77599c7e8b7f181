//! Payment-Method Lifecycle
//!
//! Stored payment methods are created from the hidden fields the browser
//! handshake posts with the payment form, then upgraded from the
//! short-lived registration id to a durable processor token.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use vantiv_core::normalize::expiration_timestamp;
use vantiv_core::{
    BillingProfile, CardBrand, PaymentError, PaymentMethod, PaymentMethodId, Result,
};
use vantiv_eprotect::fields::{expiration, response};

use crate::gateway::TransactionGateway;

/// Tokenization result posted by the payment form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizedCard {
    pub brand: CardBrand,
    pub registration_id: String,
    pub last_four: String,
    pub exp_month: u32,
    pub exp_year: i32,
}

impl TokenizedCard {
    /// Read and validate the posted form fields.
    ///
    /// Brand code, registration id and expiration are required. An
    /// unrecognized brand is rejected rather than stored.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| {
            fields
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    PaymentError::InvalidArgument(format!("payment details must contain the {key} key"))
                })
        };

        let card_type = required(response::TYPE)?;
        let registration_id = required(response::REGISTRATION_ID)?;
        let month = required(expiration::MONTH)?;
        let year = required(expiration::YEAR)?;

        let brand = CardBrand::from_processor_code(card_type)
            .ok_or_else(|| PaymentError::InvalidArgument("unsupported card type".into()))?;
        let exp_month = month
            .parse()
            .map_err(|_| PaymentError::InvalidArgument(format!("invalid expiration month {month}")))?;
        let exp_year = year
            .parse()
            .map_err(|_| PaymentError::InvalidArgument(format!("invalid expiration year {year}")))?;

        Ok(Self {
            brand,
            registration_id: registration_id.to_string(),
            last_four: fields
                .get(response::LAST_FOUR)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            exp_month,
            exp_year,
        })
    }

    /// Instant the card stops being valid; fails if that is already past
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let expires_at = expiration_timestamp(self.exp_month, self.exp_year)?;
        if expires_at <= now {
            return Err(PaymentError::ExpiredMethod(format!(
                "card expired {:02}/{}",
                self.exp_month, self.exp_year
            )));
        }
        Ok(expires_at)
    }
}

impl TransactionGateway {
    /// Store a tokenized card and register its durable token.
    ///
    /// Guest methods (no owner, or a blank one) are never reusable. If token
    /// registration fails the provisional record is removed again.
    pub async fn create_payment_method(
        &self,
        owner_id: Option<String>,
        billing_profile: BillingProfile,
        card: TokenizedCard,
    ) -> Result<PaymentMethod> {
        let owner_id = owner_id.filter(|owner| !owner.trim().is_empty());
        let now = Utc::now();
        let expires_at = card.expires_at(now)?;

        let mut method = PaymentMethod {
            id: PaymentMethodId::new(),
            reusable: owner_id.is_some(),
            owner_id,
            brand: card.brand,
            last_four: card.last_four,
            exp_month: card.exp_month,
            exp_year: card.exp_year,
            remote_id: card.registration_id,
            expires_at,
            billing_profile,
            created_at: now,
        };
        self.payment_methods().save(&method)?;

        if let Err(e) = self.register_token(&mut method).await {
            if let Err(cleanup) = self.payment_methods().delete(&method.id) {
                tracing::error!(
                    payment_method_id = %method.id,
                    error = %cleanup,
                    "Failed to remove payment method after failed registration"
                );
            }
            return Err(e);
        }

        tracing::info!(
            payment_method_id = %method.id,
            brand = %method.brand,
            reusable = method.reusable,
            "Payment method created"
        );
        Ok(method)
    }

    /// Remove a stored payment method.
    ///
    /// The processor offers no token revocation call here; the token simply
    /// stops being referenced.
    pub fn delete_payment_method(&self, id: &PaymentMethodId) -> Result<()> {
        let Some(method) = self.payment_methods().get(id)? else {
            return Err(PaymentError::InvalidArgument(format!(
                "payment method {id} not found"
            )));
        };
        self.payment_methods().delete(&method.id)?;
        tracing::info!(payment_method_id = %id, "Payment method deleted locally");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vantiv_core::{
        GatewayConfig, MemoryPaymentMethodStore, MemoryPaymentStore, PaymentMethodStore,
        SecretSource, StoredConfig,
    };

    use crate::operation::Operation;
    use crate::transport::MockTransactionApi;

    /// Method store whose deletes always fail
    #[derive(Default)]
    struct UndeletableStore(MemoryPaymentMethodStore);

    impl PaymentMethodStore for UndeletableStore {
        fn save(&self, method: &PaymentMethod) -> Result<()> {
            self.0.save(method)
        }

        fn get(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>> {
            self.0.get(id)
        }

        fn delete(&self, _id: &PaymentMethodId) -> Result<()> {
            Err(PaymentError::Storage("disk full".into()))
        }
    }

    fn gateway(api: Arc<MockTransactionApi>, methods: Arc<dyn PaymentMethodStore>) -> TransactionGateway {
        let secrets = SecretSource::from_lookup(|key| match key {
            "VANTIV_API_USER" => Some("user".into()),
            "VANTIV_API_PASS" => Some("pass".into()),
            "VANTIV_API_MERCHANT_ID_DEFAULT" => Some("01234".into()),
            _ => None,
        });
        let config = Arc::new(GatewayConfig::resolve(secrets, StoredConfig::default()).unwrap());
        TransactionGateway::new(config, api, Arc::new(MemoryPaymentStore::new()), methods)
    }

    fn posted(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn valid() -> HashMap<String, String> {
        posted(&[
            (response::TYPE, "VI"),
            (response::REGISTRATION_ID, "reg-123"),
            (response::LAST_FOUR, "1111"),
            (expiration::MONTH, "12"),
            (expiration::YEAR, "2099"),
        ])
    }

    #[test]
    fn test_from_fields() {
        let card = TokenizedCard::from_fields(&valid()).unwrap();
        assert_eq!(card.brand, CardBrand::Visa);
        assert_eq!(card.registration_id, "reg-123");
        assert_eq!(card.exp_month, 12);
    }

    #[test]
    fn test_missing_required_field() {
        for key in [response::TYPE, response::REGISTRATION_ID, expiration::MONTH] {
            let mut fields = valid();
            fields.remove(key);
            let err = TokenizedCard::from_fields(&fields).unwrap_err();
            assert!(matches!(err, PaymentError::InvalidArgument(_)), "{key}");
            assert!(err.to_string().contains(key));
        }
    }

    #[test]
    fn test_unknown_brand_rejected() {
        let mut fields = valid();
        fields.insert(response::TYPE.to_string(), "ZZ".into());
        let err = TokenizedCard::from_fields(&fields).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: unsupported card type");
    }

    #[tokio::test]
    async fn test_blank_owner_is_guest() {
        let gateway = gateway(
            Arc::new(MockTransactionApi::new()),
            Arc::new(MemoryPaymentMethodStore::new()),
        );
        for owner in ["", "   "] {
            let card = TokenizedCard::from_fields(&valid()).unwrap();
            let method = gateway
                .create_payment_method(Some(owner.into()), BillingProfile::default(), card)
                .await
                .unwrap();
            assert_eq!(method.owner_id, None, "{owner:?}");
            assert!(!method.reusable);
            assert!(method.is_guest());
        }
    }

    #[tokio::test]
    async fn test_registration_error_survives_failed_cleanup() {
        let api = Arc::new(MockTransactionApi::new());
        api.respond_with(Operation::RegisterToken, "875");
        let gateway = gateway(api, Arc::new(UndeletableStore::default()));

        let card = TokenizedCard::from_fields(&valid()).unwrap();
        let err = gateway
            .create_payment_method(Some("7".into()), BillingProfile::default(), card)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("875"));
    }

    #[test]
    fn test_expired_card() {
        let mut fields = valid();
        fields.insert(expiration::YEAR.to_string(), "2001".into());
        let card = TokenizedCard::from_fields(&fields).unwrap();
        let err = card.expires_at(Utc::now()).unwrap_err();
        assert!(matches!(err, PaymentError::ExpiredMethod(_)));
    }
}
