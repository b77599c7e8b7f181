//! Transaction Gateway
//!
//! The payment state machine. Each operation checks its precondition,
//! issues one remote call, classifies the reply, and persists the payment
//! only after the processor approved the transaction.
//!
//! ```text
//!  new ──auth──▶ authorized ──capture──▶ captured ──credit──▶ partially_refunded
//!   │               │                      │                        │
//!   └──sale─────────┼──────────────────────┘                        │
//!                   └──authReversal──▶ authorization_voided      credit
//!                                                                   ▼
//!                    captured / partially_refunded ──void──▶    refunded
//! ```
//!
//! Callers own retry policy and must serialize operations on one payment.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use vantiv_core::normalize::format_amount;
use vantiv_core::{
    GatewayConfig, Payment, PaymentError, PaymentMethod, PaymentMethodStore, PaymentState,
    PaymentStore, ResponseFields, Result,
};

use crate::events::{EventBus, GatewayEvent};
use crate::operation::Operation;
use crate::request::{
    BillToAddress, CaptureBody, CreditBody, OnlineRequest, PaymentBody, ReferenceBody,
    RegisterTokenBody, TokenData, Transaction, request_id,
};
use crate::transport::TransactionApi;

/// Grace period after a remote transaction before follow-up operations
const SETTLE_DELAY_SECS: i64 = 60;

/// Follow-up operation offered for a payment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOperation {
    Capture,
    Void,
    Refund,
}

/// Operations available for `payment` at `now`.
///
/// Nothing is offered within a minute of the last remote transaction.
pub fn available_operations(payment: &Payment, now: DateTime<Utc>) -> Vec<PaymentOperation> {
    if payment.state.is_terminal() {
        return Vec::new();
    }
    let Some(last) = payment.last_transaction_at() else {
        return Vec::new();
    };
    if now <= last + Duration::seconds(SETTLE_DELAY_SECS) {
        return Vec::new();
    }

    let capturable = payment.state == PaymentState::Authorized && !payment.authorization_expired(now);
    let refundable = payment.state.can_transition_to(PaymentState::Refunded);
    let captured_today = payment
        .captured_at
        .is_some_and(|at| at.date_naive() == now.date_naive());

    let mut operations = Vec::new();
    if capturable {
        operations.push(PaymentOperation::Capture);
    }
    if capturable || (refundable && captured_today) {
        operations.push(PaymentOperation::Void);
    }
    if refundable {
        operations.push(PaymentOperation::Refund);
    }
    operations
}

/// Processor-backed payment gateway
pub struct TransactionGateway {
    config: Arc<GatewayConfig>,
    api: Arc<dyn TransactionApi>,
    payments: Arc<dyn PaymentStore>,
    methods: Arc<dyn PaymentMethodStore>,
    events: EventBus,
}

impl TransactionGateway {
    pub fn new(
        config: Arc<GatewayConfig>,
        api: Arc<dyn TransactionApi>,
        payments: Arc<dyn PaymentStore>,
        methods: Arc<dyn PaymentMethodStore>,
    ) -> Self {
        Self {
            config,
            api,
            payments,
            methods,
            events: EventBus::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn payments(&self) -> &dyn PaymentStore {
        self.payments.as_ref()
    }

    pub fn payment_methods(&self) -> &dyn PaymentMethodStore {
        self.methods.as_ref()
    }

    /// Receive unsuccessful-transaction events
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Authorize (or, with `capture`, sell) a new payment against its
    /// stored payment method.
    pub async fn create_payment(&self, payment: &mut Payment, capture: bool) -> Result<()> {
        if payment.state != PaymentState::New {
            return Err(PaymentError::InvalidState(format!(
                "payment {} is {}, expected new",
                payment.id, payment.state
            )));
        }
        if payment.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidArgument(format!(
                "payment amount {} must be positive",
                payment.amount
            )));
        }

        let method = self.methods.get(&payment.payment_method_id)?.ok_or_else(|| {
            PaymentError::InvalidArgument(format!(
                "payment {} references no payment method",
                payment.id
            ))
        })?;
        if method.is_expired(Utc::now()) {
            return Err(PaymentError::ExpiredMethod(format!(
                "payment method {} has expired",
                method.id
            )));
        }

        let operation = if capture {
            Operation::Sale
        } else {
            Operation::Authorization
        };
        let mut body = PaymentBody::new(
            request_id(payment.id.as_str(), operation, Some(&payment.amount)),
            &self.config.report_group,
            &payment.order_id,
            &payment.amount,
            bill_to_address(&method),
            TokenData {
                litle_token: method.remote_id.clone(),
                exp_date: method.exp_date(),
            },
        );
        body.customer_id.clone_from(&method.owner_id);
        let transaction = if capture {
            Transaction::Sale(body)
        } else {
            Transaction::Authorization(body)
        };

        let fields = self.submit(&payment.currency, transaction).await?;

        let now = Utc::now();
        payment.test = self.config.is_test();
        payment.remote_id = fields.transaction_id().map(str::to_string);
        payment.authorized_at = Some(now);
        if capture {
            payment.state = PaymentState::Captured;
            payment.captured_at = Some(now);
        } else {
            payment.state = PaymentState::Authorized;
            payment.authorization_expires_at = Some(now + method.brand.authorization_lifespan());
        }
        self.payments.save(payment)?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            state = %payment.state,
            "Payment created"
        );
        Ok(())
    }

    /// Capture an authorized payment, in full or in part.
    ///
    /// A partial capture is recorded as a separate payment split off this
    /// one; it is returned, and this payment keeps the remaining balance in
    /// the `authorized` state.
    pub async fn capture_payment(
        &self,
        payment: &mut Payment,
        amount: Option<Decimal>,
    ) -> Result<Option<Payment>> {
        // New payments are captured through a sale instead
        if payment.state == PaymentState::New
            || !payment.state.can_transition_to(PaymentState::Captured)
        {
            return Err(PaymentError::InvalidState(format!(
                "only authorizations can be captured; payment {} is {}",
                payment.id, payment.state
            )));
        }

        let balance = payment.balance();
        let amount = amount.unwrap_or(balance);
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidArgument(format!(
                "capture amount {amount} must be positive"
            )));
        }
        if amount > balance {
            return Err(PaymentError::InvalidRequest(format!(
                "Can't capture more than {balance}."
            )));
        }

        if amount < balance {
            let mut split = payment.duplicate();
            split.state = PaymentState::Authorized;
            split.partial = true;
            split.amount = amount;
            split.remote_id.clone_from(&payment.remote_id);

            self.capture_in_full(&mut split, amount).await?;

            payment.amount -= split.amount;
            self.payments.save(payment)?;
            tracing::info!(
                payment_id = %payment.id,
                split_id = %split.id,
                captured = %amount,
                remaining = %payment.amount,
                "Partial capture"
            );
            return Ok(Some(split));
        }

        self.capture_in_full(payment, amount).await?;
        Ok(None)
    }

    async fn capture_in_full(&self, payment: &mut Payment, amount: Decimal) -> Result<()> {
        let litle_txn_id = remote_id(payment)?;
        let transaction = Transaction::Capture(CaptureBody {
            id: request_id(payment.id.as_str(), Operation::Capture, Some(&amount)),
            report_group: self.config.report_group.clone(),
            partial: payment.partial.then_some(true),
            litle_txn_id,
            amount: format_amount(&amount),
        });

        let fields = self.submit(&payment.currency, transaction).await?;

        payment.remote_id = fields.transaction_id().map(str::to_string);
        payment.amount = amount;
        payment.captured_at = Some(Utc::now());
        payment.authorization_expires_at = None;
        payment.state = PaymentState::Captured;
        self.payments.save(payment)?;

        tracing::info!(payment_id = %payment.id, amount = %amount, "Payment captured");
        Ok(())
    }

    /// Reverse an authorization, or void a same-day capture.
    pub async fn void_payment(&self, payment: &mut Payment) -> Result<()> {
        let (operation, next) = if payment.state.can_transition_to(PaymentState::AuthorizationVoided) {
            (Operation::AuthReversal, PaymentState::AuthorizationVoided)
        } else if payment.state.can_transition_to(PaymentState::Refunded) {
            (Operation::Void, PaymentState::Refunded)
        } else {
            return Err(PaymentError::InvalidState(format!(
                "payment {} is {} and cannot be voided",
                payment.id, payment.state
            )));
        };

        let body = ReferenceBody {
            id: request_id(payment.id.as_str(), operation, None),
            report_group: self.config.report_group.clone(),
            litle_txn_id: remote_id(payment)?,
        };
        let transaction = if operation == Operation::AuthReversal {
            Transaction::AuthReversal(body)
        } else {
            Transaction::Void(body)
        };

        let fields = self.submit(&payment.currency, transaction).await?;

        payment.remote_id = fields.transaction_id().map(str::to_string);
        if next == PaymentState::AuthorizationVoided {
            payment.authorization_expires_at = None;
        } else {
            payment.refunded_amount = payment.amount;
        }
        payment.state = next;
        self.payments.save(payment)?;

        tracing::info!(payment_id = %payment.id, state = %payment.state, "Payment voided");
        Ok(())
    }

    /// Refund a captured payment. Defaults to the unrefunded balance.
    pub async fn refund_payment(&self, payment: &mut Payment, amount: Option<Decimal>) -> Result<()> {
        if !payment.state.can_transition_to(PaymentState::Refunded) {
            return Err(PaymentError::InvalidState(format!(
                "only captured payments can be refunded; payment {} is {}",
                payment.id, payment.state
            )));
        }

        let balance = payment.balance();
        let amount = amount.unwrap_or(balance);
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidArgument(format!(
                "refund amount {amount} must be positive"
            )));
        }
        if amount > balance {
            return Err(PaymentError::InvalidRequest(format!(
                "Can't refund more than {balance}."
            )));
        }

        // Each refund step gets its own id: same-amount partial refunds differ
        let id_seed = format!("{}:{}", payment.id, payment.refunded_amount);
        let transaction = Transaction::Credit(CreditBody {
            id: request_id(&id_seed, Operation::Credit, Some(&amount)),
            report_group: self.config.report_group.clone(),
            litle_txn_id: remote_id(payment)?,
            amount: format_amount(&amount),
        });

        self.submit(&payment.currency, transaction).await?;

        payment.refunded_amount += amount;
        payment.state = if payment.refunded_amount < payment.amount {
            PaymentState::PartiallyRefunded
        } else {
            PaymentState::Refunded
        };
        self.payments.save(payment)?;

        tracing::info!(
            payment_id = %payment.id,
            refunded = %payment.refunded_amount,
            state = %payment.state,
            "Payment refunded"
        );
        Ok(())
    }

    /// Trade the method's short-lived registration id for a durable token.
    pub async fn register_token(&self, method: &mut PaymentMethod) -> Result<()> {
        let transaction = Transaction::RegisterToken(RegisterTokenBody {
            id: request_id(method.id.as_str(), Operation::RegisterToken, None),
            report_group: self.config.report_group.clone(),
            customer_id: method.owner_id.clone(),
            paypage_registration_id: method.remote_id.clone(),
        });

        let fields = self.submit_to(self.config.default_merchant_id(), transaction).await?;
        let Some(token) = fields.token().map(str::to_string) else {
            return Err(self.report_failure(
                Operation::RegisterToken,
                fields,
                PaymentError::InvalidRequest("token registration response carries no token".into()),
            ));
        };

        method.remote_id = token;
        self.methods.save(method)?;

        tracing::info!(payment_method_id = %method.id, "Token registered");
        Ok(())
    }

    async fn submit(&self, currency: &str, transaction: Transaction) -> Result<ResponseFields> {
        let merchant_id = self.config.merchant_id(currency).to_string();
        self.submit_to(&merchant_id, transaction).await
    }

    /// Issue one remote call and classify the reply
    async fn submit_to(&self, merchant_id: &str, transaction: Transaction) -> Result<ResponseFields> {
        let operation = transaction.operation();
        let request = OnlineRequest::new(&self.config, merchant_id, transaction);

        let document = self.api.execute(&request).await.map_err(|e| {
            tracing::error!(
                transaction_type = operation.transaction_type(),
                error = %e,
                "{} request failed",
                operation.transaction_type()
            );
            PaymentError::from(e)
        })?;

        let fields = match ResponseFields::from_document(&document, operation.response_key()) {
            Ok(fields) => fields,
            Err(e) => {
                // Envelope attributes stand in for the missing payload
                let envelope = document.root().attributes.iter().cloned().collect();
                return Err(self.report_failure(
                    operation,
                    envelope,
                    PaymentError::InvalidRequest(e.to_string()),
                ));
            }
        };
        self.ensure_success(operation, fields)
    }

    /// Raise any non-approval response
    fn ensure_success(&self, operation: Operation, fields: ResponseFields) -> Result<ResponseFields> {
        if fields.is_success() {
            return Ok(fields);
        }

        let error = PaymentError::SoftDecline {
            transaction_type: operation.transaction_type().to_string(),
            code: fields.response_code().to_string(),
            message: fields.message().to_string(),
            transaction_id: fields.transaction_id().unwrap_or_default().to_string(),
        };
        Err(self.report_failure(operation, fields, error))
    }

    /// Log and publish a failed remote transaction, handing back `error`
    fn report_failure(
        &self,
        operation: Operation,
        fields: ResponseFields,
        error: PaymentError,
    ) -> PaymentError {
        tracing::error!(
            transaction_type = operation.transaction_type(),
            code = fields.response_code(),
            message = fields.message(),
            transaction_id = fields.transaction_id().unwrap_or_default(),
            "{error}"
        );

        self.events.publish(GatewayEvent::TransactionUnsuccessful {
            transaction_type: operation.transaction_type().to_string(),
            fields: fields.into_inner(),
        });
        error
    }
}

fn remote_id(payment: &Payment) -> Result<String> {
    payment.remote_id.clone().ok_or_else(|| {
        PaymentError::InvalidState(format!(
            "payment {} has no remote transaction",
            payment.id
        ))
    })
}

fn bill_to_address(method: &PaymentMethod) -> BillToAddress {
    let profile = &method.billing_profile;
    BillToAddress {
        name: profile.full_name(),
        address_line1: profile.address_line1.clone(),
        city: profile.locality.clone(),
        state: profile.state_code().to_string(),
        zip: profile.postal_code.clone(),
        country: profile.country_code.clone(),
        email: profile.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransactionApi;
    use vantiv_core::ResponseDocument;
    use rust_decimal_macros::dec;
    use vantiv_core::{
        BillingProfile, CardBrand, MemoryPaymentMethodStore, MemoryPaymentStore, PaymentMethodId,
        SecretSource, StoredConfig,
    };

    struct Fixture {
        gateway: TransactionGateway,
        api: Arc<MockTransactionApi>,
        store: Arc<MemoryPaymentStore>,
        method: PaymentMethod,
    }

    fn fixture(brand: CardBrand) -> Fixture {
        let secrets = SecretSource::from_lookup(|key| match key {
            "VANTIV_API_USER" => Some("user".into()),
            "VANTIV_API_PASS" => Some("pass".into()),
            "VANTIV_API_MERCHANT_ID_DEFAULT" => Some("01234".into()),
            _ => None,
        });
        let config = Arc::new(GatewayConfig::resolve(secrets, StoredConfig::default()).unwrap());
        let api = Arc::new(MockTransactionApi::new());
        let store = Arc::new(MemoryPaymentStore::new());
        let methods = Arc::new(MemoryPaymentMethodStore::new());

        let method = PaymentMethod {
            id: PaymentMethodId::new(),
            owner_id: Some("42".into()),
            brand,
            last_four: "1111".into(),
            exp_month: 12,
            exp_year: 2099,
            remote_id: "1111222233334444".into(),
            expires_at: Utc::now() + Duration::days(365),
            reusable: true,
            billing_profile: BillingProfile {
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
                address_line1: "1 Main St".into(),
                locality: "Boston".into(),
                administrative_area: "US-MA".into(),
                postal_code: "02110".into(),
                country_code: "US".into(),
                email: "ada@example.com".into(),
            },
            created_at: Utc::now(),
        };
        methods.save(&method).unwrap();

        let gateway = TransactionGateway::new(config, api.clone(), store.clone(), methods);
        Fixture {
            gateway,
            api,
            store,
            method,
        }
    }

    fn payment(fx: &Fixture, amount: Decimal) -> Payment {
        Payment::new("1001", fx.method.id.clone(), amount, "USD")
    }

    #[tokio::test]
    async fn test_authorize_sets_expiry_by_brand() {
        for (brand, days) in [(CardBrand::Discover, 10), (CardBrand::Visa, 7)] {
            let fx = fixture(brand);
            let mut payment = payment(&fx, dec!(22.00));
            fx.gateway.create_payment(&mut payment, false).await.unwrap();

            assert_eq!(payment.state, PaymentState::Authorized);
            assert!(payment.test);
            let lifespan = payment.authorization_expires_at.unwrap() - payment.authorized_at.unwrap();
            assert_eq!(lifespan.num_seconds(), days * 86_400);
        }
    }

    #[tokio::test]
    async fn test_sale_request_fields() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(22));
        fx.gateway.create_payment(&mut payment, true).await.unwrap();
        assert_eq!(payment.state, PaymentState::Captured);
        assert!(payment.captured_at.is_some());
        assert!(payment.authorization_expires_at.is_none());

        let sent = fx.api.requests_for(Operation::Sale);
        let body = sent[0].request.sale.clone().unwrap();
        assert_eq!(body.amount, "2200");
        assert_eq!(body.order_source, "ecommerce");
        assert_eq!(body.token.exp_date, "1299");
        assert_eq!(body.bill_to_address.state, "MA");
        assert_eq!(body.bill_to_address.name, "Ada Lovelace");
        assert_eq!(body.customer_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_decline_leaves_payment_new() {
        let fx = fixture(CardBrand::Visa);
        let mut events = fx.gateway.subscribe();
        fx.api.respond_with(Operation::Authorization, "110");

        let mut payment = payment(&fx, dec!(22.00));
        let err = fx.gateway.create_payment(&mut payment, false).await.unwrap_err();

        assert_eq!(err.code(), Some("110"));
        assert!(err.to_string().starts_with("Payment failed with code 110 (Insufficient Funds)"));
        assert_eq!(payment.state, PaymentState::New);
        assert!(payment.remote_id.is_none());
        assert!(fx.store.is_empty());

        let GatewayEvent::TransactionUnsuccessful { transaction_type, fields } =
            events.recv().await.unwrap();
        assert_eq!(transaction_type, "Payment");
        assert_eq!(fields.get("response").map(String::as_str), Some("110"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_invalid_request() {
        let fx = fixture(CardBrand::Visa);
        fx.api.fail_with(Operation::Sale, "connection reset");
        let mut payment = payment(&fx, dec!(5));
        let err = fx.gateway.create_payment(&mut payment, true).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
        assert!(err.is_retryable());
        assert_eq!(payment.state, PaymentState::New);
    }

    #[tokio::test]
    async fn test_expired_method() {
        let mut fx = fixture(CardBrand::Visa);
        fx.method.expires_at = Utc::now() - Duration::seconds(1);
        fx.gateway.payment_methods().save(&fx.method).unwrap();

        let mut payment = payment(&fx, dec!(5));
        let err = fx.gateway.create_payment(&mut payment, false).await.unwrap_err();
        assert!(matches!(err, PaymentError::ExpiredMethod(_)));
        assert_eq!(fx.api.request_count(), 0);
    }

    #[tokio::test]
    async fn test_create_requires_new_state() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(5));
        payment.state = PaymentState::Authorized;
        let err = fx.gateway.create_payment(&mut payment, false).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_partial_capture_splits_payment() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(100.00));
        fx.gateway.create_payment(&mut payment, false).await.unwrap();
        let auth_txn = payment.remote_id.clone();

        let split = fx
            .gateway
            .capture_payment(&mut payment, Some(dec!(40.00)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(split.state, PaymentState::Captured);
        assert_eq!(split.amount, dec!(40.00));
        assert_eq!(payment.state, PaymentState::Authorized);
        assert_eq!(payment.amount, dec!(60.00));
        assert_eq!(payment.remote_id, auth_txn);
        assert_eq!(fx.store.len(), 2);

        let captures = fx.api.requests_for(Operation::Capture);
        let body = captures[0].request.capture.clone().unwrap();
        assert_eq!(body.partial, Some(true));
        assert_eq!(Some(body.litle_txn_id), auth_txn);
        assert!(captures[0].xml.contains(r#"partial="true""#));
    }

    #[tokio::test]
    async fn test_capture_more_than_balance() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));
        fx.gateway.create_payment(&mut payment, false).await.unwrap();
        let err = fx
            .gateway
            .capture_payment(&mut payment, Some(dec!(10.01)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
        assert_eq!(payment.state, PaymentState::Authorized);
    }

    #[tokio::test]
    async fn test_void_authorization_uses_reversal() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));
        fx.gateway.create_payment(&mut payment, false).await.unwrap();
        fx.gateway.void_payment(&mut payment).await.unwrap();

        assert_eq!(payment.state, PaymentState::AuthorizationVoided);
        assert_eq!(fx.api.requests_for(Operation::AuthReversal).len(), 1);
        assert!(fx.api.requests_for(Operation::Void).is_empty());
    }

    #[tokio::test]
    async fn test_void_capture_refunds_everything() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));
        fx.gateway.create_payment(&mut payment, true).await.unwrap();
        fx.gateway.void_payment(&mut payment).await.unwrap();

        assert_eq!(payment.state, PaymentState::Refunded);
        assert_eq!(payment.refunded_amount, payment.amount);
        assert_eq!(fx.api.requests_for(Operation::Void).len(), 1);
    }

    #[tokio::test]
    async fn test_void_new_payment_rejected() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));
        let err = fx.gateway.void_payment(&mut payment).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_guards_follow_transition_table() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));
        fx.gateway.create_payment(&mut payment, true).await.unwrap();

        // A sale is already captured
        let err = fx.gateway.capture_payment(&mut payment, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));

        fx.gateway.void_payment(&mut payment).await.unwrap();
        assert!(payment.state.is_terminal());
        let sent = fx.api.request_count();

        let err = fx.gateway.void_payment(&mut payment).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
        let err = fx.gateway.refund_payment(&mut payment, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
        assert_eq!(fx.api.request_count(), sent);
        assert!(available_operations(&payment, Utc::now() + Duration::days(1)).is_empty());

        let mut declined = self::payment(&fx, dec!(10));
        declined.state = PaymentState::Declined;
        declined.remote_id = Some("82924701437133501".into());
        let err = fx.gateway.capture_payment(&mut declined, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_refund_rules() {
        let fx = fixture(CardBrand::Visa);
        let mut payment = payment(&fx, dec!(10));

        let err = fx.gateway.refund_payment(&mut payment, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidState(_)));

        fx.gateway.create_payment(&mut payment, true).await.unwrap();
        let err = fx
            .gateway
            .refund_payment(&mut payment, Some(dec!(10.50)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));

        fx.gateway.refund_payment(&mut payment, Some(dec!(4))).await.unwrap();
        assert_eq!(payment.state, PaymentState::PartiallyRefunded);
        fx.gateway.refund_payment(&mut payment, Some(dec!(4))).await.unwrap();
        assert_eq!(payment.refunded_amount, dec!(8));

        let credits = fx.api.requests_for(Operation::Credit);
        let first = credits[0].request.credit.clone().unwrap();
        let second = credits[1].request.credit.clone().unwrap();
        assert_ne!(first.id, second.id);

        fx.gateway.refund_payment(&mut payment, None).await.unwrap();
        assert_eq!(payment.state, PaymentState::Refunded);
        assert_eq!(payment.refunded_amount, payment.amount);
    }

    #[tokio::test]
    async fn test_register_token_replaces_remote_id() {
        let fx = fixture(CardBrand::Visa);
        let mut method = fx.method.clone();
        method.remote_id = "reg-123".into();
        fx.gateway.register_token(&mut method).await.unwrap();
        assert_eq!(method.remote_id, "1111222233334444");

        let sent = fx.api.requests_for(Operation::RegisterToken);
        let body = sent[0].request.register_token_request.clone().unwrap();
        assert_eq!(body.paypage_registration_id, "reg-123");
        assert_eq!(body.customer_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_register_token_decline() {
        let fx = fixture(CardBrand::Visa);
        fx.api.respond_with(Operation::RegisterToken, "877");
        let mut method = fx.method.clone();
        let err = fx.gateway.register_token(&mut method).await.unwrap_err();
        assert!(err.to_string().starts_with("Token registration failed with code 877"));
        assert_eq!(method.remote_id, fx.method.remote_id);
    }

    /// Answers every request with the same document
    struct FixedResponseApi(ResponseDocument);

    #[async_trait::async_trait]
    impl TransactionApi for FixedResponseApi {
        async fn execute(&self, _request: &OnlineRequest) -> anyhow::Result<ResponseDocument> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "FixedResponse"
        }
    }

    fn gateway_answering(fx: &Fixture, xml: &str) -> TransactionGateway {
        let methods = Arc::new(MemoryPaymentMethodStore::new());
        methods.save(&fx.method).unwrap();
        TransactionGateway::new(
            Arc::clone(&fx.gateway.config),
            Arc::new(FixedResponseApi(ResponseDocument::parse(xml).unwrap())),
            Arc::new(MemoryPaymentStore::new()),
            methods,
        )
    }

    #[tokio::test]
    async fn test_missing_payload_is_reported() {
        let fx = fixture(CardBrand::Visa);
        let gateway = gateway_answering(
            &fx,
            r#"<litleOnlineResponse version="9.12" response="0" message="Valid Format"/>"#,
        );
        let mut events = gateway.subscribe();

        let mut payment = payment(&fx, dec!(10));
        let err = gateway.create_payment(&mut payment, false).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)), "{err:?}");
        assert!(err.to_string().contains("authorizationResponse"));
        assert_eq!(payment.state, PaymentState::New);

        let GatewayEvent::TransactionUnsuccessful { transaction_type, fields } =
            events.recv().await.unwrap();
        assert_eq!(transaction_type, "Payment");
        assert_eq!(fields.get("message").map(String::as_str), Some("Valid Format"));
    }

    #[tokio::test]
    async fn test_registration_without_token_is_reported() {
        let fx = fixture(CardBrand::Visa);
        let gateway = gateway_answering(
            &fx,
            r#"<litleOnlineResponse version="9.12" response="0" message="Valid Format">
  <registerTokenResponse id="r1" reportGroup="Default Report Group">
    <litleTxnId>82924701437133501</litleTxnId>
    <response>801</response>
    <message>Account number was successfully registered</message>
  </registerTokenResponse>
</litleOnlineResponse>"#,
        );
        let mut events = gateway.subscribe();

        let mut method = fx.method.clone();
        method.remote_id = "reg-123".into();
        let err = gateway.register_token(&mut method).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)), "{err:?}");
        assert_eq!(method.remote_id, "reg-123");

        let GatewayEvent::TransactionUnsuccessful { transaction_type, fields } =
            events.recv().await.unwrap();
        assert_eq!(transaction_type, "Token registration");
        assert_eq!(fields.get("response").map(String::as_str), Some("801"));
    }

    #[test]
    fn test_available_operations() {
        let now = Utc::now();
        let mut payment = Payment::new("1", PaymentMethodId::new(), dec!(10), "USD");
        assert!(available_operations(&payment, now).is_empty());

        payment.state = PaymentState::Authorized;
        payment.authorized_at = Some(now - Duration::seconds(30));
        payment.authorization_expires_at = Some(now + Duration::days(7));
        assert!(available_operations(&payment, now).is_empty());

        payment.authorized_at = Some(now - Duration::seconds(120));
        assert_eq!(
            available_operations(&payment, now),
            [PaymentOperation::Capture, PaymentOperation::Void]
        );

        payment.authorization_expires_at = Some(now - Duration::seconds(1));
        assert!(available_operations(&payment, now).is_empty());

        payment.state = PaymentState::Captured;
        payment.captured_at = Some(now - Duration::seconds(120));
        let ops = available_operations(&payment, now);
        assert!(ops.contains(&PaymentOperation::Refund));

        payment.captured_at = Some(now - Duration::days(2));
        assert_eq!(available_operations(&payment, now), [PaymentOperation::Refund]);

        payment.state = PaymentState::Refunded;
        assert!(available_operations(&payment, now).is_empty());
    }
}
