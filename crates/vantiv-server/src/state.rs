//! Application State

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use vantiv_core::PaymentId;
use vantiv_gateway::TransactionGateway;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway (state machine + stores)
    pub gateway: Arc<TransactionGateway>,

    /// Name of the transaction API in use ("Vantiv" or "MockVantiv")
    pub transport: Arc<str>,

    /// One lock per payment; held from load to save
    payment_locks: Arc<Mutex<HashMap<PaymentId, Arc<Mutex<()>>>>>,
}

impl AppState {
    pub fn new(gateway: TransactionGateway, transport: &str) -> Self {
        Self {
            gateway: Arc::new(gateway),
            transport: Arc::from(transport),
            payment_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serialize operations on one payment. Other payments are not blocked.
    pub async fn lock_payment(&self, id: &PaymentId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.payment_locks.lock().await;
            // Drop locks nobody holds or waits for
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vantiv_core::{
        GatewayConfig, MemoryPaymentMethodStore, MemoryPaymentStore, SecretSource, StoredConfig,
    };
    use vantiv_gateway::MockTransactionApi;

    fn state() -> AppState {
        let secrets = SecretSource::from_lookup(|key| match key {
            "VANTIV_API_USER" => Some("user".into()),
            "VANTIV_API_PASS" => Some("pass".into()),
            "VANTIV_API_MERCHANT_ID_DEFAULT" => Some("01234".into()),
            _ => None,
        });
        let config = Arc::new(GatewayConfig::resolve(secrets, StoredConfig::default()).unwrap());
        let gateway = TransactionGateway::new(
            config,
            Arc::new(MockTransactionApi::new()),
            Arc::new(MemoryPaymentStore::new()),
            Arc::new(MemoryPaymentMethodStore::new()),
        );
        AppState::new(gateway, "MockVantiv")
    }

    #[tokio::test]
    async fn test_payment_lock_is_exclusive() {
        let state = state();
        let id = PaymentId::from_string("p-1");

        let guard = state.lock_payment(&id).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), state.lock_payment(&id)).await;
        assert!(blocked.is_err());

        // Other payments proceed
        let other = PaymentId::from_string("p-2");
        let _other = tokio::time::timeout(Duration::from_millis(20), state.lock_payment(&other))
            .await
            .unwrap();

        drop(guard);
        let again = tokio::time::timeout(Duration::from_millis(20), state.lock_payment(&id)).await;
        assert!(again.is_ok());
    }
}
