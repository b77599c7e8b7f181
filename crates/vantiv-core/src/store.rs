//! Persistence Collaborators
//!
//! Storage traits for payments and stored payment methods, plus in-memory
//! implementations for development and tests.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{PaymentError, Result};
use crate::model::{Payment, PaymentId, PaymentMethod, PaymentMethodId};

/// Payment storage trait
pub trait PaymentStore: Send + Sync {
    /// Save or update a payment
    fn save(&self, payment: &Payment) -> Result<()>;

    fn get(&self, id: &PaymentId) -> Result<Option<Payment>>;

    /// All payments recorded against an order
    fn list_by_order(&self, order_id: &str) -> Result<Vec<Payment>>;

    fn delete(&self, id: &PaymentId) -> Result<()>;
}

/// Payment method storage trait
pub trait PaymentMethodStore: Send + Sync {
    /// Save or update a payment method
    fn save(&self, method: &PaymentMethod) -> Result<()>;

    fn get(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>>;

    fn delete(&self, id: &PaymentMethodId) -> Result<()>;
}

fn poisoned<T>(_: PoisonError<T>) -> PaymentError {
    PaymentError::Storage("store lock poisoned".into())
}

/// In-memory payment store (for development)
#[derive(Default)]
pub struct MemoryPaymentStore {
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.payments.read().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentStore for MemoryPaymentStore {
    fn save(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().map_err(poisoned)?;
        payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    fn get(&self, id: &PaymentId) -> Result<Option<Payment>> {
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(payments.get(id).cloned())
    }

    fn list_by_order(&self, order_id: &str) -> Result<Vec<Payment>> {
        let payments = self.payments.read().map_err(poisoned)?;
        let mut found: Vec<Payment> = payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }

    fn delete(&self, id: &PaymentId) -> Result<()> {
        let mut payments = self.payments.write().map_err(poisoned)?;
        payments.remove(id);
        Ok(())
    }
}

/// In-memory payment method store (for development)
#[derive(Default)]
pub struct MemoryPaymentMethodStore {
    methods: RwLock<HashMap<PaymentMethodId, PaymentMethod>>,
}

impl MemoryPaymentMethodStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.methods.read().map(|m| m.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentMethodStore for MemoryPaymentMethodStore {
    fn save(&self, method: &PaymentMethod) -> Result<()> {
        let mut methods = self.methods.write().map_err(poisoned)?;
        methods.insert(method.id.clone(), method.clone());
        Ok(())
    }

    fn get(&self, id: &PaymentMethodId) -> Result<Option<PaymentMethod>> {
        let methods = self.methods.read().map_err(poisoned)?;
        Ok(methods.get(id).cloned())
    }

    fn delete(&self, id: &PaymentMethodId) -> Result<()> {
        let mut methods = self.methods.write().map_err(poisoned)?;
        methods.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_store_round_trip() {
        let store = MemoryPaymentStore::new();
        let payment = Payment::new("1001", PaymentMethodId::new(), dec!(10), "USD");

        store.save(&payment).unwrap();
        let loaded = store.get(&payment.id).unwrap().unwrap();
        assert_eq!(loaded.order_id, "1001");
        assert_eq!(store.list_by_order("1001").unwrap().len(), 1);

        store.delete(&payment.id).unwrap();
        assert!(store.get(&payment.id).unwrap().is_none());
        assert!(store.is_empty());
    }
}
