//! Mock Transaction API
//!
//! For testing and demo purposes. Answers every request with a processor
//! response document built from a scripted response code.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::{anyhow, bail};
use async_trait::async_trait;

use vantiv_core::ResponseDocument;
use vantiv_core::codec::is_success_code;

use super::TransactionApi;
use crate::operation::Operation;
use crate::request::{OnlineRequest, SCHEMA_NAMESPACE};

const FIRST_TXN_ID: u64 = 82_924_701_437_133_501;
const MOCK_TOKEN: &str = "1111222233334444";

/// A request the mock received
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub request: OnlineRequest,
    /// Serialized document as it would go on the wire
    pub xml: String,
}

/// Mock transaction API with scripted response codes
pub struct MockTransactionApi {
    codes: Mutex<HashMap<Operation, String>>,
    failures: Mutex<HashMap<Operation, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_txn_id: AtomicU64,
}

impl Default for MockTransactionApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransactionApi {
    /// Mock that approves everything
    pub fn new() -> Self {
        Self {
            codes: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            next_txn_id: AtomicU64::new(FIRST_TXN_ID),
        }
    }

    /// Answer `operation` with `code` from now on
    pub fn respond_with(&self, operation: Operation, code: &str) -> &Self {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, code.to_string());
        self
    }

    /// Fail `operation` at the transport level from now on
    pub fn fail_with(&self, operation: Operation, error: &str) -> &Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, error.to_string());
        self
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn requests_for(&self, operation: Operation) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.operation == operation)
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn code_for(&self, operation: Operation) -> String {
        let codes = self.codes.lock().unwrap_or_else(PoisonError::into_inner);
        codes.get(&operation).cloned().unwrap_or_else(|| {
            match operation {
                Operation::RegisterToken => "801",
                _ => "000",
            }
            .to_string()
        })
    }

    fn failure_for(&self, operation: Operation) -> Option<String> {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.get(&operation).cloned()
    }
}

fn message_for(code: &str) -> &'static str {
    match code {
        "000" => "Approved",
        "801" => "Account number was successfully registered",
        "802" => "Account number was previously registered",
        "110" => "Insufficient Funds",
        "301" => "Invalid Account Number",
        "360" => "No transaction found with specified litleTxnId",
        _ => "Declined",
    }
}

fn response_xml(operation: Operation, id: &str, code: &str, txn_id: u64) -> String {
    let key = operation.response_key();
    let token = if operation == Operation::RegisterToken && is_success_code(code) {
        format!("<litleToken>{MOCK_TOKEN}</litleToken>")
    } else {
        String::new()
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<litleOnlineResponse version="9.12" xmlns="{SCHEMA_NAMESPACE}" response="0" message="Valid Format">
  <{key} id="{id}" reportGroup="Default Report Group">
    <litleTxnId>{txn_id}</litleTxnId>
    {token}
    <response>{code}</response>
    <responseTime>2026-10-17T12:00:00</responseTime>
    <message>{message}</message>
  </{key}>
</litleOnlineResponse>"#,
        message = message_for(code),
    )
}

#[async_trait]
impl TransactionApi for MockTransactionApi {
    async fn execute(&self, request: &OnlineRequest) -> anyhow::Result<ResponseDocument> {
        let transaction = request
            .transaction()
            .ok_or_else(|| anyhow!("request carries no transaction"))?;
        let operation = transaction.operation();
        let xml = request.to_xml()?;

        self.requests
            .lock()
            .map_err(|_| anyhow!("mock request log poisoned"))?
            .push(RecordedRequest {
                operation,
                request: request.clone(),
                xml,
            });

        if let Some(error) = self.failure_for(operation) {
            bail!(error);
        }

        let code = self.code_for(operation);
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let document = ResponseDocument::parse(&response_xml(operation, transaction.id(), &code, txn_id))?;
        Ok(document)
    }

    fn name(&self) -> &str {
        "MockVantiv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ReferenceBody, Transaction};
    use vantiv_core::{GatewayConfig, ResponseFields, SecretSource, StoredConfig};

    fn request(transaction: Transaction) -> OnlineRequest {
        let secrets = SecretSource::from_lookup(|key| match key {
            "VANTIV_API_USER" => Some("user".into()),
            "VANTIV_API_PASS" => Some("pass".into()),
            "VANTIV_API_MERCHANT_ID_DEFAULT" => Some("01234".into()),
            _ => None,
        });
        let config = GatewayConfig::resolve(secrets, StoredConfig::default()).unwrap();
        OnlineRequest::new(&config, "01234", transaction)
    }

    fn void() -> Transaction {
        Transaction::Void(ReferenceBody {
            id: "void-1".into(),
            report_group: "Default Report Group".into(),
            litle_txn_id: "123".into(),
        })
    }

    #[tokio::test]
    async fn test_mock_approves_by_default() {
        let api = MockTransactionApi::new();
        let document = api.execute(&request(void())).await.unwrap();
        let fields = ResponseFields::from_document(&document, "voidResponse").unwrap();
        assert!(fields.is_success());
        assert_eq!(fields.get("id"), Some("void-1"));
        assert_eq!(fields.transaction_id(), Some("82924701437133501"));
        assert_eq!(api.request_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_decline() {
        let api = MockTransactionApi::new();
        api.respond_with(Operation::Void, "360");
        let document = api.execute(&request(void())).await.unwrap();
        let fields = ResponseFields::from_document(&document, "voidResponse").unwrap();
        assert!(!fields.is_success());
        assert_eq!(fields.response_code(), "360");
    }

    #[tokio::test]
    async fn test_scripted_failure_is_recorded() {
        let api = MockTransactionApi::new();
        api.fail_with(Operation::Void, "connection reset");
        let result = api.execute(&request(void())).await;
        assert!(result.is_err());
        assert_eq!(api.requests_for(Operation::Void).len(), 1);
    }
}
