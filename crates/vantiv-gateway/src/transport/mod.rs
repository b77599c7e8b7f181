//! Remote Transaction API
//!
//! Abstraction over the processor's online endpoint plus the HTTP and
//! scripted implementations.

mod http;
mod mock;

pub use http::HttpTransactionApi;
pub use mock::{MockTransactionApi, RecordedRequest};

use async_trait::async_trait;

use vantiv_core::ResponseDocument;

use crate::request::OnlineRequest;

/// Transaction API trait (Strategy pattern)
///
/// Failures returned here are transport or protocol failures; processor
/// declines arrive as a successful document carrying a decline code.
#[async_trait]
pub trait TransactionApi: Send + Sync {
    /// Submit one request document and return the parsed response
    async fn execute(&self, request: &OnlineRequest) -> anyhow::Result<ResponseDocument>;

    /// API name
    fn name(&self) -> &str;
}
