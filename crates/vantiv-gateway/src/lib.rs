//! # vantiv-gateway
//!
//! Transaction gateway for the Vantiv (Litle) online API: the payment state
//! machine, stored payment methods and the remote transaction transport.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐   ┌───────────┐
//! │  Payment /   │──▶│ TransactionGateway│──▶│ OnlineRequest │──▶│ Processor │
//! │ PaymentMethod│   │ (state machine)   │   │ (XML)         │   │           │
//! └──────────────┘   └──────────────────┘   └───────────────┘   └─────┬─────┘
//!        ▲                    │                                      │
//!        │   persist on       │ ResponseFields ◀── ResponseDocument ◀┘
//!        └── approval ────────┘ (success / SoftDecline + event)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vantiv_gateway::{HttpTransactionApi, TransactionGateway};
//!
//! let config = Arc::new(GatewayConfig::from_env()?);
//! let api = Arc::new(HttpTransactionApi::new(&config)?);
//! let gateway = TransactionGateway::new(config, api, payments, methods);
//!
//! gateway.create_payment(&mut payment, false).await?;
//! gateway.capture_payment(&mut payment, None).await?;
//! ```

mod events;
mod gateway;
mod operation;
mod payment_method;
pub mod request;
mod transport;

pub use events::{EVENT_CAPACITY, EventBus, GatewayEvent};
pub use gateway::{PaymentOperation, TransactionGateway, available_operations};
pub use operation::Operation;
pub use payment_method::TokenizedCard;
pub use transport::{HttpTransactionApi, MockTransactionApi, RecordedRequest, TransactionApi};
