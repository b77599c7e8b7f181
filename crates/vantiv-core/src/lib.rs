//! # vantiv-core
//!
//! Domain model and pure building blocks for the Vantiv (Litle) card-payment
//! integration.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      vantiv-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Model     │  │ Normalizers │  │   Response Codec    │  │
//! │  │ Payment /   │  │ amount,     │  │ XML ──▶ flat fields │  │
//! │  │ Method      │  │ brand, exp  │  │ success / decline   │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │  ┌─────────────────────────┐  ┌─────────────────────────┐   │
//! │  │ Layered configuration   │  │ Persistence traits      │   │
//! │  └─────────────────────────┘  └─────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod store;

pub use codec::{ResponseClass, ResponseDocument, ResponseFields};
pub use config::{GatewayConfig, Mode, SecretSource, StoredConfig};
pub use error::{PaymentError, Result};
pub use model::{BillingProfile, Payment, PaymentId, PaymentMethod, PaymentMethodId, PaymentState};
pub use normalize::CardBrand;
pub use store::{MemoryPaymentMethodStore, MemoryPaymentStore, PaymentMethodStore, PaymentStore};
