//! vantiv-eprotect
//!
//! Browser-side tokenization handshake. Raw card data goes from the payer's
//! browser straight to the processor; the merchant backend only ever sees
//! the registration id and card metadata written into hidden fields.
//!
//! ```text
//! ┌──────────────┐  settings   ┌──────────────┐  card data  ┌────────────┐
//! │   Backend    │────────────▶│ EprotectClient│────────────▶│ Processor  │
//! │ (hidden req) │◀────────────│  (browser)    │◀────────────│ (eProtect) │
//! └──────────────┘ hidden resp └──────────────┘ registration└────────────┘
//! ```
//!
//! The handshake logic is platform-neutral; DOM bindings live behind the
//! `web` feature.

pub mod client;
pub mod error;
pub mod fields;
pub mod messages;
pub mod settings;

#[cfg(feature = "web")]
pub mod web;

pub use client::{
    AttachOutcome, EprotectClient, Interception, PaymentForm, SessionState, TokenizationLibrary,
    TokenizationOutcome,
};
pub use error::{HandshakeError, Result};
pub use fields::{EprotectRequest, FieldMap, HiddenField, TokenizationResponse};
pub use messages::error_message;
pub use settings::{Environment, EprotectSettings, FormVariant, TOKENIZATION_TIMEOUT};
