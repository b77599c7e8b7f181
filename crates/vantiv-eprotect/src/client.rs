//! Tokenization Client
//!
//! Drives the eProtect handshake for one payment form:
//!
//! ```text
//!  attach ──▶ strip card input names ──▶ load library ──▶ bind submit
//!                                                            │
//!  submit click ──▶ cancel default ──▶ send card data to processor
//!                                          │
//!         ┌────────────────────────────────┼───────────────────────┐
//!      success                           error                  timeout
//!  write hidden fields             write hidden fields       notify payer
//!  re-trigger submit (passthrough) notify payer (by code)    (form halted)
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{HandshakeError, Result};
use crate::fields::{self, EprotectRequest, FieldMap, TokenizationResponse};
use crate::messages::{error_message, TECHNICAL_DIFFICULTY, TECHNICAL_DIFFICULTY_TIMEOUT};
use crate::settings::{EprotectSettings, TOKENIZATION_TIMEOUT};

/// Result of one tokenization round trip
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenizationOutcome {
    Success(TokenizationResponse),
    Error(TokenizationResponse),
    Timeout,
}

/// The processor's browser-side tokenization library
#[async_trait(?Send)]
pub trait TokenizationLibrary {
    /// Whether the library is already present on the page
    fn is_loaded(&self) -> bool;

    /// Fetch the library from `url`
    async fn load(&self, url: &str) -> Result<()>;

    /// Submit card data straight to the processor
    async fn send(
        &self,
        request: &EprotectRequest,
        fields: &FieldMap,
        timeout: Duration,
    ) -> TokenizationOutcome;
}

/// The payment form as seen by the client
pub trait PaymentForm {
    /// Value of the input with the given id
    fn value(&self, id: &str) -> Option<String>;

    /// Set the value of the input with the given id
    fn set_value(&self, id: &str, value: &str);

    /// Remove the `name` attribute of the element matching `selector`
    fn remove_name(&self, selector: &str);

    /// Show a message to the payer
    fn notify(&self, message: &str);

    /// Activate the submit control again, marked as passthrough
    fn resubmit(&self, selector: &str);
}

/// Page-scoped bind latch. One-way: once bound, always bound.
#[derive(Debug, Default)]
pub struct SessionState {
    bound: Cell<bool>,
}

impl SessionState {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Claim the latch; false if it was already claimed
    fn claim(&self) -> bool {
        !self.bound.replace(true)
    }
}

/// Outcome of [`EprotectClient::attach`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Submit control to intercept
    Bound { submit_selector: &'static str },
    AlreadyBound,
    LibraryUnavailable,
}

/// What to do with a submit activation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interception {
    /// Let the default submission proceed
    PassThrough,
    /// Cancel the default submission and run the handshake
    Intercept,
}

/// Browser-side eProtect client
pub struct EprotectClient<F: PaymentForm, L: TokenizationLibrary> {
    settings: EprotectSettings,
    form: F,
    library: L,
    session: Rc<SessionState>,
    timeout: Duration,
}

impl<F: PaymentForm, L: TokenizationLibrary> EprotectClient<F, L> {
    pub fn new(settings: EprotectSettings, form: F, library: L, session: Rc<SessionState>) -> Self {
        Self {
            settings,
            form,
            library,
            session,
            timeout: TOKENIZATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn settings(&self) -> &EprotectSettings {
        &self.settings
    }

    pub const fn form(&self) -> &F {
        &self.form
    }

    pub fn submit_selector(&self) -> &'static str {
        fields::submit_selector(self.settings.variant)
    }

    /// Prepare the form. Card inputs lose their names on every call, even
    /// when binding is skipped; binding runs at most once per page.
    pub async fn attach(&self) -> AttachOutcome {
        let inputs = fields::card_input_selectors(self.settings.variant);
        self.form.remove_name(inputs.account_number);
        self.form.remove_name(inputs.security_code);

        if !self.session.claim() {
            return AttachOutcome::AlreadyBound;
        }

        if !self.library.is_loaded() {
            let url = self.settings.environment().library_url();
            if let Err(e) = self.library.load(&url).await {
                tracing::error!(error = %e, url = %url, "Failed to load eProtect library");
                self.form.notify(TECHNICAL_DIFFICULTY);
                return AttachOutcome::LibraryUnavailable;
            }
        }

        let submit_selector = self.submit_selector();
        tracing::debug!(selector = submit_selector, "eProtect bound to submit control");
        AttachOutcome::Bound { submit_selector }
    }

    /// Decide how to treat a submit activation
    pub const fn intercept(&self, passthrough: bool) -> Interception {
        if passthrough {
            Interception::PassThrough
        } else {
            Interception::Intercept
        }
    }

    /// Tokenization request assembled from the hidden request fields
    pub fn build_request(&self) -> EprotectRequest {
        let value = |id: &str| self.form.value(id).unwrap_or_default();
        EprotectRequest {
            paypage_id: value(fields::request::PAYPAGE_ID),
            report_group: value(fields::request::REPORT_GROUP),
            order_id: value(fields::request::ORDER_ID),
            id: value(fields::request::MERCHANT_TXN_ID),
            url: self.settings.host().to_string(),
        }
    }

    /// Run one handshake for an intercepted submit activation.
    ///
    /// On success the submit control is re-triggered exactly once with the
    /// passthrough marker; on error or timeout the form stays halted.
    pub async fn tokenize(&self) -> Result<TokenizationResponse> {
        self.clear_response_fields();

        let request = self.build_request();
        let field_map = FieldMap::for_variant(self.settings.variant);

        match self.library.send(&request, &field_map, self.timeout).await {
            TokenizationOutcome::Success(response) => {
                self.write_response_fields(&response);
                tracing::info!(
                    code = %response.response,
                    txn_id = %response.litle_txn_id,
                    "Card tokenized"
                );
                self.form.resubmit(self.submit_selector());
                Ok(response)
            }
            TokenizationOutcome::Error(response) => {
                self.write_response_fields(&response);
                tracing::warn!(
                    code = %response.response,
                    message = %response.message,
                    "Tokenization rejected"
                );
                self.form.notify(error_message(&response.response));
                Err(HandshakeError::Declined {
                    code: response.response,
                    message: response.message,
                })
            }
            TokenizationOutcome::Timeout => {
                tracing::warn!(timeout_ms = %self.timeout.as_millis(), "Tokenization timed out");
                self.form.notify(TECHNICAL_DIFFICULTY_TIMEOUT);
                Err(HandshakeError::TimedOut)
            }
        }
    }

    fn clear_response_fields(&self) {
        for id in fields::response::ALL {
            self.form.set_value(id, "");
        }
    }

    fn write_response_fields(&self, response: &TokenizationResponse) {
        for (id, value) in response.hidden_values() {
            self.form.set_value(id, value);
        }
    }
}
