//! Browser bindings
//!
//! DOM-backed [`PaymentForm`], the processor's `LitlePayPage` library behind
//! [`TokenizationLibrary`], and the `attachEprotect` entry point the page
//! calls after every form render.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Event, HtmlElement, HtmlInputElement, HtmlScriptElement};

use crate::client::{
    AttachOutcome, EprotectClient, Interception, PaymentForm, SessionState, TokenizationLibrary,
    TokenizationOutcome,
};
use crate::error::{HandshakeError, Result};
use crate::fields::{EprotectRequest, FieldMap, PASSTHROUGH_ATTRIBUTE, TokenizationResponse};
use crate::settings::EprotectSettings;

const LIBRARY_GLOBAL: &str = "LitlePayPage";

thread_local! {
    static SESSION: Rc<SessionState> = SessionState::new();
}

fn js_error(context: &str, value: &JsValue) -> HandshakeError {
    HandshakeError::Form(format!("{context}: {value:?}"))
}

fn document() -> Result<Document> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| HandshakeError::Form("no document".into()))
}

/// Payment form backed by the live DOM
pub struct DomForm {
    document: Document,
}

impl DomForm {
    pub const fn new(document: Document) -> Self {
        Self { document }
    }

    // Hidden field ids contain `$`, so look them up by id instead of selector
    fn input(&self, id: &str) -> Option<HtmlInputElement> {
        self.document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
    }

    fn select(&self, selector: &str) -> Option<Element> {
        self.document.query_selector(selector).ok().flatten()
    }
}

impl PaymentForm for DomForm {
    fn value(&self, id: &str) -> Option<String> {
        self.input(id).map(|input| input.value())
    }

    fn set_value(&self, id: &str, value: &str) {
        if let Some(input) = self.input(id) {
            input.set_value(value);
        }
    }

    fn remove_name(&self, selector: &str) {
        if let Some(el) = self.select(selector) {
            let _ = el.remove_attribute("name");
        }
    }

    fn notify(&self, message: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }

    fn resubmit(&self, selector: &str) {
        let Some(el) = self.select(selector) else {
            tracing::warn!(selector, "Submit control vanished before resubmit");
            return;
        };
        let _ = el.set_attribute(PASSTHROUGH_ATTRIBUTE, "true");
        if let Ok(button) = el.dyn_into::<HtmlElement>() {
            button.click();
        }
    }
}

/// The processor's `LitlePayPage` browser library
pub struct LitlePayPage {
    document: Document,
}

impl LitlePayPage {
    pub const fn new(document: Document) -> Self {
        Self { document }
    }

    fn field_elements(&self, fields: &FieldMap) -> Result<Object> {
        let object = Object::new();
        let entries = [
            ("accountNum", &fields.account_num),
            ("cvv2", &fields.cvv2),
            ("paypageRegistrationId", &fields.paypage_registration_id),
            ("bin", &fields.bin),
        ];
        for (key, selector) in entries {
            let element = self
                .document
                .query_selector(selector)
                .map_err(|e| js_error("invalid selector", &e))?
                .ok_or_else(|| HandshakeError::Form(format!("missing element {selector}")))?;
            Reflect::set(&object, &JsValue::from_str(key), &element)
                .map_err(|e| js_error("field map", &e))?;
        }
        Ok(object)
    }

    fn call(
        &self,
        request: &EprotectRequest,
        fields: &FieldMap,
        timeout: Duration,
        tx: &Completion,
    ) -> Result<()> {
        let window = web_sys::window().ok_or_else(|| HandshakeError::Form("no window".into()))?;
        let constructor: Function = Reflect::get(&window, &JsValue::from_str(LIBRARY_GLOBAL))
            .map_err(|e| js_error("library lookup", &e))?
            .dyn_into()
            .map_err(|e| js_error("library constructor", &e))?;
        let pay_page = Reflect::construct(&constructor, &Array::new())
            .map_err(|e| js_error("library construct", &e))?;
        let send: Function = Reflect::get(&pay_page, &JsValue::from_str("sendToLitle"))
            .map_err(|e| js_error("sendToLitle lookup", &e))?
            .dyn_into()
            .map_err(|e| js_error("sendToLitle", &e))?;

        let request = serde_wasm_bindgen::to_value(request)
            .map_err(|e| HandshakeError::Form(e.to_string()))?;
        let fields = self.field_elements(fields)?;

        let args = Array::new();
        args.push(&request);
        args.push(&fields);
        args.push(&completion(tx, TokenizationOutcome::Success));
        args.push(&completion(tx, TokenizationOutcome::Error));
        args.push(&timeout_completion(tx));
        #[allow(clippy::cast_precision_loss)]
        args.push(&JsValue::from_f64(timeout.as_millis() as f64));

        send.apply(&pay_page, &args)
            .map_err(|e| js_error("sendToLitle call", &e))?;
        Ok(())
    }
}

type Completion = Rc<RefCell<Option<oneshot::Sender<TokenizationOutcome>>>>;

fn deliver(tx: &Completion, outcome: TokenizationOutcome) {
    if let Some(sender) = tx.borrow_mut().take() {
        let _ = sender.send(outcome);
    }
}

fn completion(tx: &Completion, wrap: fn(TokenizationResponse) -> TokenizationOutcome) -> JsValue {
    let tx = Rc::clone(tx);
    Closure::once_into_js(move |value: JsValue| {
        let response: TokenizationResponse =
            serde_wasm_bindgen::from_value(value).unwrap_or_default();
        deliver(&tx, wrap(response));
    })
}

fn timeout_completion(tx: &Completion) -> JsValue {
    let tx = Rc::clone(tx);
    Closure::once_into_js(move || deliver(&tx, TokenizationOutcome::Timeout))
}

#[async_trait(?Send)]
impl TokenizationLibrary for LitlePayPage {
    fn is_loaded(&self) -> bool {
        web_sys::window()
            .is_some_and(|w| Reflect::has(&w, &JsValue::from_str(LIBRARY_GLOBAL)).unwrap_or(false))
    }

    async fn load(&self, url: &str) -> Result<()> {
        let script: HtmlScriptElement = self
            .document
            .create_element("script")
            .map_err(|e| js_error("create script", &e))?
            .dyn_into()
            .map_err(|e| js_error("script element", &e))?;
        script.set_src(url);

        let (tx, rx) = oneshot::channel::<bool>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let on_load = {
            let tx = Rc::clone(&tx);
            Closure::once_into_js(move || {
                if let Some(sender) = tx.borrow_mut().take() {
                    let _ = sender.send(true);
                }
            })
        };
        let on_error = Closure::once_into_js(move || {
            if let Some(sender) = tx.borrow_mut().take() {
                let _ = sender.send(false);
            }
        });
        script.set_onload(Some(on_load.unchecked_ref()));
        script.set_onerror(Some(on_error.unchecked_ref()));

        let head = self
            .document
            .head()
            .ok_or_else(|| HandshakeError::Form("no head element".into()))?;
        head.append_child(&script)
            .map_err(|e| js_error("append script", &e))?;

        match rx.await {
            Ok(true) => Ok(()),
            _ => Err(HandshakeError::LibraryUnavailable(url.to_string())),
        }
    }

    async fn send(
        &self,
        request: &EprotectRequest,
        fields: &FieldMap,
        timeout: Duration,
    ) -> TokenizationOutcome {
        let (tx, rx) = oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));

        if let Err(e) = self.call(request, fields, timeout, &tx) {
            tracing::error!(error = %e, "Tokenization call failed");
            // Unknown code: surfaces the generic technical-difficulty message
            return TokenizationOutcome::Error(TokenizationResponse {
                response: "889".into(),
                message: e.to_string(),
                ..Default::default()
            });
        }

        rx.await.unwrap_or(TokenizationOutcome::Timeout)
    }
}

type DomClient = EprotectClient<DomForm, LitlePayPage>;

fn bind_submit(client: Rc<DomClient>, document: &Document, selector: &str) -> Result<()> {
    let control = document
        .query_selector(selector)
        .map_err(|e| js_error("invalid selector", &e))?
        .ok_or_else(|| HandshakeError::Form(format!("missing submit control {selector}")))?;

    let handler = Closure::wrap(Box::new(move |event: Event| {
        let target = event
            .current_target()
            .and_then(|t| t.dyn_into::<Element>().ok());
        let passthrough = target
            .as_ref()
            .is_some_and(|el| el.has_attribute(PASSTHROUGH_ATTRIBUTE));

        match client.intercept(passthrough) {
            Interception::PassThrough => {
                if let Some(el) = target {
                    let _ = el.remove_attribute(PASSTHROUGH_ATTRIBUTE);
                }
            }
            Interception::Intercept => {
                event.prevent_default();
                let client = Rc::clone(&client);
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = client.tokenize().await {
                        tracing::debug!(error = %e, "Form submission halted");
                    }
                });
            }
        }
    }) as Box<dyn FnMut(_)>);

    control
        .add_event_listener_with_callback("click", handler.as_ref().unchecked_ref())
        .map_err(|e| js_error("bind submit", &e))?;
    handler.forget();
    Ok(())
}

/// Attach eProtect to the payment form described by `settings`.
///
/// Safe to call after every render; only the first call per page binds.
#[wasm_bindgen(js_name = attachEprotect)]
pub fn attach_eprotect(settings: JsValue) -> std::result::Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let settings: EprotectSettings = serde_wasm_bindgen::from_value(settings)?;
    let document = document().map_err(|e| JsValue::from_str(&e.to_string()))?;
    let session = SESSION.with(Rc::clone);

    let client = Rc::new(EprotectClient::new(
        settings,
        DomForm::new(document.clone()),
        LitlePayPage::new(document.clone()),
        session,
    ));

    wasm_bindgen_futures::spawn_local(async move {
        match client.attach().await {
            AttachOutcome::Bound { submit_selector } => {
                if let Err(e) = bind_submit(Rc::clone(&client), &document, submit_selector) {
                    tracing::error!(error = %e, "Failed to bind submit control");
                }
            }
            AttachOutcome::AlreadyBound | AttachOutcome::LibraryUnavailable => {}
        }
    });

    Ok(())
}
