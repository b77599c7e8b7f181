//! Response Codec
//!
//! Turns the processor's hierarchical response document into a flat
//! field map and classifies response codes.
//!
//! ```text
//! <litleOnlineResponse response="0" message="Valid Format">
//!   <saleResponse id="a1" reportGroup="Default Report Group">
//!     <litleTxnId>82924701437133501</litleTxnId>     ──▶  litleTxnId = 82924701437133501
//!     <response>000</response>                       ──▶  response   = 000
//!     <tokenResponse>
//!       <litleToken>1111222233334444</litleToken>    ──▶  litleToken = 1111222233334444
//!     </tokenResponse>
//!   </saleResponse>
//! </litleOnlineResponse>
//! ```

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{PaymentError, Result};

/// Response codes the processor uses for approval
pub const SUCCESS_CODES: [&str; 3] = ["000", "801", "802"];

/// Whether a response code means the transaction was approved
pub fn is_success_code(code: &str) -> bool {
    SUCCESS_CODES.contains(&code)
}

/// Outcome class of a processor response code
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Decline or processor business error
    Decline,
}

impl ResponseClass {
    pub fn of(code: &str) -> Self {
        if is_success_code(code) {
            Self::Success
        } else {
            Self::Decline
        }
    }
}

/// A node of a processor document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut element = Self::new(String::from_utf8_lossy(start.local_name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| PaymentError::Codec(e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

/// Hierarchical processor response document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseDocument {
    root: Element,
}

impl ResponseDocument {
    pub const fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse processor XML
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| PaymentError::Codec("unbalanced closing tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = Some(element),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(PaymentError::Codec("unexpected end of document".into()));
        }
        root.map(Self::new)
            .ok_or_else(|| PaymentError::Codec("empty document".into()))
    }

    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// The payload element named `key`: a child of the root, or the root itself
    pub fn payload(&self, key: &str) -> Option<&Element> {
        if self.root.name == key {
            return Some(&self.root);
        }
        self.root.child(key)
    }
}

/// Flat field name → value view of one response payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseFields(BTreeMap<String, String>);

impl ResponseFields {
    /// Flatten the payload named `key`.
    ///
    /// Attributes and leaf elements of the payload come first; nested
    /// structures are flattened into the same map without overwriting them.
    /// Empty names and values are dropped.
    pub fn from_document(document: &ResponseDocument, key: &str) -> Result<Self> {
        let payload = document
            .payload(key)
            .ok_or_else(|| PaymentError::Codec(format!("response has no {key} payload")))?;

        let mut fields = BTreeMap::new();
        flatten_into(payload, &mut fields);
        Ok(Self(fields))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Processor response code (`response`)
    pub fn response_code(&self) -> &str {
        self.get("response").unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.get("message").unwrap_or_default()
    }

    /// Remote transaction id
    pub fn transaction_id(&self) -> Option<&str> {
        self.get("litleTxnId").or_else(|| self.get("cnpTxnId"))
    }

    /// Durable card token, when the processor returned one
    pub fn token(&self) -> Option<&str> {
        self.get("litleToken").or_else(|| self.get("cnpToken"))
    }

    pub fn class(&self) -> ResponseClass {
        ResponseClass::of(self.response_code())
    }

    pub fn is_success(&self) -> bool {
        self.class() == ResponseClass::Success
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl FromIterator<(String, String)> for ResponseFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn flatten_into(element: &Element, fields: &mut BTreeMap<String, String>) {
    for (key, value) in &element.attributes {
        insert_if_present(fields, key, value);
    }
    for child in element.children.iter().filter(|c| c.children.is_empty()) {
        if child.attributes.is_empty() || !child.text.trim().is_empty() {
            insert_if_present(fields, &child.name, child.text.trim());
        }
        for (key, value) in &child.attributes {
            insert_if_present(fields, key, value);
        }
    }
    for child in element.children.iter().filter(|c| !c.children.is_empty()) {
        flatten_into(child, fields);
    }
}

fn insert_if_present(fields: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if key.is_empty() || value.is_empty() {
        return;
    }
    fields.entry(key.to_string()).or_insert_with(|| value.to_string());
}
