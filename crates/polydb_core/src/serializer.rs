//! Payload serialization.
//!
//! Backends store text. A [`Serializer`] turns the JSON data model into that
//! text and back; the typed helpers [`encode_document`] and
//! [`decode_document`] bridge documents to the data model through serde.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CoreResult;

/// Converts the document data model to stored text and back.
///
/// The engine never inspects the text; any format that round-trips a
/// [`Value`] works.
pub trait Serializer: Send + Sync {
    /// Short format name, used in logs.
    fn name(&self) -> &'static str;

    /// Encodes a value as text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value cannot be encoded.
    fn encode(&self, value: &Value) -> CoreResult<String>;

    /// Decodes text back into a value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the text is malformed.
    fn decode(&self, text: &str) -> CoreResult<Value>;
}

/// JSON payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer {
    pretty: bool,
}

impl JsonSerializer {
    /// Compact JSON.
    #[must_use]
    pub const fn compact() -> Self {
        Self { pretty: false }
    }

    /// Indented JSON.
    #[must_use]
    pub const fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Whether output is indented.
    #[must_use]
    pub const fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> CoreResult<String> {
        let text = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(text)
    }

    fn decode(&self, text: &str) -> CoreResult<Value> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Encodes a typed value.
///
/// # Errors
///
/// Returns a serialization error if the value cannot be represented.
pub fn encode_document<T: Serialize + ?Sized>(
    serializer: &dyn Serializer,
    doc: &T,
) -> CoreResult<String> {
    serializer.encode(&serde_json::to_value(doc)?)
}

/// Decodes a typed value.
///
/// # Errors
///
/// Returns a serialization error if the text is malformed or does not match
/// the shape of `T`.
pub fn decode_document<T: DeserializeOwned>(
    serializer: &dyn Serializer,
    text: &str,
) -> CoreResult<T> {
    Ok(serde_json::from_value(serializer.decode(text)?)?)
}
