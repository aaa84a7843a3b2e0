//! JSON text-frame codec.
//!
//! Wire format: exactly one JSON object per WebSocket text frame.
//!
//! ```text
//! {"req":"3","cmd":"shader read","id":"a1b2c3"}
//! ```
//!
//! Outbound objects are built as [`OutboundMessage`]s and stamped with their
//! request id at the moment they are handed to the connection.  Inbound
//! frames are decoded with [`decode_frame`], which only checks that the text
//! is a JSON object; what the object *means* is decided further up.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::request_id::RequestId;

/// Field carrying the request id in both directions.
pub const REQUEST_ID_FIELD: &str = "req";

/// Field carrying the command name on outbound messages.
pub const COMMAND_FIELD: &str = "cmd";

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame text is not valid JSON.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame is valid JSON but not an object (e.g. an array or a number).
    #[error("frame is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    /// A payload could not be turned into a JSON object.
    #[error("payload could not be serialized: {0}")]
    Serialize(String),

    /// A reply did not have the shape the caller expected.
    #[error("unexpected reply shape: {0}")]
    UnexpectedReply(String),
}

/// Returns a short name for the JSON type of `value`, for error messages.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Outbound ──────────────────────────────────────────────────────────────────

/// An outbound payload: a JSON object without its request id yet.
///
/// The connection layer owns the request counter, so callers never set `req`
/// themselves.  If they do, [`encode`](Self::encode) overwrites it.
///
/// # Examples
///
/// ```rust
/// use wall_core::protocol::{OutboundMessage, RequestId};
///
/// let msg = OutboundMessage::command("emulator input")
///     .with("key", "a")
///     .with("press", true);
/// let frame = msg.encode(RequestId::new(5));
/// let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
/// assert_eq!(value["req"], "5");
/// assert_eq!(value["cmd"], "emulator input");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundMessage {
    fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message with its `cmd` field set.
    pub fn command(name: impl Into<String>) -> Self {
        Self::new().with(COMMAND_FIELD, name.into())
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builds a message from anything that serializes to a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Serialize`] if serialization fails and
    /// [`ProtocolError::NotAnObject`] if the payload is not an object.
    pub fn from_serialize<T: Serialize + ?Sized>(payload: &T) -> Result<Self, ProtocolError> {
        let value =
            serde_json::to_value(payload).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
        Self::try_from(value)
    }

    /// The `cmd` field, if present and a string.
    pub fn command_name(&self) -> Option<&str> {
        self.fields.get(COMMAND_FIELD).and_then(Value::as_str)
    }

    /// Looks up a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the message.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Stamps `id` into the `req` field and serializes the message to text.
    ///
    /// Serializing a `serde_json::Map` cannot fail, so this is infallible.
    pub fn encode(mut self, id: RequestId) -> String {
        if self.fields.contains_key(REQUEST_ID_FIELD) {
            tracing::debug!("overwriting caller-supplied `req` field with {id}");
        }
        self.fields
            .insert(REQUEST_ID_FIELD.to_string(), Value::String(id.to_string()));
        Value::Object(self.fields).to_string()
    }
}

impl From<Map<String, Value>> for OutboundMessage {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for OutboundMessage {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ProtocolError::NotAnObject {
                found: json_type_name(&other),
            }),
        }
    }
}

// ── Inbound ───────────────────────────────────────────────────────────────────

/// Decodes one inbound text frame into its JSON object.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] for invalid JSON and
/// [`ProtocolError::NotAnObject`] for JSON that is not an object.
pub fn decode_frame(text: &str) -> Result<Map<String, Value>, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(ProtocolError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

/// Reads the request id out of a decoded object.
///
/// The wall echoes ids as strings; a plain integer is accepted as well.
pub(crate) fn request_id_of(fields: &Map<String, Value>) -> Option<RequestId> {
    match fields.get(REQUEST_ID_FIELD)? {
        Value::String(s) => RequestId::parse(s),
        Value::Number(n) => n.as_u64().map(RequestId::new),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
