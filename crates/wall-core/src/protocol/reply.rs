//! Inbound replies and the typed bodies the wall sends back.
//!
//! The correlator treats a reply as an opaque JSON object.  The helpers here
//! are for callers that know which command they sent and want a typed view:
//!
//! ```json
//! {"req":"4","status":"ok"}
//! {"req":"5","status":"error","code":404,"message":"Unknown command"}
//! {"req":"6","ids":["a1","b2"]}
//! {"req":"7","title":"Plasma","description":"","source":"void main…","commit":"9f3e"}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::codec::{request_id_of, ProtocolError};
use crate::protocol::request_id::RequestId;

/// Failure reported by the wall in an error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("wall reported error {code}: {message}")]
pub struct RemoteError {
    /// HTTP-like status code (400 for bad input, 404 for unknown commands).
    pub code: u16,
    /// Human-readable reason.
    pub message: String,
}

/// Value of the `status` field, when a reply carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// One inbound JSON object, as delivered to a callback or to the
/// unsolicited-notification path.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    fields: Map<String, Value>,
}

impl Reply {
    /// Wraps a decoded JSON object.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The request id this reply answers, if it carries one.
    pub fn request_id(&self) -> Option<RequestId> {
        request_id_of(&self.fields)
    }

    /// Looks up a field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// All fields of the reply.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the reply and returns it as a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Interprets the `status` field.
    pub fn status(&self) -> Option<ReplyStatus> {
        match self.fields.get("status").and_then(Value::as_str)? {
            "ok" => Some(ReplyStatus::Ok),
            "error" => Some(ReplyStatus::Error),
            _ => None,
        }
    }

    /// Turns an error reply into a [`RemoteError`]; anything else passes
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when `status` is `"error"`.  Missing `code` or
    /// `message` fields fall back to `500` and an empty string.
    pub fn into_result(self) -> Result<Self, RemoteError> {
        if self.status() != Some(ReplyStatus::Error) {
            return Ok(self);
        }
        let code = self
            .fields
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok())
            .unwrap_or(500);
        let message = self
            .fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Err(RemoteError { code, message })
    }

    /// Deserializes the reply body into `T`.
    ///
    /// Unknown fields (including `req` and `status`) are ignored by the
    /// default serde behaviour, so `T` only needs the fields it cares about.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedReply`] if the body does not match.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| ProtocolError::UnexpectedReply(e.to_string()))
    }
}

// ── Typed reply bodies ────────────────────────────────────────────────────────

/// Reply to `shader list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderIds {
    pub ids: Vec<String>,
}

/// Reply to `shader read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderContent {
    pub title: String,
    pub description: String,
    pub source: String,
    pub commit: String,
}

/// Reply to `shader create` and `shader write`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderCommit {
    pub id: String,
    pub commit: String,
}

/// Reply to `emulator list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomList {
    pub roms: Vec<String>,
}
