//! Frame type for the Switchyard wire protocol.

use crate::codec::ProtocolError;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag of the frame sent right after connecting.
pub const AUTHORIZE: &str = "authorize";

/// Name of the tag field on the wire.
pub const TAG_FIELD: &str = "type";

/// A protocol frame.
///
/// On the wire the tag sits next to the body fields:
/// `{"type": "drive", "throttle": 40, "steering": 0, "brake": false}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Message tag.
    pub kind: String,
    /// Body fields. A `"type"` key here is never written to the wire.
    pub body: Map<String, Value>,
}

impl Frame {
    /// Create a frame from a tag and body fields.
    #[must_use]
    pub fn new(kind: impl Into<String>, mut body: Map<String, Value>) -> Self {
        body.remove(TAG_FIELD);
        Self {
            kind: kind.into(),
            body,
        }
    }

    /// Create a frame whose body is `value` serialized as an object.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not serialize to a JSON object.
    pub fn from_value<T: Serialize>(kind: impl Into<String>, value: &T) -> Result<Self, ProtocolError> {
        match serde_json::to_value(value)? {
            Value::Object(body) => Ok(Self::new(kind, body)),
            Value::Null => Ok(Self::new(kind, Map::new())),
            other => Err(ProtocolError::Invalid(format!(
                "frame body must be an object, got {other}"
            ))),
        }
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn into_value<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        Ok(serde_json::from_value(Value::Object(self.body))?)
    }

    /// Create the authorization frame sent on connect.
    #[must_use]
    pub fn authorize(token: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("token".to_string(), Value::String(token.into()));
        Self::new(AUTHORIZE, body)
    }

    /// Parse a frame from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object with a string
    /// `"type"` field.
    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        crate::codec::decode_text(text)
    }

    /// Render the frame as JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        crate::codec::encode_text(self)
    }
}

// Serialized by hand so the map length is always known up front, which
// the MessagePack encoder requires.
impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.body.iter().filter(|(k, _)| k.as_str() != TAG_FIELD);
        let mut map = serializer.serialize_map(Some(fields.clone().count() + 1))?;
        map.serialize_entry(TAG_FIELD, &self.kind)?;
        for (key, value) in fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frame {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut body = Map::<String, Value>::deserialize(deserializer)?;
        match body.remove(TAG_FIELD) {
            Some(Value::String(kind)) => Ok(Self { kind, body }),
            _ => Err(de::Error::custom("missing string \"type\" field")),
        }
    }
}
