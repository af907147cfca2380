//! A single message part: an opaque byte payload plus string metadata.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value as JsonValue;

/// Errors produced when interpreting a part's payload.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("part payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// One part of a [`crate::Message`].
///
/// The byte payload is authoritative. A structured JSON view of the
/// payload is decoded lazily and cached; any mutation of the bytes
/// invalidates the cache, and writing a structured value re-serialises
/// the payload so the two never diverge.
#[derive(Debug, Clone, Default)]
pub struct Part {
    data: Bytes,
    metadata: HashMap<String, String>,
    json: Option<JsonValue>,
}

impl Part {
    /// Create a part from a raw payload.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: HashMap::new(),
            json: None,
        }
    }

    /// Borrow the raw payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Clone out the raw payload.
    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Replace the raw payload, invalidating any cached JSON view.
    pub fn set_bytes(&mut self, data: impl Into<Bytes>) {
        self.data = data.into();
        self.json = None;
    }

    /// Structured view of the payload, decoded on first access and
    /// cached until the payload changes.
    pub fn json(&mut self) -> Result<&JsonValue, PartError> {
        if self.json.is_none() {
            self.json = Some(serde_json::from_slice(&self.data)?);
        }
        Ok(self.json.as_ref().expect("json cache populated above"))
    }

    /// Replace the structured view, re-serialising the payload so byte
    /// and JSON representations stay in sync.
    pub fn set_json(&mut self, value: JsonValue) -> Result<(), PartError> {
        self.data = Bytes::from(serde_json::to_vec(&value)?);
        self.json = Some(value);
        Ok(())
    }

    /// Fetch a metadata value.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Set a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Remove a metadata value, returning it if present.
    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.remove(key)
    }

    /// Iterate over all metadata pairs.
    pub fn metadata_iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<&[u8]> for Part {
    fn from(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }
}

impl From<Vec<u8>> for Part {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

impl From<&str> for Part {
    fn from(data: &str) -> Self {
        Self::new(Bytes::copy_from_slice(data.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_view_is_cached_until_bytes_change() {
        let mut part = Part::from(r#"{"foo":"bar"}"#);
        assert_eq!(part.json().expect("decode json")["foo"], json!("bar"));

        part.set_bytes(&br#"{"foo":"baz"}"#[..]);
        assert_eq!(
            part.json().expect("decode json after mutation")["foo"],
            json!("baz"),
            "payload mutation must invalidate the cached view"
        );
    }

    #[test]
    fn set_json_reserialises_payload() {
        let mut part = Part::from("ignored");
        part.set_json(json!({"a": 1})).expect("set json");
        assert_eq!(part.as_bytes(), br#"{"a":1}"#);
    }

    #[test]
    fn metadata_round_trip() {
        let mut part = Part::from("payload");
        part.set_metadata("key", "value");
        assert_eq!(part.metadata("key"), Some("value"));
        assert_eq!(part.remove_metadata("key").as_deref(), Some("value"));
        assert_eq!(part.metadata("key"), None);
    }
}
