//! Messages: ordered, non-empty sequences of parts flowing through pipelines.

use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::part::Part;
use crate::SYNC_RESPONSE_METADATA_KEY;

/// Shared store collecting messages marked as synchronous responses.
///
/// Request/reply inputs attach one of these to every message they emit;
/// clones of the message (fan-out, sub-pipelines) share the same store,
/// so a downstream processor can hand a reply body back to the origin.
#[derive(Debug, Clone, Default)]
pub struct ResultStore(Arc<Mutex<Vec<Message>>>);

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, message: Message) {
        self.0.lock().expect("result store poisoned").push(message);
    }

    /// Drain every stored response message.
    pub fn take_all(&self) -> Vec<Message> {
        std::mem::take(&mut *self.0.lock().expect("result store poisoned"))
    }
}

/// An ordered sequence of [`Part`]s.
///
/// Parts are addressable by signed index; negative indices count from
/// the end, so `-1` is the final part. A message is mutable while a
/// processor owns it.
#[derive(Debug, Clone, Default)]
pub struct Message {
    parts: Vec<Part>,
    result_store: Option<ResultStore>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a message with one part per payload.
    pub fn from_bytes<I, B>(payloads: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            parts: payloads.into_iter().map(Part::new).collect(),
            result_store: None,
        }
    }

    /// Create a single-part message.
    pub fn from_part(part: Part) -> Self {
        Self {
            parts: vec![part],
            result_store: None,
        }
    }

    /// Attach a result store for synchronous responses.
    pub fn with_result_store(mut self, store: ResultStore) -> Self {
        self.result_store = Some(store);
        self
    }

    pub fn result_store(&self) -> Option<&ResultStore> {
        self.result_store.as_ref()
    }

    /// Record this message as a synchronous response for its origin.
    ///
    /// A no-op when no request/reply input attached a store. The stored
    /// copy is detached from the store so entries never self-reference.
    pub fn set_as_response(&mut self) {
        self.set_metadata_all(SYNC_RESPONSE_METADATA_KEY, "true");
        if let Some(store) = self.result_store.clone() {
            let mut copy = self.clone();
            copy.result_store = None;
            store.push(copy);
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Resolve a signed part index against the current part count.
    pub fn resolve_index(&self, index: i64) -> Option<usize> {
        let len = self.parts.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        if (0..len).contains(&resolved) {
            Some(resolved as usize)
        } else {
            None
        }
    }

    pub fn get(&self, index: i64) -> Option<&Part> {
        self.resolve_index(index).map(|i| &self.parts[i])
    }

    pub fn get_mut(&mut self, index: i64) -> Option<&mut Part> {
        self.resolve_index(index).map(move |i| &mut self.parts[i])
    }

    /// Replace the part at `index`. Returns false when out of range.
    pub fn set(&mut self, index: i64, part: Part) -> bool {
        match self.resolve_index(index) {
            Some(i) => {
                self.parts[i] = part;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Remove and return the part at `index`, if in range.
    pub fn remove(&mut self, index: i64) -> Option<Part> {
        self.resolve_index(index).map(|i| self.parts.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Part> {
        self.parts.iter_mut()
    }

    /// Clone out every part payload in order.
    pub fn get_all_bytes(&self) -> Vec<Bytes> {
        self.parts.iter().map(Part::to_bytes).collect()
    }

    /// Consume the message, yielding its parts.
    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }

    /// True when any part carries the given metadata key.
    pub fn has_metadata(&self, key: &str) -> bool {
        self.parts.iter().any(|p| p.metadata(key).is_some())
    }

    /// Set a metadata key on every part.
    pub fn set_metadata_all(&mut self, key: &str, value: &str) {
        for part in &mut self.parts {
            part.set_metadata(key, value);
        }
    }

    /// Remove a metadata key from every part.
    pub fn remove_metadata_all(&mut self, key: &str) {
        for part in &mut self.parts {
            part.remove_metadata(key);
        }
    }
}

impl From<Vec<Part>> for Message {
    fn from(parts: Vec<Part>) -> Self {
        Self {
            parts,
            result_store: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::from_bytes(["zero".as_bytes().to_vec(), "one".into(), "two".into()])
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let msg = sample();
        assert_eq!(msg.get(-1).expect("last part").as_bytes(), b"two");
        assert_eq!(msg.get(-3).expect("first part").as_bytes(), b"zero");
        assert!(msg.get(-4).is_none());
        assert!(msg.get(3).is_none());
    }

    #[test]
    fn set_out_of_range_is_rejected() {
        let mut msg = sample();
        assert!(!msg.set(7, Part::from("nope")));
        assert!(msg.set(0, Part::from("replaced")));
        assert_eq!(msg.get(0).expect("part 0").as_bytes(), b"replaced");
    }

    #[test]
    fn get_all_bytes_preserves_order() {
        let all = sample().get_all_bytes();
        assert_eq!(all, vec![&b"zero"[..], &b"one"[..], &b"two"[..]]);
    }

    #[test]
    fn result_store_collects_detached_copies() {
        let store = ResultStore::new();
        let mut msg = Message::from_bytes(["response0".as_bytes().to_vec()])
            .with_result_store(store.clone());
        msg.set_as_response();

        let stored = store.take_all();
        assert_eq!(stored.len(), 1, "one response recorded");
        assert_eq!(stored[0].get(0).expect("part").as_bytes(), b"response0");
        assert!(stored[0].result_store().is_none(), "entries must not self-reference");
        assert!(store.take_all().is_empty(), "take_all drains the store");
    }
}
