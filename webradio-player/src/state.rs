//! Shared state document
//!
//! The live state shown by clients: a JSON object with one section per
//! component (`mode`, `radio`, `player`). Components merge keys into it; a
//! publishing update sends the complete document as a `state` event. New
//! event-bus subscribers receive a snapshot of it on subscribe.

use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// Program version reported in `version` events
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state accessible by all components
pub struct SharedState {
    version: String,
    document: RwLock<Map<String, Value>>,
}

impl SharedState {
    /// Create a state document in the given UI mode
    pub fn new(mode: &str) -> Self {
        let mut document = Map::new();
        document.insert("mode".to_string(), Value::String(mode.to_string()));
        Self {
            version: VERSION.to_string(),
            document: RwLock::new(document),
        }
    }

    /// Program version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Snapshot of the whole document
    pub async fn snapshot(&self) -> Value {
        Value::Object(self.document.read().await.clone())
    }

    /// Set `section.key` to `value`, creating the section if needed.
    ///
    /// Returns the updated document so the caller can publish it.
    pub async fn update(&self, section: &str, key: &str, value: Value) -> Value {
        let mut document = self.document.write().await;
        let entry = document
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
        Value::Object(document.clone())
    }

    /// Replace a top-level entry (e.g. `mode`)
    pub async fn set(&self, key: &str, value: Value) -> Value {
        let mut document = self.document.write().await;
        document.insert(key.to_string(), value);
        Value::Object(document.clone())
    }

    /// Current UI mode
    pub async fn mode(&self) -> String {
        self.document
            .read()
            .await
            .get("mode")
            .and_then(Value::as_str)
            .unwrap_or("radio")
            .to_string()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new("radio")
    }
}
