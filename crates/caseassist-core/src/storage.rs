//! Session-scoped key/value storage and the flags read from it.
//!
//! Values are JSON strings. Every reader here recovers from a missing or
//! malformed value by substituting a default and logging a warning; nothing
//! read from storage is allowed to fail the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::{debug, warn};

/// Key of the generated-answer flag object (`{"isVisible": bool}`).
pub const GENERATED_ANSWER_KEY: &str = "coveo-generated-answer-data";
/// Key of the JSON array of result ids the user already voted on.
pub const PREVIOUSLY_VOTED_KEY: &str = "idsPreviouslyVoted";
/// Key of the JSON array of result ids the user voted helpful.
pub const PREVIOUSLY_VOTED_POSITIVE_KEY: &str = "idsPreviouslyVotedPositive";

/// Browser-style session storage.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-memory [`SessionStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().ok().and_then(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.remove(key);
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedAnswerData {
    is_visible: bool,
}

/// Whether the generated answer is currently shown.
///
/// Defaults to `true` when the flag is unset, `null`, or unparsable.
pub fn generated_answer_visible(storage: &dyn SessionStorage) -> bool {
    let Some(raw) = storage.get_item(GENERATED_ANSWER_KEY) else {
        return true;
    };
    match serde_json::from_str::<Option<GeneratedAnswerData>>(&raw) {
        Ok(Some(data)) => data.is_visible,
        Ok(None) => true,
        Err(e) => {
            warn!(key = GENERATED_ANSWER_KEY, error = %e, "Malformed generated-answer flag; assuming visible");
            true
        }
    }
}

/// Result ids stored under one of the prior-vote keys.
///
/// Missing or malformed values read as an empty list.
pub fn previously_voted(storage: &dyn SessionStorage, key: &str) -> Vec<String> {
    let Some(raw) = storage.get_item(key) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(key = %key, error = %e, "Malformed prior-vote list; using empty list");
            Vec::new()
        }
    }
}

/// Clear both prior-vote lists.
pub fn reset_prior_votes(storage: &dyn SessionStorage) {
    let cleared = previously_voted(storage, PREVIOUSLY_VOTED_KEY).len()
        + previously_voted(storage, PREVIOUSLY_VOTED_POSITIVE_KEY).len();
    debug!(cleared, "Clearing prior votes");
    storage.set_item(PREVIOUSLY_VOTED_KEY, "[]");
    storage.set_item(PREVIOUSLY_VOTED_POSITIVE_KEY, "[]");
}
