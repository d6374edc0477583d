//! Layered key/value context sent with every search.
//!
//! Layers merge from lowest to highest precedence:
//! [`LayerKind::Authenticated`] < [`LayerKind::Case`] < [`LayerKind::Computed`].
//! A higher layer overwrites colliding keys; keys it does not mention are left
//! alone. [`ContextComposer`] adds the always-present computed keys on top
//! and recomputes everything on every call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::storage::{self, SessionStorage};

/// Key of the static site identifier.
pub const WEBSITE_KEY: &str = "website";
/// Key of the smart-snippet flag (the negation of generated-answer visibility).
pub const SMART_SNIPPET_KEY: &str = "enableSmartSnippet";

/// A context value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

/// The merged context payload.
pub type ContextMap = BTreeMap<String, ContextValue>;

/// Context layers, ordered by precedence (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    /// Identity-derived; empty for anonymous users.
    Authenticated,
    /// Task-specific case fields.
    Case,
    /// Flags derived from local UI/session state.
    Computed,
}

/// One named layer of context values.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextLayer {
    pub kind: LayerKind,
    pub values: ContextMap,
}

impl ContextLayer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            values: ContextMap::new(),
        }
    }

    /// Add a value, returning the layer.
    pub fn with(mut self, key: &str, value: impl Into<ContextValue>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

/// Merge layers by precedence.
///
/// Input order does not matter: layers are applied lowest precedence first,
/// and layers of the same kind are applied in the order given.
pub fn merge_layers(layers: &[ContextLayer]) -> ContextMap {
    let mut ordered: Vec<&ContextLayer> = layers.iter().collect();
    ordered.sort_by_key(|layer| layer.kind);

    let mut merged = ContextMap::new();
    for layer in ordered {
        for (key, value) in &layer.values {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Builds the context payload for the engine.
#[derive(Clone)]
pub struct ContextComposer {
    website: String,
    storage: Arc<dyn SessionStorage>,
}

impl ContextComposer {
    pub fn new(website: &str, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            website: website.to_string(),
            storage,
        }
    }

    /// The computed layer, read fresh from session storage.
    pub fn computed_layer(&self) -> ContextLayer {
        let visible = storage::generated_answer_visible(self.storage.as_ref());
        ContextLayer::new(LayerKind::Computed)
            .with(WEBSITE_KEY, self.website.as_str())
            .with(SMART_SNIPPET_KEY, !visible)
    }

    /// Merge `layers` and the computed layer into one payload.
    ///
    /// The computed keys are applied last, after any caller-supplied
    /// computed layer.
    pub fn compose(&self, layers: &[ContextLayer]) -> ContextMap {
        let mut all = layers.to_vec();
        all.push(self.computed_layer());
        let merged = merge_layers(&all);
        debug!(keys = merged.len(), "Composed search context");
        merged
    }
}

/// Case fields handed over by the hosting flow as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseData {
    fields: serde_json::Map<String, Value>,
}

impl CaseData {
    /// Parse the JSON-serialized case fields.
    ///
    /// `None`, empty, or malformed input yields empty case data; malformed
    /// input is logged as a warning.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
            Ok(fields) => Self { fields },
            Err(e) => {
                warn!(error = %e, "Failed to parse case data; using empty case");
                Self::default()
            }
        }
    }

    /// A string field, if present.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("Subject")
    }

    pub fn description(&self) -> Option<&str> {
        self.get("Description")
    }

    /// Record new subject/description values.
    ///
    /// When either changed, the prior-vote lists in `storage` are cleared
    /// since votes on the old suggestions no longer apply. Returns whether
    /// anything changed.
    pub fn update(&mut self, subject: &str, description: &str, storage: &dyn SessionStorage) -> bool {
        if self.subject() == Some(subject) && self.description() == Some(description) {
            return false;
        }
        self.fields.insert("Subject".into(), subject.into());
        self.fields.insert("Description".into(), description.into());
        crate::storage::reset_prior_votes(storage);
        true
    }

    /// Serialize back to the JSON handed to the flow.
    pub fn to_json(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }

    /// The case context layer (`subject`, `description`).
    pub fn to_layer(&self) -> ContextLayer {
        let mut layer = ContextLayer::new(LayerKind::Case);
        if let Some(subject) = self.subject() {
            layer = layer.with("subject", subject);
        }
        if let Some(description) = self.description() {
            layer = layer.with("description", description);
        }
        layer
    }
}
