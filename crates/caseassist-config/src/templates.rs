//! Result-template rules: first-match template selection for search results.
//!
//! A rule maps a `(field, values)` predicate to a named template. Rules are
//! evaluated in declaration order and the first match wins. Exactly one rule
//! may carry an empty predicate; it always matches and must be declared last,
//! otherwise it would shadow every rule after it. [`TemplateSelector::new`]
//! enforces that ordering.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// A field predicate: the result's raw `field` must equal one of `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch {
    /// Raw field name (e.g. "objecttype").
    pub field: String,
    /// Accepted values.
    pub values: Vec<String>,
}

impl FieldMatch {
    /// Create a predicate for `field` matching any of `values`.
    pub fn new(field: &str, values: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        match raw.get(&self.field) {
            Some(Value::String(s)) => self.values.iter().any(|v| v == s),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|s| self.values.iter().any(|v| v == s)),
            _ => false,
        }
    }
}

/// A single template rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRule {
    /// Template name (e.g. "case", "community").
    pub name: String,
    /// Predicates that must all hold. Empty means catch-all.
    pub conditions: Vec<FieldMatch>,
    /// Raw fields the template renders.
    pub fields: Vec<String>,
}

impl TemplateRule {
    /// Create a rule with a single field predicate.
    pub fn when(name: &str, field: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            conditions: vec![FieldMatch::new(field, values)],
            fields: Vec::new(),
        }
    }

    /// Create the catch-all rule.
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            conditions: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the fields this template needs.
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Whether this rule has no predicate and therefore matches everything.
    pub fn is_fallback(&self) -> bool {
        self.conditions.is_empty()
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        self.conditions.iter().all(|c| c.matches(raw))
    }
}

/// Errors raised when a rule list violates the ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template rule list is empty")]
    Empty,

    #[error("catch-all template {name:?} at position {index} shadows later rules")]
    FallbackNotLast { name: String, index: usize },

    #[error("more than one catch-all template ({first:?}, {second:?})")]
    MultipleFallbacks { first: String, second: String },

    #[error("no catch-all template; the last rule must have no predicate")]
    MissingFallback,
}

/// Ordered, validated template rules.
#[derive(Debug, Clone)]
pub struct TemplateSelector {
    rules: Vec<TemplateRule>,
}

impl TemplateSelector {
    /// Build a selector. The list must end with exactly one catch-all, so
    /// [`select`](Self::select) always finds a template.
    pub fn new(rules: Vec<TemplateRule>) -> Result<Self, TemplateError> {
        if rules.is_empty() {
            return Err(TemplateError::Empty);
        }
        let mut fallback: Option<&TemplateRule> = None;
        for (index, rule) in rules.iter().enumerate() {
            if !rule.is_fallback() {
                continue;
            }
            if let Some(first) = fallback {
                return Err(TemplateError::MultipleFallbacks {
                    first: first.name.clone(),
                    second: rule.name.clone(),
                });
            }
            if index != rules.len() - 1 {
                return Err(TemplateError::FallbackNotLast {
                    name: rule.name.clone(),
                    index,
                });
            }
            fallback = Some(rule);
        }
        if fallback.is_none() {
            return Err(TemplateError::MissingFallback);
        }
        Ok(Self { rules })
    }

    /// Select the first rule matching the given raw result fields.
    pub fn select(&self, raw: &Map<String, Value>) -> Option<&TemplateRule> {
        self.rules.iter().find(|rule| rule.matches(raw))
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[TemplateRule] {
        &self.rules
    }

    /// Union of the fields every template needs, sorted.
    pub fn required_fields(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .rules
            .iter()
            .flat_map(|r| r.fields.iter().map(String::as_str))
            .collect();
        set.into_iter().collect()
    }
}

impl Default for TemplateSelector {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// The built-in case-assist template set.
pub fn default_rules() -> Vec<TemplateRule> {
    vec![
        TemplateRule::when("youtube", "filetype", &["YouTubeVideo"])
            .with_fields(&["ytvideoid", "ytvideoduration", "ytviewcount"]),
        TemplateRule::when("case", "objecttype", &["Case"]).with_fields(&[
            "sfstatus",
            "sfcasestatus",
            "sfcasenumber",
            "foldingcollection",
            "sfid",
        ]),
        TemplateRule::when("chatter", "objecttype", &["Comment"]).with_fields(&[
            "sfcreatedby",
            "sfcreatedbymediumphotourl",
            "filetype",
            "objecttype",
            "sfcommentbody",
        ]),
        TemplateRule::when("discussion", "objecttype", &["Discussion"]).with_fields(&[
            "sfcreatedby",
            "sfcreatedbymediumphotourl",
            "filetype",
            "objecttype",
            "sffeedcommentscommentbody",
            "sfcommentcount",
        ]),
        TemplateRule::when("support_file", "objecttype", &["Support File"])
            .with_fields(&["barca_brand", "sftopicassignmentstopicid"]),
        TemplateRule::fallback("community")
            .with_fields(&["barca_brand", "sftopicassignmentstopicid"]),
    ]
}
