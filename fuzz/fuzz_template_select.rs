//! Fuzz target for result-template selection.
//!
//! Run with: cargo +nightly fuzz run fuzz_template_select
//!
//! The built-in rule set ends with a catch-all, so every object selects a
//! template.

#![no_main]

use caseassist_config::templates::TemplateSelector;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(serde_json::Value::Object(raw)) = serde_json::from_slice(data) else {
        return;
    };
    let selector = TemplateSelector::default();
    assert!(selector.select(&raw).is_some());
});
