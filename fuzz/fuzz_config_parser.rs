//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary bytes to `AppConfig::parse()`, and to the template
//! selector built from any config that validates.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = caseassist_config::AppConfig::parse(s) {
            // A validated config always yields a selector
            assert!(config.build_template_selector().is_ok());
        }
    }
});
