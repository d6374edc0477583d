//! Fuzz target for the URL fragment codec.
//!
//! Run with: cargo +nightly fuzz run fuzz_fragment_decode
//!
//! Decoding never fails, and any decoded state survives a re-encode.

#![no_main]

use caseassist_core::engine::SearchState;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let fragment = String::from_utf8_lossy(data);
    let state = SearchState::from_fragment(&fragment);
    let again = SearchState::from_fragment(&state.to_fragment());
    assert_eq!(state, again);
});
