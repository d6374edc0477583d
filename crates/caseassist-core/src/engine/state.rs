//! Serializable engine state and its URL fragment codec.
//!
//! The fragment is `application/x-www-form-urlencoded`. Values equal to their
//! defaults are omitted, so a fresh engine serializes to an empty fragment.
//! Unknown keys and unparsable values are ignored on the way in.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::form_urlencoded;

/// Page size used when the fragment does not say otherwise.
pub const DEFAULT_NUMBER_OF_RESULTS: u32 = 10;

/// Sort used when the fragment does not say otherwise.
pub const DEFAULT_SORT_CRITERIA: &str = "relevancy";

/// The part of the engine state reflected in the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    /// Basic query expression.
    pub q: String,
    /// Zero-based index of the first result on the page.
    pub first_result: u32,
    /// Page size.
    pub number_of_results: u32,
    /// Sort expression (e.g. "relevancy", "date descending").
    pub sort_criteria: String,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            q: String::new(),
            first_result: 0,
            number_of_results: DEFAULT_NUMBER_OF_RESULTS,
            sort_criteria: DEFAULT_SORT_CRITERIA.to_string(),
        }
    }
}

impl SearchState {
    /// Serialize to a fragment (without the leading `#`).
    pub fn to_fragment(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if !self.q.is_empty() {
            out.append_pair("q", &self.q);
        }
        if self.first_result != 0 {
            out.append_pair("firstResult", &self.first_result.to_string());
        }
        if self.number_of_results != DEFAULT_NUMBER_OF_RESULTS {
            out.append_pair("numberOfResults", &self.number_of_results.to_string());
        }
        if self.sort_criteria != DEFAULT_SORT_CRITERIA {
            out.append_pair("sortCriteria", &self.sort_criteria);
        }
        out.finish()
    }

    /// Parse a fragment, with or without the leading `#`.
    ///
    /// Keys absent from the fragment take their default values, so parsing
    /// is a full replacement of the state rather than a patch.
    pub fn from_fragment(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let mut state = Self::default();

        for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "q" => state.q = value.into_owned(),
                "firstResult" => match value.parse::<u32>() {
                    Ok(n) => state.first_result = n,
                    Err(_) => warn!(value = %value, "Ignoring unparsable firstResult in fragment"),
                },
                "numberOfResults" => match value.parse::<u32>() {
                    Ok(n) if n > 0 => state.number_of_results = n,
                    _ => warn!(value = %value, "Ignoring invalid numberOfResults in fragment"),
                },
                "sortCriteria" if !value.is_empty() => state.sort_criteria = value.into_owned(),
                other => debug!(key = %other, "Ignoring unknown fragment key"),
            }
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_state_is_empty_fragment() {
        assert_eq!(SearchState::default().to_fragment(), "");
        assert_eq!(SearchState::from_fragment(""), SearchState::default());
    }

    #[test]
    fn test_round_trip() {
        let states = [
            SearchState {
                q: "how to enhance working".to_string(),
                ..SearchState::default()
            },
            SearchState {
                q: "sail & rig = 100%".to_string(),
                first_result: 20,
                number_of_results: 5,
                sort_criteria: "date descending".to_string(),
            },
            SearchState {
                first_result: 10,
                ..SearchState::default()
            },
        ];
        for state in states {
            let fragment = state.to_fragment();
            assert_eq!(SearchState::from_fragment(&fragment), state, "{fragment}");
        }
    }

    #[test]
    fn test_spaces_encode_as_plus() {
        let state = SearchState {
            q: "barca skipper".to_string(),
            ..SearchState::default()
        };
        assert_eq!(state.to_fragment(), "q=barca+skipper");
    }

    #[test]
    fn test_leading_hash_accepted() {
        let state = SearchState::from_fragment("#q=mast&firstResult=10");
        assert_eq!(state.q, "mast");
        assert_eq!(state.first_result, 10);
    }

    #[test]
    fn test_unknown_and_invalid_keys_ignored() {
        let state = SearchState::from_fragment("q=keel&tab=all&firstResult=abc&numberOfResults=0");
        assert_eq!(
            state,
            SearchState {
                q: "keel".to_string(),
                ..SearchState::default()
            }
        );
    }

    #[test]
    fn test_absent_keys_reset_to_default() {
        let state = SearchState::from_fragment("sortCriteria=date+ascending");
        assert_eq!(state.q, "");
        assert_eq!(state.sort_criteria, "date ascending");
        assert_eq!(state.number_of_results, DEFAULT_NUMBER_OF_RESULTS);
    }
}
