//! Canned payloads and results.

use caseassist_core::middleware::SearchResult;
use serde_json::{Value, json};

/// A remote configuration payload that resolves.
pub const CONFIG_PAYLOAD: &str = r#"{
    "organizationId": "barcagroup",
    "accessToken": "xx-test-token",
    "platformUrl": "https://platform.cloud.coveo.com"
}"#;

/// Serialized case data as handed over by the host flow.
pub const CASE_DATA: &str = r#"{"Subject": "Mast step corroded", "Description": "Found white residue around the mast step"}"#;

/// A photo URL as stored in the index.
pub const SOURCE_PHOTO_URL: &str = "https://barca.file.force.com/profilephoto/005/M/1";
/// [`SOURCE_PHOTO_URL`] after the rewrite.
pub const REWRITTEN_PHOTO_URL: &str = "https://s3.amazonaws.com/images.barca.group/profilephoto/005_M/1";

/// A search response with one folded discussion, one case, and one video.
pub fn search_response() -> Value {
    json!({
        "totalCount": 3,
        "searchUid": "fixture-search",
        "results": [
            {
                "title": "Mast step corrosion",
                "uri": "https://community.barca.group/discussion/1",
                "raw": {
                    "objecttype": "Discussion",
                    "sfcreatedby": "Skipper Sam",
                    "sfcreatedbymediumphotourl": SOURCE_PHOTO_URL,
                },
                "childResults": [
                    {
                        "title": "Re: Mast step corrosion",
                        "uri": "https://community.barca.group/comment/2",
                        "raw": {
                            "objecttype": "Comment",
                            "sfcreatedbymediumphotourl": SOURCE_PHOTO_URL,
                        },
                        "childResults": [],
                    }
                ],
            },
            {
                "title": "00012345",
                "uri": "https://support.barca.group/case/00012345",
                "raw": {"objecttype": "Case", "sfcasestatus": "Closed"},
                "childResults": [],
            },
            {
                "title": "Rigging a mast",
                "uri": "https://youtube.com/watch?v=abc",
                "raw": {"filetype": "YouTubeVideo", "ytvideoid": "abc"},
                "childResults": [],
            },
        ],
    })
}

/// The results of [`search_response`], parsed.
pub fn results() -> Vec<SearchResult> {
    serde_json::from_value(search_response()["results"].clone())
        .expect("fixture results are valid")
}

/// A result carrying only the given raw fields.
pub fn result_with_raw(raw: Value) -> SearchResult {
    SearchResult {
        raw: raw.as_object().cloned().unwrap_or_default(),
        ..SearchResult::default()
    }
}
