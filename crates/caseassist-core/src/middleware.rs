//! Request/response middleware: ordered transforms installed at engine
//! construction.
//!
//! A [`MiddlewarePipeline`] is assembled with a [`PipelineBuilder`] and frozen
//! by [`PipelineBuilder::build`]. Request transforms run in install order on
//! every outbound request and response transforms run in install order on
//! every inbound response, so a response passing through `T1` then `T2`
//! equals `T2(T1(x))`.
//!
//! Two transforms ship with the crate:
//!
//! - [`FoldingRequest`] turns on result folding for search fetches.
//! - [`PhotoUrlRewrite`] moves author photos to the public image bucket.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Where an outbound request originates inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientOrigin {
    /// The search API fetch path.
    SearchApiFetch,
    /// Usage analytics.
    AnalyticsFetch,
    /// Case-assist classification and suggestion calls.
    CaseAssistApiFetch,
}

/// An outbound request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Target URL.
    pub url: String,
    /// JSON-serialized body.
    pub body: String,
    /// Origin tag.
    pub origin: ClientOrigin,
}

/// A single search result, possibly with folded child results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
    /// Raw index fields.
    #[serde(default)]
    pub raw: Map<String, Value>,
    #[serde(default)]
    pub child_results: Vec<SearchResult>,
    /// Fields this crate does not interpret, kept for round-tripping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An inbound response envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub status: u16,
    pub body: ResponseBody,
}

/// A transform over outbound requests.
pub trait RequestMiddleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Transform the request. Must be deterministic.
    fn process(&self, request: SearchRequest) -> SearchRequest;
}

/// A transform over inbound responses.
pub trait ResponseMiddleware: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Transform the response. Must be deterministic.
    fn process(&self, response: SearchResponse) -> SearchResponse;
}

/// Wraps a closure as a [`ResponseMiddleware`].
pub struct ResponseFn<F> {
    name: String,
    f: F,
}

impl<F> ResponseFn<F>
where
    F: Fn(SearchResponse) -> SearchResponse + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> ResponseMiddleware for ResponseFn<F>
where
    F: Fn(SearchResponse) -> SearchResponse + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, response: SearchResponse) -> SearchResponse {
        (self.f)(response)
    }
}

/// Wraps a closure as a [`RequestMiddleware`].
pub struct RequestFn<F> {
    name: String,
    f: F,
}

impl<F> RequestFn<F>
where
    F: Fn(SearchRequest) -> SearchRequest + Send + Sync,
{
    pub fn new(name: &str, f: F) -> Self {
        Self {
            name: name.to_string(),
            f,
        }
    }
}

impl<F> RequestMiddleware for RequestFn<F>
where
    F: Fn(SearchRequest) -> SearchRequest + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, request: SearchRequest) -> SearchRequest {
        (self.f)(request)
    }
}

/// Collects transforms before the pipeline is frozen.
#[derive(Default)]
pub struct PipelineBuilder {
    requests: Vec<Arc<dyn RequestMiddleware>>,
    responses: Vec<Arc<dyn ResponseMiddleware>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request transform.
    pub fn request(mut self, middleware: impl RequestMiddleware + 'static) -> Self {
        self.requests.push(Arc::new(middleware));
        self
    }

    /// Append a response transform.
    pub fn response(mut self, middleware: impl ResponseMiddleware + 'static) -> Self {
        self.responses.push(Arc::new(middleware));
        self
    }

    /// Freeze the pipeline.
    pub fn build(self) -> MiddlewarePipeline {
        MiddlewarePipeline {
            requests: self.requests.into(),
            responses: self.responses.into(),
        }
    }
}

/// An immutable, cheaply clonable pair of ordered transform lists.
#[derive(Clone)]
pub struct MiddlewarePipeline {
    requests: Arc<[Arc<dyn RequestMiddleware>]>,
    responses: Arc<[Arc<dyn ResponseMiddleware>]>,
}

impl MiddlewarePipeline {
    /// A pipeline with no transforms.
    pub fn empty() -> Self {
        PipelineBuilder::new().build()
    }

    /// Folding on requests, photo rewrite on responses.
    pub fn case_assist() -> Self {
        Self::case_assist_builder().build()
    }

    /// The case-assist transforms, open for further integrations to append to.
    pub fn case_assist_builder() -> PipelineBuilder {
        PipelineBuilder::new()
            .request(FoldingRequest)
            .response(PhotoUrlRewrite)
    }

    /// Run every request transform in install order.
    pub fn apply_request(&self, request: SearchRequest) -> SearchRequest {
        self.requests.iter().fold(request, |req, m| {
            debug!(middleware = m.name(), url = %req.url, "Applying request middleware");
            m.process(req)
        })
    }

    /// Run every response transform in install order.
    pub fn apply_response(&self, response: SearchResponse) -> SearchResponse {
        self.responses.iter().fold(response, |resp, m| {
            debug!(middleware = m.name(), "Applying response middleware");
            m.process(resp)
        })
    }

    /// Request transform names in install order.
    pub fn request_names(&self) -> Vec<&str> {
        self.requests.iter().map(|m| m.name()).collect()
    }

    /// Response transform names in install order.
    pub fn response_names(&self) -> Vec<&str> {
        self.responses.iter().map(|m| m.name()).collect()
    }
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::case_assist()
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("requests", &self.request_names())
            .field("responses", &self.response_names())
            .finish()
    }
}

// ── Folding ──────────────────────────────────────────────────────────

/// Field holding the folding collection key.
pub const FOLDING_FILTER_FIELD: &str = "@foldingcollection";
/// Field identifying a parent result.
pub const FOLDING_PARENT_FIELD: &str = "@foldingparent";
/// Field identifying a child result.
pub const FOLDING_CHILD_FIELD: &str = "@foldingchild";
/// Result-count cap applied to folded searches.
// TODO: read the folding fields and cap from the remote configuration once
// the platform exposes them there.
pub const FOLDING_NUMBER_OF_RESULTS: u64 = 5;

/// Enables hierarchical folding on search fetches.
///
/// Only requests tagged [`ClientOrigin::SearchApiFetch`] whose URL does not
/// target an `html` endpoint are rewritten; everything else passes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldingRequest;

impl FoldingRequest {
    fn applies_to(request: &SearchRequest) -> bool {
        request.origin == ClientOrigin::SearchApiFetch && !request.url.contains("html")
    }
}

impl RequestMiddleware for FoldingRequest {
    fn name(&self) -> &str {
        "folding"
    }

    fn process(&self, mut request: SearchRequest) -> SearchRequest {
        if !Self::applies_to(&request) {
            return request;
        }

        let mut body: Map<String, Value> = match serde_json::from_str(&request.body) {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Request body is not a JSON object; folding skipped");
                return request;
            }
        };
        body.insert("filterField".into(), FOLDING_FILTER_FIELD.into());
        body.insert("parentField".into(), FOLDING_PARENT_FIELD.into());
        body.insert("childField".into(), FOLDING_CHILD_FIELD.into());
        body.insert("numberOfResults".into(), FOLDING_NUMBER_OF_RESULTS.into());

        match serde_json::to_string(&body) {
            Ok(s) => request.body = s,
            Err(e) => warn!(error = %e, "Failed to re-serialize folded request body"),
        }
        request
    }
}

// ── Photo URL rewrite ────────────────────────────────────────────────

/// Raw field holding the author's photo URL.
pub const PHOTO_URL_FIELD: &str = "sfcreatedbymediumphotourl";
const PHOTO_SOURCE_HOST: &str = "https://barca.file.force.com";
const PHOTO_TARGET_HOST: &str = "https://s3.amazonaws.com/images.barca.group";
const PHOTO_SOURCE_TOKEN: &str = "/M";
const PHOTO_TARGET_TOKEN: &str = "_M";

/// Rewrite a photo URL: swap the host, then swap the first `/M` token.
///
/// Each substitution replaces the first occurrence only.
pub fn rewrite_photo_url(url: &str) -> String {
    url.replacen(PHOTO_SOURCE_HOST, PHOTO_TARGET_HOST, 1)
        .replacen(PHOTO_SOURCE_TOKEN, PHOTO_TARGET_TOKEN, 1)
}

/// Rewrites [`PHOTO_URL_FIELD`] on every result and every nested child.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoUrlRewrite;

impl PhotoUrlRewrite {
    fn rewrite(result: &mut SearchResult) {
        if let Some(Value::String(url)) = result.raw.get_mut(PHOTO_URL_FIELD) {
            *url = rewrite_photo_url(url);
        }
        for child in &mut result.child_results {
            Self::rewrite(child);
        }
    }
}

impl ResponseMiddleware for PhotoUrlRewrite {
    fn name(&self) -> &str {
        "photo_url_rewrite"
    }

    fn process(&self, mut response: SearchResponse) -> SearchResponse {
        for result in &mut response.body.results {
            Self::rewrite(result);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn search_request(url: &str, origin: ClientOrigin) -> SearchRequest {
        SearchRequest {
            url: url.to_string(),
            body: json!({"q": "keel", "numberOfResults": 10}).to_string(),
            origin,
        }
    }

    fn result_with_photo(photo: &str, children: Vec<SearchResult>) -> SearchResult {
        let mut raw = Map::new();
        raw.insert(PHOTO_URL_FIELD.to_string(), photo.into());
        SearchResult {
            raw,
            child_results: children,
            ..SearchResult::default()
        }
    }

    fn photo(result: &SearchResult) -> Option<&str> {
        result.raw.get(PHOTO_URL_FIELD).and_then(Value::as_str)
    }

    #[test]
    fn test_photo_rewrite_bit_exact() {
        assert_eq!(
            rewrite_photo_url("https://barca.file.force.com/foo/M/bar"),
            "https://s3.amazonaws.com/images.barca.group/foo_M/bar"
        );
    }

    #[test]
    fn test_photo_rewrite_only_first_occurrence() {
        assert_eq!(
            rewrite_photo_url("https://barca.file.force.com/a/M/b/M"),
            "https://s3.amazonaws.com/images.barca.group/a_M/b/M"
        );
    }

    #[test]
    fn test_photo_rewrite_foreign_host_only_swaps_token() {
        assert_eq!(
            rewrite_photo_url("https://cdn.example.com/x/M/y"),
            "https://cdn.example.com/x_M/y"
        );
    }

    #[test]
    fn test_photo_rewrite_recurses_into_children() {
        let grandchild = result_with_photo("https://barca.file.force.com/g/M/1", vec![]);
        let child = result_with_photo("https://barca.file.force.com/c/M/1", vec![grandchild]);
        let top = result_with_photo("https://barca.file.force.com/t/M/1", vec![child]);
        let response = SearchResponse {
            status: 200,
            body: ResponseBody {
                results: vec![top, SearchResult::default()],
                ..ResponseBody::default()
            },
        };

        let out = PhotoUrlRewrite.process(response);
        let top = &out.body.results[0];
        assert_eq!(photo(top), Some("https://s3.amazonaws.com/images.barca.group/t_M/1"));
        let child = &top.child_results[0];
        assert_eq!(photo(child), Some("https://s3.amazonaws.com/images.barca.group/c_M/1"));
        assert_eq!(
            photo(&child.child_results[0]),
            Some("https://s3.amazonaws.com/images.barca.group/g_M/1")
        );
        // Results without the field are untouched
        assert_eq!(out.body.results[1], SearchResult::default());
    }

    #[test]
    fn test_photo_rewrite_ignores_non_string_field() {
        let mut raw = Map::new();
        raw.insert(PHOTO_URL_FIELD.to_string(), json!(42));
        let response = SearchResponse {
            status: 200,
            body: ResponseBody {
                results: vec![SearchResult {
                    raw: raw.clone(),
                    ..SearchResult::default()
                }],
                ..ResponseBody::default()
            },
        };
        let out = PhotoUrlRewrite.process(response);
        assert_eq!(out.body.results[0].raw, raw);
    }

    #[test]
    fn test_folding_rewrites_search_fetch() {
        let req = search_request(
            "https://platform.cloud.coveo.com/rest/search/v2",
            ClientOrigin::SearchApiFetch,
        );
        let out = FoldingRequest.process(req);
        let body: Value = serde_json::from_str(&out.body).unwrap();
        assert_eq!(body["filterField"], "@foldingcollection");
        assert_eq!(body["parentField"], "@foldingparent");
        assert_eq!(body["childField"], "@foldingchild");
        assert_eq!(body["numberOfResults"], 5);
        assert_eq!(body["q"], "keel");
    }

    #[test]
    fn test_folding_skips_html_endpoint() {
        let req = search_request(
            "https://platform.cloud.coveo.com/rest/search/v2/html",
            ClientOrigin::SearchApiFetch,
        );
        let out = FoldingRequest.process(req.clone());
        assert_eq!(out, req);
    }

    #[test]
    fn test_folding_skips_other_origins() {
        for origin in [ClientOrigin::AnalyticsFetch, ClientOrigin::CaseAssistApiFetch] {
            let req = search_request("https://example.com/rest/ua/v15", origin);
            assert_eq!(FoldingRequest.process(req.clone()), req);
        }
    }

    #[test]
    fn test_folding_passes_through_malformed_body() {
        let req = SearchRequest {
            url: "https://example.com/rest/search/v2".to_string(),
            body: "not json".to_string(),
            origin: ClientOrigin::SearchApiFetch,
        };
        assert_eq!(FoldingRequest.process(req.clone()), req);
    }

    #[test]
    fn test_response_pipeline_order_is_composition() {
        let t1 = |mut r: SearchResponse| {
            r.body.total_count *= 2;
            r
        };
        let t2 = |mut r: SearchResponse| {
            r.body.total_count += 3;
            r
        };
        let pipeline = PipelineBuilder::new()
            .response(ResponseFn::new("double", t1))
            .response(ResponseFn::new("add_three", t2))
            .build();

        for n in [0, 1, 7, 100] {
            let input = SearchResponse {
                status: 200,
                body: ResponseBody {
                    total_count: n,
                    ..ResponseBody::default()
                },
            };
            let expected = t2(t1(input.clone()));
            assert_eq!(pipeline.apply_response(input), expected);
        }
    }

    #[test]
    fn test_request_pipeline_runs_in_install_order() {
        let pipeline = PipelineBuilder::new()
            .request(RequestFn::new("a", |mut r: SearchRequest| {
                r.url.push('a');
                r
            }))
            .request(RequestFn::new("b", |mut r: SearchRequest| {
                r.url.push('b');
                r
            }))
            .build();
        let out = pipeline.apply_request(search_request("x", ClientOrigin::AnalyticsFetch));
        assert_eq!(out.url, "xab");
        assert_eq!(pipeline.request_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_case_assist_pipeline_contents() {
        let pipeline = MiddlewarePipeline::case_assist();
        assert_eq!(pipeline.request_names(), vec!["folding"]);
        assert_eq!(pipeline.response_names(), vec!["photo_url_rewrite"]);
    }

    #[test]
    fn test_integration_appends_after_builtins() {
        let pipeline = MiddlewarePipeline::case_assist_builder()
            .response(ResponseFn::new("audit", |r| r))
            .build();
        assert_eq!(pipeline.response_names(), vec!["photo_url_rewrite", "audit"]);
    }

    #[test]
    fn test_response_body_round_trips_unknown_fields() {
        let raw = json!({
            "totalCount": 2,
            "searchUid": "abc",
            "results": [{"title": "t", "uri": "u", "raw": {}, "childResults": [], "score": 9}]
        });
        let body: ResponseBody = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(body.extra["searchUid"], "abc");
        assert_eq!(body.results[0].extra["score"], 9);
        assert_eq!(serde_json::to_value(&body).unwrap(), raw);
    }
}
