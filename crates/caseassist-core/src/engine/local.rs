//! In-process [`SearchEngine`] driven by a pluggable transport.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    Action, AnalyticsEvent, EngineError, EngineFactory, SearchEngine, SearchState, StateListener,
    SubscriptionId,
};
use crate::context::ContextMap;
use crate::middleware::{
    ClientOrigin, MiddlewarePipeline, ResponseBody, SearchRequest, SearchResponse, SearchResult,
};
use crate::resolver::Configuration;

/// Platform host used when the remote configuration names none.
pub const DEFAULT_PLATFORM_URL: &str = "https://platform.cloud.coveo.com";

/// Sends a search request and returns the raw response body.
pub trait SearchTransport: Send + Sync {
    fn send(&self, request: &SearchRequest) -> Result<String, EngineError>;
}

/// A transport that answers every request with the same body and records
/// what it was sent.
#[derive(Debug)]
pub struct StaticTransport {
    body: String,
    requests: Mutex<Vec<SearchRequest>>,
}

impl StaticTransport {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A transport returning no results.
    pub fn empty() -> Self {
        Self::new(r#"{"results": [], "totalCount": 0}"#)
    }

    /// Requests received so far, after request middleware.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl SearchTransport for StaticTransport {
    fn send(&self, request: &SearchRequest) -> Result<String, EngineError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        Ok(self.body.clone())
    }
}

#[derive(Default)]
struct EngineInner {
    state: SearchState,
    context: ContextMap,
    results: Vec<SearchResult>,
    dispatched: Vec<Action>,
    searches: Vec<AnalyticsEvent>,
    logged: Vec<AnalyticsEvent>,
    listeners: Vec<(SubscriptionId, StateListener)>,
}

/// An engine holding its state in memory and searching through a
/// [`SearchTransport`].
///
/// Listeners are invoked outside the internal lock, so a listener may call
/// back into the engine.
pub struct LocalEngine {
    engine_id: String,
    configuration: Configuration,
    pipeline: MiddlewarePipeline,
    transport: Arc<dyn SearchTransport>,
    inner: Mutex<EngineInner>,
    next_subscription: AtomicU64,
}

impl LocalEngine {
    pub fn new(
        engine_id: &str,
        configuration: Configuration,
        pipeline: MiddlewarePipeline,
        transport: Arc<dyn SearchTransport>,
    ) -> Self {
        Self {
            engine_id: engine_id.to_string(),
            configuration,
            pipeline,
            transport,
            inner: Mutex::new(EngineInner::default()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    /// Every action dispatched so far, in order.
    pub fn dispatched(&self) -> Vec<Action> {
        self.with_inner(|inner| inner.dispatched.clone())
    }

    /// The analytics event of every search executed so far, in order.
    pub fn executed(&self) -> Vec<AnalyticsEvent> {
        self.with_inner(|inner| inner.searches.clone())
    }

    /// Standalone analytics events logged so far.
    pub fn logged(&self) -> Vec<AnalyticsEvent> {
        self.with_inner(|inner| inner.logged.clone())
    }

    /// Results of the last successful search.
    pub fn results(&self) -> Vec<SearchResult> {
        self.with_inner(|inner| inner.results.clone())
    }

    fn lock(&self) -> Option<MutexGuard<'_, EngineInner>> {
        match self.inner.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!(engine_id = %self.engine_id, "Engine state lock poisoned");
                None
            }
        }
    }

    fn with_inner<T: Default>(&self, f: impl FnOnce(&EngineInner) -> T) -> T {
        self.lock().map(|inner| f(&inner)).unwrap_or_default()
    }

    /// Apply a state change and return the listeners to notify, if the state
    /// actually changed.
    fn replace_state(
        inner: &mut EngineInner,
        next: SearchState,
    ) -> Option<(SearchState, Vec<StateListener>)> {
        if inner.state == next {
            return None;
        }
        inner.state = next.clone();
        let listeners = inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
        Some((next, listeners))
    }

    fn notify(change: Option<(SearchState, Vec<StateListener>)>) {
        if let Some((state, listeners)) = change {
            for listener in listeners {
                listener(&state);
            }
        }
    }

    fn search_url(&self) -> String {
        let base = self
            .configuration
            .remote
            .platform_url
            .as_deref()
            .unwrap_or(DEFAULT_PLATFORM_URL)
            .trim_end_matches('/');
        format!(
            "{base}/rest/search/v2?organizationId={}",
            self.configuration.remote.organization_id
        )
    }

    fn execute_search(&self, analytics: AnalyticsEvent) {
        let Some((state, context)) = self.lock().map(|mut inner| {
            inner.searches.push(analytics.clone());
            (inner.state.clone(), inner.context.clone())
        }) else {
            return;
        };

        let search = &self.configuration.search;
        let mut body = json!({
            "q": state.q,
            "firstResult": state.first_result,
            "numberOfResults": state.number_of_results,
            "sortCriteria": state.sort_criteria,
            "searchHub": search.search_hub,
            "pipeline": search.pipeline,
            "locale": search.locale,
            "timezone": search.timezone,
            "context": context,
        });
        if !search.fields_to_include.is_empty() {
            body["fieldsToInclude"] = json!(search.fields_to_include);
        }
        let request = self.pipeline.apply_request(SearchRequest {
            url: self.search_url(),
            body: body.to_string(),
            origin: ClientOrigin::SearchApiFetch,
        });

        match self.fetch(&request) {
            Ok(response) => {
                let response = self.pipeline.apply_response(response);
                info!(
                    engine_id = %self.engine_id,
                    analytics = ?analytics,
                    total = response.body.total_count,
                    results = response.body.results.len(),
                    "Search executed"
                );
                if let Some(mut inner) = self.lock() {
                    inner.results = response.body.results;
                }
            }
            Err(e) => {
                warn!(engine_id = %self.engine_id, error = %e, "Search failed; keeping previous results");
            }
        }
    }

    fn fetch(&self, request: &SearchRequest) -> Result<SearchResponse, EngineError> {
        let raw = self.transport.send(request)?;
        let body: ResponseBody = serde_json::from_str(&raw)?;
        Ok(SearchResponse { status: 200, body })
    }
}

impl SearchEngine for LocalEngine {
    fn dispatch(&self, action: Action) {
        debug!(engine_id = %self.engine_id, action = action.name(), "Dispatching action");
        let Some(mut inner) = self.lock() else {
            return;
        };
        inner.dispatched.push(action.clone());

        match action {
            Action::UpdateQuery { q } => {
                let next = SearchState {
                    q,
                    first_result: 0,
                    ..inner.state.clone()
                };
                let change = Self::replace_state(&mut inner, next);
                drop(inner);
                Self::notify(change);
            }
            Action::RestoreFragment { fragment } => {
                let change = Self::replace_state(&mut inner, SearchState::from_fragment(&fragment));
                drop(inner);
                Self::notify(change);
            }
            Action::SetContext(context) => {
                inner.context = context;
            }
            Action::ExecuteSearch { analytics } => {
                drop(inner);
                self.execute_search(analytics);
            }
            Action::Log(event) => {
                info!(engine_id = %self.engine_id, event = ?event, "Analytics event logged");
                inner.logged.push(event);
            }
        }
    }

    fn state(&self) -> SearchState {
        self.with_inner(|inner| inner.state.clone())
    }

    fn context(&self) -> ContextMap {
        self.with_inner(|inner| inner.context.clone())
    }

    fn synchronize(&self, fragment: &str) {
        let next = SearchState::from_fragment(fragment);
        let Some(change) = self
            .lock()
            .and_then(|mut inner| Self::replace_state(&mut inner, next))
        else {
            debug!(engine_id = %self.engine_id, "Fragment matches current state; nothing to synchronize");
            return;
        };
        debug!(engine_id = %self.engine_id, fragment = %fragment, "Synchronizing from fragment");
        Self::notify(Some(change));
        self.execute_search(AnalyticsEvent::SearchFromLink);
    }

    fn subscribe(&self, listener: StateListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        if let Some(mut inner) = self.lock() {
            inner.listeners.push((id, listener));
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(mut inner) = self.lock() {
            inner.listeners.retain(|(sub, _)| *sub != id);
        }
    }
}

/// Builds [`LocalEngine`]s that share one transport.
#[derive(Clone)]
pub struct LocalEngineFactory {
    transport: Arc<dyn SearchTransport>,
    built: Arc<Mutex<Vec<Arc<LocalEngine>>>>,
}

impl LocalEngineFactory {
    pub fn new(transport: Arc<dyn SearchTransport>) -> Self {
        Self {
            transport,
            built: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every engine built so far, oldest first.
    pub fn built(&self) -> Vec<Arc<LocalEngine>> {
        self.built.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl EngineFactory for LocalEngineFactory {
    fn build(
        &self,
        engine_id: &str,
        configuration: &Configuration,
        pipeline: MiddlewarePipeline,
    ) -> Result<Arc<dyn SearchEngine>, EngineError> {
        info!(
            engine_id = %engine_id,
            organization = %configuration.remote.organization_id,
            request_middleware = ?pipeline.request_names(),
            response_middleware = ?pipeline.response_names(),
            "Constructing local engine"
        );
        let engine = Arc::new(LocalEngine::new(
            engine_id,
            configuration.clone(),
            pipeline,
            Arc::clone(&self.transport),
        ));
        if let Ok(mut built) = self.built.lock() {
            built.push(Arc::clone(&engine));
        }
        Ok(engine)
    }
}
