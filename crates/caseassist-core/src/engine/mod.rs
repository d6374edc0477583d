//! The search engine collaborator: the dispatch surface the controller drives.
//!
//! The controller only needs fire-and-forget `dispatch`, a state snapshot,
//! a synchronize entry point for URL fragments, and state-change
//! subscriptions. [`LocalEngine`] is the in-process implementation used by
//! the CLI and the tests; a real deployment plugs in its own [`SearchEngine`].

pub mod local;
pub mod state;

use std::sync::Arc;

use crate::context::ContextMap;
use crate::middleware::MiddlewarePipeline;
use crate::resolver::Configuration;

pub use local::{LocalEngine, LocalEngineFactory, SearchTransport, StaticTransport};
pub use state::SearchState;

/// Analytics events attached to searches or logged on their own.
///
/// Only the event kind is modelled; payload construction is the analytics
/// client's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsEvent {
    /// The interface finished loading.
    InterfaceLoad,
    /// State was restored from a link or history navigation.
    SearchFromLink,
    /// A case-creation flow moved to its next stage.
    CaseNextStage { stage_name: String },
}

/// Actions accepted by [`SearchEngine::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the basic query expression.
    UpdateQuery { q: String },
    /// Replace the URL-visible state from a serialized fragment without
    /// searching.
    RestoreFragment { fragment: String },
    /// Replace the context payload sent with every search.
    SetContext(ContextMap),
    /// Run a search, logging the given event with it.
    ExecuteSearch { analytics: AnalyticsEvent },
    /// Log a standalone analytics event.
    Log(AnalyticsEvent),
}

impl Action {
    /// Short action name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::UpdateQuery { .. } => "update_query",
            Action::RestoreFragment { .. } => "restore_fragment",
            Action::SetContext(_) => "set_context",
            Action::ExecuteSearch { .. } => "execute_search",
            Action::Log(_) => "log",
        }
    }
}

/// Identifies a state-change subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked with the new state after every state change.
pub type StateListener = Arc<dyn Fn(&SearchState) + Send + Sync>;

/// Errors raised inside an engine implementation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine construction failed: {0}")]
    Construction(String),

    #[error("search transport failed: {0}")]
    Transport(String),

    #[error("malformed search response: {0}")]
    Response(#[from] serde_json::Error),
}

/// The engine dispatch surface.
///
/// Implementations serialize state updates internally, so callers need no
/// locking of their own.
pub trait SearchEngine: Send + Sync {
    /// Dispatch an action. Fire-and-forget; effects are applied in order.
    fn dispatch(&self, action: Action);

    /// Snapshot of the URL-visible state.
    fn state(&self) -> SearchState;

    /// Snapshot of the context payload currently set.
    fn context(&self) -> ContextMap;

    /// Re-enter the engine from a serialized fragment.
    ///
    /// Must be idempotent: synchronizing to the state the engine already
    /// holds produces no state change and no notification.
    fn synchronize(&self, fragment: &str);

    /// Register a state-change listener.
    fn subscribe(&self, listener: StateListener) -> SubscriptionId;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// The current state serialized as a fragment.
    fn fragment(&self) -> String {
        self.state().to_fragment()
    }
}

/// Builds engines for the bootstrapper.
///
/// The middleware pipeline is handed over at construction and never changes
/// for the lifetime of the engine.
pub trait EngineFactory: Send + Sync {
    /// Construct an engine for `engine_id`.
    fn build(
        &self,
        engine_id: &str,
        configuration: &Configuration,
        pipeline: MiddlewarePipeline,
    ) -> Result<Arc<dyn SearchEngine>, EngineError>;
}
