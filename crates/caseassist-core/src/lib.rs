#![deny(unsafe_code)]

//! CaseAssist search-interface core.
//!
//! Bootstraps one engine session per engine id, installs the case-assist
//! request/response middleware, composes the layered search context, keeps
//! engine state and the URL fragment in sync, and forwards accessibility
//! announcements to a live region. The engine itself sits behind the
//! [`engine::SearchEngine`] trait; [`engine::LocalEngine`] is the in-process
//! implementation.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send` boxed future, returned by async trait methods that
/// must stay object-safe (`dyn ConfigSource`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Forwarding of announcements to the live-region child.
pub mod aria;
/// Components sharing an engine session with the interface.
pub mod component;
/// Context layers and their composition; case data.
pub mod context;
/// The engine dispatch surface and the in-memory engine.
pub mod engine;
/// The search-interface controller and its event loop.
pub mod interface;
/// In-memory diagnostics capture.
pub mod logging;
/// Request/response middleware pipelines.
pub mod middleware;
/// Remote configuration fetching and parsing.
pub mod resolver;
/// Session registry and bootstrapper.
pub mod session;
/// Session storage and the flags read from it.
pub mod storage;
/// Engine state to URL fragment synchronization.
pub mod url_sync;
/// Input validity checks.
pub mod validity;

pub use aria::{AriaLiveEventBridge, AriaLiveRegion, LiveRegion};
pub use component::SearchComponent;
pub use context::{CaseData, ContextComposer, ContextLayer, ContextMap, ContextValue, LayerKind};
pub use engine::{Action, AnalyticsEvent, EngineFactory, SearchEngine, SearchState};
pub use interface::{
    InterfaceDeps, InterfaceError, InterfaceEvent, InterfaceHandle, InterfaceProps,
    InterfaceService, SearchInterface,
};
pub use logging::{DiagnosticsCollector, DiagnosticsReader};
pub use middleware::{MiddlewarePipeline, PipelineBuilder};
pub use resolver::{ConfigResolver, ConfigSource, Configuration, SearchOptions};
pub use session::{
    BootState, BootstrapOutcome, BootstrapRequest, Bootstrapper, EngineSession, Readiness,
    SessionRegistry,
};
pub use storage::{MemoryStorage, SessionStorage};
pub use url_sync::{Location, MemoryLocation, UrlStateSynchronizer};
pub use validity::{Validatable, all_valid};
