//! Engine sessions, the registry that owns them, and the bootstrapper that
//! builds them.
//!
//! Each engine id moves through
//! `Uninitialized → ConfigPending → Constructing → Initialized`, or ends in
//! `Unavailable` when configuration cannot be resolved or the engine cannot
//! be built. The `Uninitialized → ConfigPending` step is taken under the
//! registry lock, so only one caller ever constructs a given engine; every
//! other bootstrap call is absorbed as [`BootstrapOutcome::AlreadyStarted`].
//!
//! Components register interest with
//! [`SessionRegistry::request_initialization`]. Their callbacks fire exactly
//! once, when the session completes, or immediately if it already has.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::engine::{Action, EngineFactory, SearchEngine};
use crate::middleware::MiddlewarePipeline;
use crate::resolver::{ConfigResolver, Configuration, SearchOptions};

/// Lifecycle of one engine id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Uninitialized,
    ConfigPending,
    Constructing,
    Initialized,
    /// Configuration was missing or construction failed. Terminal; there is
    /// no retry.
    Unavailable,
}

/// What a waiter observes about a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
    Unavailable,
}

/// A constructed engine and the configuration it was built from.
pub struct EngineSession {
    engine_id: String,
    configuration: Configuration,
    engine: Arc<dyn SearchEngine>,
    pipeline: MiddlewarePipeline,
}

impl EngineSession {
    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    /// The middleware installed at construction.
    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }
}

impl fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSession")
            .field("engine_id", &self.engine_id)
            .field("configuration", &self.configuration)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Invoked once with the session when it becomes ready.
pub type InitCallback = Box<dyn FnOnce(Arc<EngineSession>) + Send>;

struct SessionSlot {
    state: BootState,
    session: Option<Arc<EngineSession>>,
    callbacks: Vec<InitCallback>,
    ready: watch::Sender<Readiness>,
}

impl SessionSlot {
    fn new() -> Self {
        let (ready, _) = watch::channel(Readiness::Pending);
        Self {
            state: BootState::Uninitialized,
            session: None,
            callbacks: Vec::new(),
            ready,
        }
    }
}

/// Maps engine ids to their sessions. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    slots: Arc<Mutex<HashMap<String, SessionSlot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> Option<MutexGuard<'_, HashMap<String, SessionSlot>>> {
        match self.slots.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!("Session registry lock poisoned");
                None
            }
        }
    }

    /// Current lifecycle state of `engine_id`.
    pub fn state(&self, engine_id: &str) -> BootState {
        self.slots()
            .and_then(|slots| slots.get(engine_id).map(|slot| slot.state))
            .unwrap_or(BootState::Uninitialized)
    }

    /// The session for `engine_id`, once initialized.
    pub fn session(&self, engine_id: &str) -> Option<Arc<EngineSession>> {
        self.slots()
            .and_then(|slots| slots.get(engine_id).and_then(|slot| slot.session.clone()))
    }

    /// Register `callback` to run when `engine_id` is initialized.
    ///
    /// Runs it right away if the session already exists. Callbacks for an
    /// unavailable session are dropped.
    pub fn request_initialization(&self, engine_id: &str, callback: InitCallback) {
        let ready = {
            let Some(mut slots) = self.slots() else {
                return;
            };
            let slot = slots
                .entry(engine_id.to_string())
                .or_insert_with(SessionSlot::new);
            match slot.state {
                BootState::Initialized => slot.session.clone(),
                BootState::Unavailable => {
                    debug!(engine_id = %engine_id, "Session unavailable; initialization request dropped");
                    None
                }
                _ => {
                    slot.callbacks.push(callback);
                    return;
                }
            }
        };
        if let Some(session) = ready {
            callback(session);
        }
    }

    /// Claim construction of `engine_id`. Only the first caller gets `true`.
    pub fn begin(&self, engine_id: &str) -> bool {
        let Some(mut slots) = self.slots() else {
            return false;
        };
        let slot = slots
            .entry(engine_id.to_string())
            .or_insert_with(SessionSlot::new);
        if slot.state != BootState::Uninitialized {
            return false;
        }
        slot.state = BootState::ConfigPending;
        true
    }

    fn mark_constructing(&self, engine_id: &str) {
        let Some(mut slots) = self.slots() else {
            return;
        };
        if let Some(slot) = slots.get_mut(engine_id) {
            slot.state = BootState::Constructing;
        }
    }

    fn complete(&self, engine_id: &str, session: Arc<EngineSession>) {
        let (callbacks, ready) = {
            let Some(mut slots) = self.slots() else {
                return;
            };
            let slot = slots
                .entry(engine_id.to_string())
                .or_insert_with(SessionSlot::new);
            slot.state = BootState::Initialized;
            slot.session = Some(Arc::clone(&session));
            (std::mem::take(&mut slot.callbacks), slot.ready.clone())
        };
        debug!(engine_id = %engine_id, callbacks = callbacks.len(), "Notifying initialization callbacks");
        for callback in callbacks {
            callback(Arc::clone(&session));
        }
        ready.send_replace(Readiness::Ready);
    }

    fn fail(&self, engine_id: &str) {
        let ready = {
            let Some(mut slots) = self.slots() else {
                return;
            };
            let slot = slots
                .entry(engine_id.to_string())
                .or_insert_with(SessionSlot::new);
            slot.state = BootState::Unavailable;
            slot.callbacks.clear();
            slot.ready.clone()
        };
        ready.send_replace(Readiness::Unavailable);
    }

    /// Wait until `engine_id` is ready or unavailable.
    pub async fn wait(&self, engine_id: &str) -> Readiness {
        let mut rx = {
            let Some(mut slots) = self.slots() else {
                return Readiness::Unavailable;
            };
            slots
                .entry(engine_id.to_string())
                .or_insert_with(SessionSlot::new)
                .ready
                .subscribe()
        };
        match rx.wait_for(|r| *r != Readiness::Pending).await {
            Ok(readiness) => *readiness,
            Err(_) => Readiness::Unavailable,
        }
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<(String, BootState)> = self
            .slots()
            .map(|slots| slots.iter().map(|(id, slot)| (id.clone(), slot.state)).collect())
            .unwrap_or_default();
        f.debug_struct("SessionRegistry").field("sessions", &states).finish()
    }
}

/// Input to [`Bootstrapper::bootstrap`].
#[derive(Debug, Clone)]
pub struct BootstrapRequest {
    pub engine_id: String,
    pub options: SearchOptions,
    /// Dispatched once, in order, right after construction.
    pub first_dispatch: Vec<Action>,
}

/// Result of a bootstrap call.
#[derive(Debug, Clone)]
pub enum BootstrapOutcome {
    /// This call built the session.
    Constructed(Arc<EngineSession>),
    /// Another call already claimed the engine id.
    AlreadyStarted,
    /// Configuration was unavailable or construction failed.
    Unavailable,
}

/// Resolves configuration and constructs engine sessions.
pub struct Bootstrapper {
    registry: SessionRegistry,
    resolver: ConfigResolver,
    factory: Arc<dyn EngineFactory>,
    pipeline: MiddlewarePipeline,
}

impl Bootstrapper {
    /// A bootstrapper installing the case-assist middleware.
    pub fn new(
        registry: SessionRegistry,
        resolver: ConfigResolver,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        Self {
            registry,
            resolver,
            factory,
            pipeline: MiddlewarePipeline::case_assist(),
        }
    }

    /// Replace the middleware installed on new sessions.
    pub fn with_pipeline(mut self, pipeline: MiddlewarePipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Build the session for `request.engine_id` unless one exists or is
    /// being built.
    ///
    /// Configuration is only fetched by the call that claims the id.
    pub async fn bootstrap(&self, request: BootstrapRequest) -> BootstrapOutcome {
        let engine_id = request.engine_id;
        if !self.registry.begin(&engine_id) {
            debug!(
                engine_id = %engine_id,
                state = ?self.registry.state(&engine_id),
                "Engine already bootstrapped; skipping"
            );
            return BootstrapOutcome::AlreadyStarted;
        }

        let Some(configuration) = self.resolver.resolve(&engine_id, &request.options).await else {
            self.registry.fail(&engine_id);
            return BootstrapOutcome::Unavailable;
        };

        self.registry.mark_constructing(&engine_id);
        let engine = match self
            .factory
            .build(&engine_id, &configuration, self.pipeline.clone())
        {
            Ok(engine) => engine,
            Err(e) => {
                warn!(engine_id = %engine_id, error = %e, "Engine construction failed");
                self.registry.fail(&engine_id);
                return BootstrapOutcome::Unavailable;
            }
        };

        for action in request.first_dispatch {
            engine.dispatch(action);
        }

        let session = Arc::new(EngineSession {
            engine_id: engine_id.clone(),
            configuration,
            engine,
            pipeline: self.pipeline.clone(),
        });
        self.registry.complete(&engine_id, Arc::clone(&session));
        info!(engine_id = %engine_id, "Engine session initialized");
        BootstrapOutcome::Constructed(session)
    }
}
