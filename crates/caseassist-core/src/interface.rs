//! The search-interface controller and its event loop.
//!
//! [`SearchInterface`] owns the per-instance state: whether it has been
//! initialized, the URL synchronizer, and the aria-live bridge. It can be
//! driven directly ([`SearchInterface::connect`]) or through
//! [`SearchInterface::channel`], which returns an [`InterfaceService`] to run
//! as a tokio task and an [`InterfaceHandle`] for sending it events.

use std::collections::BTreeMap;
use std::sync::Arc;

use caseassist_config::AppConfig;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::aria::{AriaLiveEventBridge, LiveRegion};
use crate::context::{CaseData, ContextComposer, ContextLayer, ContextMap, LayerKind};
use crate::engine::{Action, AnalyticsEvent};
use crate::resolver::SearchOptions;
use crate::session::{
    BootstrapOutcome, BootstrapRequest, Bootstrapper, EngineSession, InitCallback, Readiness,
};
use crate::storage::SessionStorage;
use crate::url_sync::{Location, UrlStateSynchronizer};
use crate::validity::{Validatable, all_valid};

/// Errors from the interface event channel.
#[derive(Debug, thiserror::Error)]
pub enum InterfaceError {
    #[error("interface channel closed")]
    ChannelClosed,
}

/// Per-instance properties.
#[derive(Debug, Clone)]
pub struct InterfaceProps {
    pub engine_id: String,
    pub options: SearchOptions,
    pub website: String,
    pub guest: bool,
    pub authenticated: BTreeMap<String, String>,
    pub case_data: CaseData,
    pub disable_state_in_url: bool,
    pub skip_first_search: bool,
    pub default_query: String,
}

impl InterfaceProps {
    /// Properties from the app config plus the host's serialized case data.
    pub fn from_config(config: &AppConfig, case_data: Option<&str>) -> Self {
        Self {
            engine_id: config.interface.engine_id.clone(),
            options: SearchOptions::from_config(config),
            website: config.context.website.clone(),
            guest: config.context.guest,
            authenticated: config.context.authenticated.clone(),
            case_data: CaseData::parse(case_data),
            disable_state_in_url: config.interface.disable_state_in_url,
            skip_first_search: config.interface.skip_first_search,
            default_query: config.interface.default_query.clone(),
        }
    }
}

/// Collaborators injected into the interface.
#[derive(Clone)]
pub struct InterfaceDeps {
    pub bootstrapper: Arc<Bootstrapper>,
    pub storage: Arc<dyn SessionStorage>,
    pub location: Arc<dyn Location>,
}

/// The search-interface controller.
pub struct SearchInterface {
    props: InterfaceProps,
    deps: InterfaceDeps,
    composer: ContextComposer,
    session: Option<Arc<EngineSession>>,
    url_sync: Option<UrlStateSynchronizer>,
    aria: AriaLiveEventBridge,
}

impl SearchInterface {
    pub fn new(props: InterfaceProps, deps: InterfaceDeps) -> Self {
        let composer = ContextComposer::new(&props.website, Arc::clone(&deps.storage));
        Self {
            props,
            deps,
            composer,
            session: None,
            url_sync: None,
            aria: AriaLiveEventBridge::new(),
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.props.engine_id
    }

    pub fn props(&self) -> &InterfaceProps {
        &self.props
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Arc<EngineSession>> {
        self.session.as_ref()
    }

    pub fn aria(&self) -> &AriaLiveEventBridge {
        &self.aria
    }

    /// Identity-derived layer; empty for guests.
    pub fn authenticated_layer(&self) -> ContextLayer {
        let mut layer = ContextLayer::new(LayerKind::Authenticated);
        if !self.props.guest {
            for (key, value) in &self.props.authenticated {
                layer = layer.with(key, value.as_str());
            }
        }
        layer
    }

    /// The full context payload, recomputed on every call.
    pub fn context(&self) -> ContextMap {
        self.composer
            .compose(&[self.authenticated_layer(), self.props.case_data.to_layer()])
    }

    /// Record new case subject/description from the host flow.
    pub fn update_case(&mut self, subject: &str, description: &str) -> bool {
        self.props
            .case_data
            .update(subject, description, self.deps.storage.as_ref())
    }

    /// Move the case flow on to its next stage.
    ///
    /// Every input reports its validity first. When all are valid and the
    /// interface is initialized, the case fields are recorded (clearing prior
    /// votes when they changed) and `CaseNextStage` is logged. Returns the
    /// case data to hand back to the flow, or `None` when the flow must stay.
    pub fn advance_stage(
        &mut self,
        stage_name: &str,
        inputs: &mut [&mut dyn Validatable],
        subject: &str,
        description: &str,
    ) -> Option<String> {
        if !all_valid(inputs) {
            debug!(engine_id = %self.props.engine_id, stage = %stage_name, "Invalid inputs; staying on stage");
            return None;
        }
        let Some(session) = &self.session else {
            debug!(engine_id = %self.props.engine_id, stage = %stage_name, "Stage change before initialization; ignored");
            return None;
        };
        let engine = Arc::clone(session.engine());
        self.update_case(subject, description);
        engine.dispatch(Action::Log(AnalyticsEvent::CaseNextStage {
            stage_name: stage_name.to_string(),
        }));
        info!(engine_id = %self.props.engine_id, stage = %stage_name, "Case flow advanced");
        Some(self.props.case_data.to_json())
    }

    /// Actions dispatched once, right after the engine is built.
    pub fn first_dispatch(&self) -> Vec<Action> {
        if self.props.skip_first_search {
            return Vec::new();
        }
        let fragment = self.deps.location.fragment();
        let query = if !self.props.disable_state_in_url && !fragment.is_empty() {
            Action::RestoreFragment { fragment }
        } else {
            Action::UpdateQuery {
                q: self.props.default_query.clone(),
            }
        };
        vec![
            Action::SetContext(self.context()),
            query,
            Action::ExecuteSearch {
                analytics: AnalyticsEvent::InterfaceLoad,
            },
        ]
    }

    pub fn bootstrap_request(&self) -> BootstrapRequest {
        BootstrapRequest {
            engine_id: self.props.engine_id.clone(),
            options: self.props.options.clone(),
            first_dispatch: self.first_dispatch(),
        }
    }

    /// Register `callback` for this interface's engine id.
    pub fn register(&self, callback: InitCallback) {
        self.deps
            .bootstrapper
            .registry()
            .request_initialization(&self.props.engine_id, callback);
    }

    /// Bootstrap the engine (a no-op if another caller already has), wait
    /// for it, and initialize. Returns whether the interface is initialized.
    pub async fn connect(&mut self) -> bool {
        self.deps.bootstrapper.bootstrap(self.bootstrap_request()).await;
        let registry = self.deps.bootstrapper.registry();
        if registry.wait(&self.props.engine_id).await != Readiness::Ready {
            return false;
        }
        match registry.session(&self.props.engine_id) {
            Some(session) => {
                self.initialize(session);
                true
            }
            None => false,
        }
    }

    /// Take the session. Idempotent: returns false when already initialized.
    pub fn initialize(&mut self, session: Arc<EngineSession>) -> bool {
        if self.session.is_some() {
            debug!(engine_id = %self.props.engine_id, "Interface already initialized");
            return false;
        }
        if !self.props.disable_state_in_url {
            self.url_sync = Some(UrlStateSynchronizer::attach(
                Arc::clone(session.engine()),
                Arc::clone(&self.deps.location),
            ));
        }
        self.session = Some(session);
        info!(engine_id = %self.props.engine_id, "Search interface initialized");
        true
    }

    /// Re-issue the search with a freshly composed context.
    ///
    /// Dropped before initialization.
    pub fn handle_generated_answer_toggle(&self) -> bool {
        let Some(session) = &self.session else {
            debug!(engine_id = %self.props.engine_id, "Generated-answer toggle before initialization; ignored");
            return false;
        };
        let context = self.context();
        debug!(engine_id = %self.props.engine_id, context = ?context, "Generated-answer toggled");
        let engine = session.engine();
        engine.dispatch(Action::SetContext(context));
        engine.dispatch(Action::ExecuteSearch {
            analytics: AnalyticsEvent::InterfaceLoad,
        });
        true
    }

    pub fn region_attached(&mut self, region: &Arc<dyn LiveRegion>) {
        self.aria.region_attached(region);
    }

    pub fn region_detached(&mut self) {
        self.aria.region_detached();
    }

    /// Tear down subscriptions and release the session.
    pub fn disconnect(&mut self) {
        if let Some(mut sync) = self.url_sync.take() {
            sync.detach();
        }
        self.aria.region_detached();
        if self.session.take().is_some() {
            info!(engine_id = %self.props.engine_id, "Search interface disconnected");
        }
    }

    /// Split into a service and its handle.
    pub fn channel(self) -> (InterfaceService, InterfaceHandle) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = watch::channel(Readiness::Pending);

        let service = InterfaceService {
            interface: self,
            event_rx,
            self_tx: event_tx.downgrade(),
            ready_tx,
        };
        let handle = InterfaceHandle { event_tx, ready_rx };
        (service, handle)
    }
}

/// Events processed by [`InterfaceService::run`].
pub enum InterfaceEvent {
    /// The registry delivered the session.
    Initialized(Arc<EngineSession>),
    GeneratedAnswerToggle,
    AriaLiveMessage {
        region_name: String,
        message: String,
        assertive: bool,
    },
    RegisterAriaRegion {
        region_name: String,
        assertive: bool,
    },
    RegionAttached(Arc<dyn LiveRegion>),
    RegionDetached,
    Shutdown,
}

impl std::fmt::Debug for InterfaceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(session) => f.debug_tuple("Initialized").field(session).finish(),
            Self::GeneratedAnswerToggle => f.write_str("GeneratedAnswerToggle"),
            Self::AriaLiveMessage {
                region_name,
                message,
                assertive,
            } => f
                .debug_struct("AriaLiveMessage")
                .field("region_name", region_name)
                .field("message", message)
                .field("assertive", assertive)
                .finish(),
            Self::RegisterAriaRegion {
                region_name,
                assertive,
            } => f
                .debug_struct("RegisterAriaRegion")
                .field("region_name", region_name)
                .field("assertive", assertive)
                .finish(),
            Self::RegionAttached(_) => f.write_str("RegionAttached"),
            Self::RegionDetached => f.write_str("RegionDetached"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Runs an interface as an async task.
pub struct InterfaceService {
    interface: SearchInterface,
    event_rx: mpsc::Receiver<InterfaceEvent>,
    self_tx: mpsc::WeakSender<InterfaceEvent>,
    ready_tx: watch::Sender<Readiness>,
}

impl InterfaceService {
    /// Bootstrap, then process events until shutdown or until every handle
    /// is dropped.
    pub async fn run(mut self) {
        let engine_id = self.interface.engine_id().to_string();
        info!(engine_id = %engine_id, "Search interface service started");

        let self_tx = self.self_tx.clone();
        self.interface.register(Box::new(move |session| {
            let Some(tx) = self_tx.upgrade() else {
                return;
            };
            if tx.try_send(InterfaceEvent::Initialized(session)).is_err() {
                warn!("Interface event queue full; initialization signal lost");
            }
        }));

        let bootstrapper = Arc::clone(&self.interface.deps.bootstrapper);
        let request = self.interface.bootstrap_request();
        let boot = async move {
            if let BootstrapOutcome::Unavailable = bootstrapper.bootstrap(request).await {
                return Readiness::Unavailable;
            }
            bootstrapper.registry().wait(&engine_id).await
        };
        tokio::pin!(boot);
        let mut booting = true;

        loop {
            tokio::select! {
                readiness = &mut boot, if booting => {
                    booting = false;
                    self.settle(readiness);
                }
                event = self.event_rx.recv() => {
                    let Some(event) = event else {
                        debug!("All interface handles dropped");
                        break;
                    };
                    if !self.handle(event) {
                        info!(engine_id = %self.interface.engine_id(), "Search interface shutting down");
                        break;
                    }
                }
            }
        }

        self.interface.disconnect();
        info!(engine_id = %self.interface.engine_id(), "Search interface service stopped");
    }

    /// Apply the registry's final readiness. The session is taken from the
    /// registry directly, so a lost `Initialized` event still initializes.
    fn settle(&mut self, readiness: Readiness) {
        match readiness {
            Readiness::Ready => {
                let session = self
                    .interface
                    .deps
                    .bootstrapper
                    .registry()
                    .session(self.interface.engine_id());
                if let Some(session) = session {
                    self.interface.initialize(session);
                    self.ready_tx.send_replace(Readiness::Ready);
                }
            }
            Readiness::Unavailable => {
                warn!(engine_id = %self.interface.engine_id(), "Engine unavailable; interface stays uninitialized");
                self.ready_tx.send_replace(Readiness::Unavailable);
            }
            Readiness::Pending => {}
        }
    }

    /// Returns false on shutdown.
    fn handle(&mut self, event: InterfaceEvent) -> bool {
        match event {
            InterfaceEvent::Initialized(session) => {
                self.interface.initialize(session);
                self.ready_tx.send_replace(Readiness::Ready);
            }
            InterfaceEvent::GeneratedAnswerToggle => {
                self.interface.handle_generated_answer_toggle();
            }
            InterfaceEvent::AriaLiveMessage {
                region_name,
                message,
                assertive,
            } => {
                self.interface.aria().announce(&region_name, &message, assertive);
            }
            InterfaceEvent::RegisterAriaRegion {
                region_name,
                assertive,
            } => {
                self.interface.aria().register(&region_name, assertive);
            }
            InterfaceEvent::RegionAttached(region) => self.interface.region_attached(&region),
            InterfaceEvent::RegionDetached => self.interface.region_detached(),
            InterfaceEvent::Shutdown => return false,
        }
        true
    }
}

/// Handle for a running [`InterfaceService`].
#[derive(Clone)]
pub struct InterfaceHandle {
    event_tx: mpsc::Sender<InterfaceEvent>,
    ready_rx: watch::Receiver<Readiness>,
}

impl InterfaceHandle {
    async fn send(&self, event: InterfaceEvent) -> Result<(), InterfaceError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| InterfaceError::ChannelClosed)
    }

    /// Wait until the interface is initialized or known to be unavailable.
    pub async fn ready(&self) -> Readiness {
        let mut rx = self.ready_rx.clone();
        match rx.wait_for(|r| *r != Readiness::Pending).await {
            Ok(readiness) => *readiness,
            Err(_) => Readiness::Unavailable,
        }
    }

    pub async fn toggle_generated_answer(&self) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::GeneratedAnswerToggle).await
    }

    pub async fn announce(
        &self,
        region_name: &str,
        message: &str,
        assertive: bool,
    ) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::AriaLiveMessage {
            region_name: region_name.to_string(),
            message: message.to_string(),
            assertive,
        })
        .await
    }

    pub async fn register_region(
        &self,
        region_name: &str,
        assertive: bool,
    ) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::RegisterAriaRegion {
            region_name: region_name.to_string(),
            assertive,
        })
        .await
    }

    pub async fn attach_region(&self, region: Arc<dyn LiveRegion>) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::RegionAttached(region)).await
    }

    pub async fn detach_region(&self) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::RegionDetached).await
    }

    pub async fn shutdown(&self) -> Result<(), InterfaceError> {
        self.send(InterfaceEvent::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aria::AriaLiveRegion;
    use crate::context::{SMART_SNIPPET_KEY, WEBSITE_KEY, ContextValue};
    use crate::engine::{LocalEngineFactory, StaticTransport};
    use crate::resolver::{ConfigResolver, InlineConfigSource};
    use crate::session::SessionRegistry;
    use crate::storage::{GENERATED_ANSWER_KEY, MemoryStorage};
    use crate::url_sync::MemoryLocation;
    use crate::validity::TextInput;
    use pretty_assertions::assert_eq;

    const PAYLOAD: &str = r#"{"organizationId": "barcagroup", "accessToken": "t"}"#;

    struct Fixture {
        deps: InterfaceDeps,
        factory: LocalEngineFactory,
        storage: Arc<MemoryStorage>,
        location: Arc<MemoryLocation>,
    }

    fn fixture(payload: Option<&str>, fragment: &str) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let location = Arc::new(MemoryLocation::new(fragment));
        let factory = LocalEngineFactory::new(Arc::new(StaticTransport::empty()));
        let bootstrapper = Bootstrapper::new(
            SessionRegistry::new(),
            ConfigResolver::new(Arc::new(InlineConfigSource::new(payload.map(String::from)))),
            Arc::new(factory.clone()),
        );
        Fixture {
            deps: InterfaceDeps {
                bootstrapper: Arc::new(bootstrapper),
                storage: storage.clone(),
                location: location.clone(),
            },
            factory,
            storage,
            location,
        }
    }

    fn props() -> InterfaceProps {
        InterfaceProps::from_config(
            &AppConfig::default(),
            Some(r#"{"Subject": "Mast", "Description": "Cracked"}"#),
        )
    }

    #[test]
    fn test_context_layers() {
        let fx = fixture(Some(PAYLOAD), "");
        let interface = SearchInterface::new(props(), fx.deps);
        let ctx = interface.context();
        assert_eq!(ctx.get("interests"), Some(&ContextValue::from("sailing")));
        assert_eq!(ctx.get("products_owned"), Some(&ContextValue::from("barca skipper pro")));
        assert_eq!(ctx.get("subject"), Some(&ContextValue::from("Mast")));
        assert_eq!(ctx.get(WEBSITE_KEY), Some(&ContextValue::from("support")));
        assert_eq!(ctx.get(SMART_SNIPPET_KEY), Some(&ContextValue::Bool(false)));
    }

    #[test]
    fn test_guest_has_no_authenticated_context() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut props = props();
        props.guest = true;
        let interface = SearchInterface::new(props, fx.deps);
        assert!(interface.authenticated_layer().values.is_empty());
        assert_eq!(interface.context().get("interests"), None);
    }

    #[test]
    fn test_first_dispatch_prefers_fragment() {
        let fx = fixture(Some(PAYLOAD), "#q=keel");
        let interface = SearchInterface::new(props(), fx.deps);
        let actions = interface.first_dispatch();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[1], Action::RestoreFragment { fragment: "q=keel".into() });

        let fx = fixture(Some(PAYLOAD), "");
        let interface = SearchInterface::new(props(), fx.deps);
        assert_eq!(
            interface.first_dispatch()[1],
            Action::UpdateQuery { q: "how to enhance working".into() }
        );
    }

    #[test]
    fn test_skip_first_search() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut props = props();
        props.skip_first_search = true;
        assert!(SearchInterface::new(props, fx.deps).first_dispatch().is_empty());
    }

    #[tokio::test]
    async fn test_connect_initializes_and_syncs_url() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut interface = SearchInterface::new(props(), fx.deps);
        assert!(interface.connect().await);
        assert!(interface.is_initialized());
        assert_eq!(fx.location.fragment(), "q=how+to+enhance+working");

        // Second connect is absorbed
        assert!(interface.connect().await);
        interface.disconnect();
        assert_eq!(fx.location.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_without_configuration() {
        let fx = fixture(None, "");
        let mut interface = SearchInterface::new(props(), fx.deps);
        assert!(!interface.connect().await);
        assert!(!interface.handle_generated_answer_toggle());
    }

    #[tokio::test]
    async fn test_toggle_recomposes_context() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut interface = SearchInterface::new(props(), fx.deps);
        interface.connect().await;
        let engine = Arc::clone(interface.session().unwrap().engine());

        fx.storage.set_item(GENERATED_ANSWER_KEY, r#"{"isVisible": false}"#);
        assert!(interface.handle_generated_answer_toggle());
        assert_eq!(engine.context().get(SMART_SNIPPET_KEY), Some(&ContextValue::Bool(true)));
        interface.disconnect();
    }

    #[tokio::test]
    async fn test_update_case_resets_votes() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut interface = SearchInterface::new(props(), fx.deps);
        assert!(interface.update_case("Keel", "Cracked"));
        assert_eq!(
            fx.storage.get_item(crate::storage::PREVIOUSLY_VOTED_KEY).as_deref(),
            Some("[]")
        );
        assert_eq!(interface.context().get("subject"), Some(&ContextValue::from("Keel")));
    }

    #[tokio::test]
    async fn test_service_lifecycle() {
        let fx = fixture(Some(PAYLOAD), "");
        let (service, handle) = SearchInterface::new(props(), fx.deps).channel();
        let task = tokio::spawn(service.run());

        assert_eq!(handle.ready().await, Readiness::Ready);
        assert_eq!(fx.location.listener_count(), 1);

        let live = Arc::new(AriaLiveRegion::new());
        handle.attach_region(live.clone()).await.unwrap();
        handle.announce("results", "10 results", false).await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(live.region("results").unwrap().message, "10 results");
        assert_eq!(fx.location.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_advance_stage_logs_and_resets_votes() {
        let fx = fixture(Some(PAYLOAD), "");
        fx.storage.set_item(crate::storage::PREVIOUSLY_VOTED_KEY, r#"["r1"]"#);
        let mut interface = SearchInterface::new(props(), fx.deps);
        assert!(interface.connect().await);
        let engine = fx.factory.built().pop().unwrap();

        let mut subject = TextInput::new("Subject", "Keel", true);
        let mut description = TextInput::new("Description", "Cracked near the bolts", true);
        let case = interface
            .advance_stage(
                "Describe Problem",
                &mut [&mut subject, &mut description],
                "Keel",
                "Cracked near the bolts",
            )
            .unwrap();

        let case: serde_json::Value = serde_json::from_str(&case).unwrap();
        assert_eq!(case["Subject"], "Keel");
        assert_eq!(case["Description"], "Cracked near the bolts");
        assert_eq!(
            fx.storage.get_item(crate::storage::PREVIOUSLY_VOTED_KEY).as_deref(),
            Some("[]")
        );
        assert_eq!(
            engine.dispatched().last(),
            Some(&Action::Log(AnalyticsEvent::CaseNextStage {
                stage_name: "Describe Problem".into()
            }))
        );
        interface.disconnect();
    }

    #[tokio::test]
    async fn test_advance_stage_invalid_inputs_stay() {
        let fx = fixture(Some(PAYLOAD), "");
        fx.storage.set_item(crate::storage::PREVIOUSLY_VOTED_KEY, r#"["r1"]"#);
        let mut interface = SearchInterface::new(props(), fx.deps);
        assert!(interface.connect().await);
        let engine = fx.factory.built().pop().unwrap();
        let dispatched_before = engine.dispatched().len();

        let mut subject = TextInput::new("Subject", "", true);
        let mut description = TextInput::new("Description", "", true);
        assert_eq!(
            interface.advance_stage(
                "Describe Problem",
                &mut [&mut subject, &mut description],
                "",
                "",
            ),
            None
        );
        // Both inputs reported, not just the first
        assert!(subject.error.is_some());
        assert!(description.error.is_some());
        assert_eq!(
            fx.storage.get_item(crate::storage::PREVIOUSLY_VOTED_KEY).as_deref(),
            Some(r#"["r1"]"#)
        );
        assert_eq!(interface.context().get("subject"), Some(&ContextValue::from("Mast")));
        assert_eq!(engine.dispatched().len(), dispatched_before);
        interface.disconnect();
    }

    #[tokio::test]
    async fn test_advance_stage_before_initialization() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut interface = SearchInterface::new(props(), fx.deps);
        let mut subject = TextInput::new("Subject", "Keel", true);
        assert_eq!(
            interface.advance_stage("Describe Problem", &mut [&mut subject], "Keel", ""),
            None
        );
        assert_eq!(fx.storage.get_item(crate::storage::PREVIOUSLY_VOTED_KEY), None);
    }

    #[tokio::test]
    async fn test_service_initializes_when_signal_is_lost() {
        let fx = fixture(Some(PAYLOAD), "");
        let mut first = SearchInterface::new(props(), fx.deps.clone());
        assert!(first.connect().await);

        // The late interface's queue is full before it runs, so the
        // registry's immediate callback cannot enqueue `Initialized`.
        let (service, handle) = SearchInterface::new(props(), fx.deps).channel();
        for _ in 0..256 {
            handle.toggle_generated_answer().await.unwrap();
        }
        let task = tokio::spawn(service.run());

        let readiness = tokio::time::timeout(std::time::Duration::from_secs(5), handle.ready())
            .await
            .expect("interface settles");
        assert_eq!(readiness, Readiness::Ready);
        handle.shutdown().await.unwrap();
        task.await.unwrap();
        first.disconnect();
    }

    #[tokio::test]
    async fn test_service_reports_unavailable() {
        let fx = fixture(None, "");
        let (service, handle) = SearchInterface::new(props(), fx.deps).channel();
        let task = tokio::spawn(service.run());

        assert_eq!(handle.ready().await, Readiness::Unavailable);
        handle.toggle_generated_answer().await.unwrap();
        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }
}
