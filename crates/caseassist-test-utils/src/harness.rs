//! A wired-up interface environment for tests.
//!
//! [`TestHarness`] owns one registry, bootstrapper, storage, and location, and
//! hands out as many interfaces and components as a test needs, all sharing
//! the same engine id.

use std::sync::Arc;

use caseassist_config::AppConfig;
use caseassist_config::templates::TemplateSelector;
use caseassist_core::component::SearchComponent;
use caseassist_core::interface::{InterfaceDeps, InterfaceProps, SearchInterface};
use caseassist_core::resolver::ConfigResolver;
use caseassist_core::session::{Bootstrapper, SessionRegistry};
use caseassist_core::storage::MemoryStorage;
use caseassist_core::url_sync::MemoryLocation;

use crate::engine::{RecordingEngineFactory, StaticConfigSource};
use crate::fixtures;

pub struct TestHarness {
    pub config: AppConfig,
    pub registry: SessionRegistry,
    pub source: Arc<StaticConfigSource>,
    pub factory: Arc<RecordingEngineFactory>,
    pub bootstrapper: Arc<Bootstrapper>,
    pub storage: Arc<MemoryStorage>,
    pub location: Arc<MemoryLocation>,
}

impl TestHarness {
    /// A harness whose configuration source serves `payload`.
    pub fn with_payload(payload: Option<&str>) -> Self {
        Self::build(
            AppConfig::default(),
            Arc::new(StaticConfigSource::new(payload)),
            Arc::new(RecordingEngineFactory::default()),
            "",
        )
    }

    /// A harness that resolves a valid configuration.
    pub fn valid() -> Self {
        Self::with_payload(Some(fixtures::CONFIG_PAYLOAD))
    }

    /// Replace the app config.
    pub fn with_config(self, config: AppConfig) -> Self {
        Self::build(config, self.source, self.factory, "")
    }

    /// Start from a page whose URL carries `fragment`.
    pub fn with_fragment(self, fragment: &str) -> Self {
        Self::build(self.config, self.source, self.factory, fragment)
    }

    /// Use `factory` for engine construction.
    pub fn with_factory(self, factory: RecordingEngineFactory) -> Self {
        Self::build(self.config, self.source, Arc::new(factory), "")
    }

    fn build(
        config: AppConfig,
        source: Arc<StaticConfigSource>,
        factory: Arc<RecordingEngineFactory>,
        fragment: &str,
    ) -> Self {
        let registry = SessionRegistry::new();
        let bootstrapper = Bootstrapper::new(
            registry.clone(),
            ConfigResolver::new(source.clone()),
            factory.clone(),
        );
        Self {
            config,
            registry,
            source,
            factory,
            bootstrapper: Arc::new(bootstrapper),
            storage: Arc::new(MemoryStorage::new()),
            location: Arc::new(MemoryLocation::new(fragment)),
        }
    }

    pub fn deps(&self) -> InterfaceDeps {
        InterfaceDeps {
            bootstrapper: Arc::clone(&self.bootstrapper),
            storage: self.storage.clone(),
            location: self.location.clone(),
        }
    }

    /// An interface for the configured engine id, with fixture case data.
    pub fn interface(&self) -> SearchInterface {
        let props = InterfaceProps::from_config(&self.config, Some(fixtures::CASE_DATA));
        SearchInterface::new(props, self.deps())
    }

    /// A component registered for the configured engine id.
    pub fn component(&self, name: &str) -> SearchComponent {
        let component = SearchComponent::new(
            name,
            &self.config.interface.engine_id,
            Arc::new(TemplateSelector::default()),
        );
        component.register(&self.registry);
        component
    }
}
