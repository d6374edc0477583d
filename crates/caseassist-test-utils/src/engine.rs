//! Engine factories and configuration sources that record what they did.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use caseassist_core::BoxFuture;
use caseassist_core::engine::{
    EngineError, EngineFactory, LocalEngine, SearchEngine, SearchTransport, StaticTransport,
};
use caseassist_core::middleware::MiddlewarePipeline;
use caseassist_core::resolver::{ConfigSource, Configuration, ResolveError};

use crate::fixtures;

/// Builds [`LocalEngine`]s and keeps a handle to each one.
pub struct RecordingEngineFactory {
    transport: Arc<StaticTransport>,
    engines: Mutex<Vec<Arc<LocalEngine>>>,
    fail: bool,
}

impl RecordingEngineFactory {
    /// A factory whose engines answer every search with `response`.
    pub fn new(response: &str) -> Self {
        Self {
            transport: Arc::new(StaticTransport::new(response)),
            engines: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A factory whose engines answer with [`fixtures::search_response`].
    pub fn with_fixture_results() -> Self {
        Self::new(&fixtures::search_response().to_string())
    }

    /// A factory that refuses to build anything.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("{}")
        }
    }

    /// How many engines were built.
    pub fn build_count(&self) -> usize {
        self.engines.lock().expect("engines lock").len()
    }

    pub fn engines(&self) -> Vec<Arc<LocalEngine>> {
        self.engines.lock().expect("engines lock").clone()
    }

    /// The most recently built engine.
    pub fn last_engine(&self) -> Option<Arc<LocalEngine>> {
        self.engines.lock().expect("engines lock").last().cloned()
    }

    /// The shared transport, with every request the engines sent.
    pub fn transport(&self) -> &Arc<StaticTransport> {
        &self.transport
    }
}

impl Default for RecordingEngineFactory {
    fn default() -> Self {
        Self::with_fixture_results()
    }
}

impl EngineFactory for RecordingEngineFactory {
    fn build(
        &self,
        engine_id: &str,
        configuration: &Configuration,
        pipeline: MiddlewarePipeline,
    ) -> Result<Arc<dyn SearchEngine>, EngineError> {
        if self.fail {
            return Err(EngineError::Construction(format!(
                "refusing to build {engine_id}"
            )));
        }
        let transport: Arc<dyn SearchTransport> = self.transport.clone();
        let engine = Arc::new(LocalEngine::new(
            engine_id,
            configuration.clone(),
            pipeline,
            transport,
        ));
        self.engines
            .lock()
            .expect("engines lock")
            .push(Arc::clone(&engine));
        Ok(engine)
    }
}

/// Serves a fixed payload and counts fetches.
#[derive(Debug, Default)]
pub struct StaticConfigSource {
    payload: Option<String>,
    fetches: AtomicUsize,
}

impl StaticConfigSource {
    pub fn new(payload: Option<&str>) -> Self {
        Self {
            payload: payload.map(String::from),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source serving [`fixtures::CONFIG_PAYLOAD`].
    pub fn valid() -> Self {
        Self::new(Some(fixtures::CONFIG_PAYLOAD))
    }

    /// A source whose backend answers with nothing.
    pub fn empty() -> Self {
        Self::new(None)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ConfigSource for StaticConfigSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let payload = self.payload.clone();
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(payload)
        })
    }
}

/// A source whose fetch always fails.
#[derive(Debug, Default)]
pub struct FailingConfigSource;

impl ConfigSource for FailingConfigSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Option<String>, ResolveError>> {
        Box::pin(async { Err(ResolveError::Fetch("connection refused".to_string())) })
    }
}
