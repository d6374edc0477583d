//! Consumer components that share an engine session with the interface.

use std::sync::{Arc, OnceLock};

use caseassist_config::templates::{TemplateRule, TemplateSelector};
use tracing::debug;

use crate::engine::Action;
use crate::middleware::SearchResult;
use crate::session::{EngineSession, SessionRegistry};

/// A component attached to an engine id.
///
/// It becomes usable when the registry delivers the session. Delivery is
/// idempotent: a second delivery is ignored.
pub struct SearchComponent {
    name: String,
    engine_id: String,
    session: Arc<OnceLock<Arc<EngineSession>>>,
    templates: Arc<TemplateSelector>,
}

impl SearchComponent {
    pub fn new(name: &str, engine_id: &str, templates: Arc<TemplateSelector>) -> Self {
        Self {
            name: name.to_string(),
            engine_id: engine_id.to_string(),
            session: Arc::new(OnceLock::new()),
            templates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    /// Ask to be initialized when the session for this component's engine
    /// id is ready.
    pub fn register(&self, registry: &SessionRegistry) {
        let slot = Arc::clone(&self.session);
        let name = self.name.clone();
        registry.request_initialization(
            &self.engine_id,
            Box::new(move |session| {
                if slot.set(session).is_err() {
                    debug!(component = %name, "Component already initialized");
                } else {
                    debug!(component = %name, "Component initialized");
                }
            }),
        );
    }

    pub fn is_initialized(&self) -> bool {
        self.session.get().is_some()
    }

    pub fn session(&self) -> Option<&Arc<EngineSession>> {
        self.session.get()
    }

    /// Dispatch through the shared engine. A no-op returning false before
    /// initialization.
    pub fn dispatch(&self, action: Action) -> bool {
        match self.session.get() {
            Some(session) => {
                session.engine().dispatch(action);
                true
            }
            None => {
                debug!(component = %self.name, action = action.name(), "Not initialized; action dropped");
                false
            }
        }
    }

    /// The template to render `result` with.
    pub fn select_template(&self, result: &SearchResult) -> Option<&TemplateRule> {
        self.templates.select(&result.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AnalyticsEvent, LocalEngineFactory, StaticTransport};
    use crate::resolver::{ConfigResolver, InlineConfigSource, SearchOptions};
    use crate::session::{BootstrapRequest, Bootstrapper};
    use serde_json::json;

    fn result(raw: serde_json::Value) -> SearchResult {
        SearchResult {
            raw: raw.as_object().cloned().unwrap_or_default(),
            ..SearchResult::default()
        }
    }

    #[test]
    fn test_select_template() {
        let component = SearchComponent::new("results", "e", Arc::new(TemplateSelector::default()));
        let case = result(json!({"objecttype": "Case"}));
        let video = result(json!({"filetype": "YouTubeVideo", "objecttype": "Case"}));
        let other = result(json!({"objecttype": "KnowledgeArticle"}));

        assert_eq!(component.select_template(&case).unwrap().name, "case");
        assert_eq!(component.select_template(&video).unwrap().name, "youtube");
        assert_eq!(component.select_template(&other).unwrap().name, "community");
    }

    #[test]
    fn test_dispatch_before_initialization_is_dropped() {
        let component = SearchComponent::new("results", "e", Arc::new(TemplateSelector::default()));
        assert!(!component.is_initialized());
        assert!(!component.dispatch(Action::Log(AnalyticsEvent::InterfaceLoad)));
    }

    #[tokio::test]
    async fn test_register_receives_session() {
        let registry = SessionRegistry::new();
        let component = SearchComponent::new("results", "e", Arc::new(TemplateSelector::default()));
        component.register(&registry);
        component.register(&registry);

        let boot = Bootstrapper::new(
            registry.clone(),
            ConfigResolver::new(Arc::new(InlineConfigSource::new(Some(
                r#"{"organizationId": "o", "accessToken": "t"}"#.to_string(),
            )))),
            Arc::new(LocalEngineFactory::new(Arc::new(StaticTransport::empty()))),
        );
        boot.bootstrap(BootstrapRequest {
            engine_id: "e".to_string(),
            options: SearchOptions::default(),
            first_dispatch: Vec::new(),
        })
        .await;

        assert!(component.is_initialized());
        assert_eq!(component.session().unwrap().engine_id(), "e");
        assert!(component.dispatch(Action::Log(AnalyticsEvent::InterfaceLoad)));
    }
}
