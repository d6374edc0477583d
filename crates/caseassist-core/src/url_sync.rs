//! Two-way binding between engine state and the URL fragment.
//!
//! Engine state changes are written to the fragment with a replace (no new
//! history entry). External hash changes, such as back/forward navigation,
//! are fed to [`SearchEngine::synchronize`], the same path used for the
//! initial load. A hash change carrying the state the engine already holds,
//! including one caused by our own write, is skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::engine::{SearchEngine, SearchState, SubscriptionId};

/// Identifies a hash-change listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Callback receiving the new fragment on every external hash change.
pub type HashListener = Arc<dyn Fn(&str) + Send + Sync>;

/// The page location as seen by the synchronizer.
pub trait Location: Send + Sync {
    /// Current fragment, without the leading `#`.
    fn fragment(&self) -> String;

    /// Replace the current history entry's fragment. Does not fire hash
    /// listeners.
    fn replace_fragment(&self, fragment: &str);

    fn add_hash_listener(&self, listener: HashListener) -> ListenerId;

    fn remove_hash_listener(&self, id: ListenerId);
}

#[derive(Default)]
struct History {
    entries: Vec<String>,
    index: usize,
    replaces: usize,
    listeners: Vec<(ListenerId, HashListener)>,
}

/// An in-memory [`Location`] with a navigable history.
pub struct MemoryLocation {
    history: Mutex<History>,
    next_listener: AtomicU64,
}

impl MemoryLocation {
    pub fn new(fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        Self {
            history: Mutex::new(History {
                entries: vec![fragment.to_string()],
                ..History::default()
            }),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Navigate to `fragment` as a new history entry, firing hash listeners.
    pub fn push(&self, fragment: &str) {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment).to_string();
        let listeners = {
            let Ok(mut history) = self.history.lock() else {
                return;
            };
            let next = history.index + 1;
            history.entries.truncate(next);
            history.entries.push(fragment.clone());
            history.index = next;
            history.listeners.iter().map(|(_, l)| Arc::clone(l)).collect::<Vec<_>>()
        };
        for listener in listeners {
            listener(&fragment);
        }
    }

    /// Go back one entry. Returns false at the start of history.
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Go forward one entry. Returns false at the end of history.
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    fn go(&self, delta: isize) -> bool {
        let (fragment, listeners) = {
            let Ok(mut history) = self.history.lock() else {
                return false;
            };
            let Some(target) = history.index.checked_add_signed(delta) else {
                return false;
            };
            if target >= history.entries.len() {
                return false;
            }
            history.index = target;
            let listeners: Vec<HashListener> =
                history.listeners.iter().map(|(_, l)| Arc::clone(l)).collect();
            (history.entries[target].clone(), listeners)
        };
        for listener in listeners {
            listener(&fragment);
        }
        true
    }

    /// Number of history entries.
    pub fn history_len(&self) -> usize {
        self.history.lock().map(|h| h.entries.len()).unwrap_or(0)
    }

    /// Number of replace writes so far.
    pub fn replace_count(&self) -> usize {
        self.history.lock().map(|h| h.replaces).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.history.lock().map(|h| h.listeners.len()).unwrap_or(0)
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("")
    }
}

impl Location for MemoryLocation {
    fn fragment(&self) -> String {
        self.history
            .lock()
            .ok()
            .and_then(|h| h.entries.get(h.index).cloned())
            .unwrap_or_default()
    }

    fn replace_fragment(&self, fragment: &str) {
        if let Ok(mut history) = self.history.lock() {
            let index = history.index;
            history.entries[index] = fragment.to_string();
            history.replaces += 1;
        }
    }

    fn add_hash_listener(&self, listener: HashListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut history) = self.history.lock() {
            history.listeners.push((id, listener));
        }
        id
    }

    fn remove_hash_listener(&self, id: ListenerId) {
        if let Ok(mut history) = self.history.lock() {
            history.listeners.retain(|(l, _)| *l != id);
        }
    }
}

/// Keeps one engine and one location in sync until detached or dropped.
pub struct UrlStateSynchronizer {
    engine: Arc<dyn SearchEngine>,
    location: Arc<dyn Location>,
    subscription: Option<SubscriptionId>,
    hash_listener: Option<ListenerId>,
}

impl UrlStateSynchronizer {
    /// Start synchronizing.
    ///
    /// A non-empty fragment is taken as the engine's state. An empty one
    /// carries no state, so the engine's current state is written out
    /// instead.
    pub fn attach(engine: Arc<dyn SearchEngine>, location: Arc<dyn Location>) -> Self {
        let initial = location.fragment();
        if initial.is_empty() {
            let current = engine.fragment();
            if !current.is_empty() {
                location.replace_fragment(&current);
            }
        } else {
            engine.synchronize(&initial);
        }

        let weak_location = Arc::downgrade(&location);
        let subscription = engine.subscribe(Arc::new(move |state: &SearchState| {
            let Some(location) = weak_location.upgrade() else {
                return;
            };
            let fragment = state.to_fragment();
            if location.fragment() != fragment {
                debug!(fragment = %fragment, "Writing engine state to URL");
                location.replace_fragment(&fragment);
            }
        }));

        let weak_engine = Arc::downgrade(&engine);
        let hash_listener = location.add_hash_listener(Arc::new(move |fragment: &str| {
            let Some(engine) = weak_engine.upgrade() else {
                return;
            };
            if SearchState::from_fragment(fragment) == engine.state() {
                debug!(fragment = %fragment, "Hash change matches engine state; skipped");
                return;
            }
            engine.synchronize(fragment);
        }));

        debug!("URL state synchronizer attached");
        Self {
            engine,
            location,
            subscription: Some(subscription),
            hash_listener: Some(hash_listener),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some() || self.hash_listener.is_some()
    }

    /// Remove both subscriptions. Safe to call more than once.
    pub fn detach(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.engine.unsubscribe(id);
        }
        if let Some(id) = self.hash_listener.take() {
            self.location.remove_hash_listener(id);
            debug!("URL state synchronizer detached");
        }
    }
}

impl Drop for UrlStateSynchronizer {
    fn drop(&mut self) {
        if self.is_attached() {
            warn!("URL state synchronizer dropped while attached; detaching");
            self.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Action, AnalyticsEvent, LocalEngine, StaticTransport};
    use crate::middleware::MiddlewarePipeline;
    use crate::resolver::{Configuration, SearchOptions, parse_configuration};
    use pretty_assertions::assert_eq;

    fn engine() -> Arc<LocalEngine> {
        let configuration = Configuration {
            remote: parse_configuration(r#"{"organizationId": "o", "accessToken": "t"}"#).unwrap(),
            search: SearchOptions::default(),
        };
        Arc::new(LocalEngine::new(
            "url-test",
            configuration,
            MiddlewarePipeline::empty(),
            Arc::new(StaticTransport::empty()),
        ))
    }

    #[test]
    fn test_initial_fragment_restores_state() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::new("#q=rudder&firstResult=10"));
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());

        assert_eq!(engine.state().q, "rudder");
        assert_eq!(engine.state().first_result, 10);
        assert_eq!(engine.executed(), vec![AnalyticsEvent::SearchFromLink]);
        sync.detach();
    }

    #[test]
    fn test_empty_fragment_takes_engine_state() {
        let engine = engine();
        engine.dispatch(Action::UpdateQuery { q: "how to enhance working".into() });
        let location = Arc::new(MemoryLocation::default());
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());

        assert_eq!(location.fragment(), "q=how+to+enhance+working");
        assert_eq!(engine.state().q, "how to enhance working");
        assert!(engine.executed().is_empty());
        sync.detach();
    }

    #[test]
    fn test_engine_change_replaces_fragment() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::default());
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());

        engine.dispatch(Action::UpdateQuery { q: "mast".into() });
        assert_eq!(location.fragment(), "q=mast");
        assert_eq!(location.history_len(), 1);
        assert_eq!(location.replace_count(), 1);
        sync.detach();
    }

    #[test]
    fn test_back_navigation_reenters_engine_once() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::default());
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());

        engine.dispatch(Action::UpdateQuery { q: "a".into() });
        location.push("q=b");
        assert_eq!(engine.state().q, "b");
        // Our own subscriber saw the location already matching
        assert_eq!(location.replace_count(), 1);

        assert!(location.back());
        assert_eq!(engine.state().q, "a");
        assert!(location.forward());
        assert_eq!(engine.state().q, "b");
        assert_eq!(engine.executed().len(), 3);
        sync.detach();
    }

    #[test]
    fn test_hash_change_to_current_state_is_skipped() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::new("q=keel"));
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());
        let before = engine.executed().len();

        location.push("q=keel");
        assert_eq!(engine.executed().len(), before);
        sync.detach();
    }

    #[test]
    fn test_detach_unsubscribes_both() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::default());
        let mut sync = UrlStateSynchronizer::attach(engine.clone(), location.clone());
        assert_eq!(location.listener_count(), 1);

        sync.detach();
        assert!(!sync.is_attached());
        assert_eq!(location.listener_count(), 0);

        engine.dispatch(Action::UpdateQuery { q: "hull".into() });
        assert_eq!(location.fragment(), "");
        location.push("q=other");
        assert_eq!(engine.state().q, "hull");
    }

    #[test]
    fn test_drop_detaches() {
        let engine = engine();
        let location = Arc::new(MemoryLocation::default());
        drop(UrlStateSynchronizer::attach(engine.clone(), location.clone()));
        assert_eq!(location.listener_count(), 0);
    }
}
