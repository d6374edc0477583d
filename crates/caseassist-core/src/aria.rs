//! Forwarding of accessibility announcements to the live-region child.
//!
//! The bridge binds on the first attach notification and stays bound for
//! the lifetime of the controller. It holds the region weakly: when no
//! region is attached, events are dropped without error.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

/// An accessibility live region.
pub trait LiveRegion: Send + Sync {
    /// Declare a named region and its assertiveness.
    fn register_region(&self, region_name: &str, assertive: bool);

    /// Announce `message` in the named region.
    fn update_message(&self, region_name: &str, message: &str, assertive: bool);
}

/// Last known state of one region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionState {
    pub assertive: bool,
    pub message: String,
}

/// In-memory [`LiveRegion`] recording region state.
#[derive(Debug, Default)]
pub struct AriaLiveRegion {
    regions: Mutex<BTreeMap<String, RegionState>>,
}

impl AriaLiveRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region(&self, name: &str) -> Option<RegionState> {
        self.regions.lock().ok().and_then(|r| r.get(name).cloned())
    }

    pub fn regions(&self) -> BTreeMap<String, RegionState> {
        self.regions.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl LiveRegion for AriaLiveRegion {
    fn register_region(&self, region_name: &str, assertive: bool) {
        if let Ok(mut regions) = self.regions.lock() {
            regions.entry(region_name.to_string()).or_default().assertive = assertive;
        }
    }

    fn update_message(&self, region_name: &str, message: &str, assertive: bool) {
        if let Ok(mut regions) = self.regions.lock() {
            let region = regions.entry(region_name.to_string()).or_default();
            region.assertive = assertive;
            region.message = message.to_string();
        }
    }
}

/// Whether the bridge has bound its listeners, and to which region.
#[derive(Default)]
enum Binding {
    #[default]
    Unbound,
    /// Listeners are bound; the region is `None` while detached.
    Bound(Option<Weak<dyn LiveRegion>>),
}

/// Routes announce/register events to the attached live region.
#[derive(Default)]
pub struct AriaLiveEventBridge {
    binding: Binding,
}

impl AriaLiveEventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether listeners have been bound.
    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound(_))
    }

    /// A live region mounted. Binds the listeners the first time.
    pub fn region_attached(&mut self, region: &Arc<dyn LiveRegion>) {
        if let Binding::Unbound = self.binding {
            debug!("Aria live listeners bound");
        }
        self.binding = Binding::Bound(Some(Arc::downgrade(region)));
    }

    /// The live region unmounted. Listeners stay bound.
    pub fn region_detached(&mut self) {
        if let Binding::Bound(region) = &mut self.binding {
            *region = None;
        }
    }

    fn current(&self) -> Option<Arc<dyn LiveRegion>> {
        match &self.binding {
            Binding::Bound(Some(region)) => region.upgrade(),
            _ => None,
        }
    }

    /// Forward an announcement. Returns false if it was dropped.
    pub fn announce(&self, region_name: &str, message: &str, assertive: bool) -> bool {
        match self.current() {
            Some(region) => {
                region.update_message(region_name, message, assertive);
                true
            }
            None => {
                debug!(region = %region_name, "No live region attached; message dropped");
                false
            }
        }
    }

    /// Forward a region registration. Returns false if it was dropped.
    pub fn register(&self, region_name: &str, assertive: bool) -> bool {
        match self.current() {
            Some(region) => {
                region.register_region(region_name, assertive);
                true
            }
            None => {
                debug!(region = %region_name, "No live region attached; registration dropped");
                false
            }
        }
    }
}
