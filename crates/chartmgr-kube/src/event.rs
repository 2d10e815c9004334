//! Change events delivered to the reconciler
//!
//! The kube watcher reports applies and deletes without the previous version
//! of an object. [`ChangeTracker`] remembers the last version seen for each
//! identity and turns the watcher stream into [`Event`]s the way an informer
//! would, including synthetic deletes for objects that disappeared while the
//! watch was being re-listed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chartmgr_core::{ChartManager, ResourceId};
use kube::runtime::watcher;

/// A change to one ChartManager
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// First sighting of the object
    Added(Arc<ChartManager>),
    /// The object changed from `old` to `new`
    Updated(Arc<ChartManager>, Arc<ChartManager>),
    /// The object is gone; carries its last known state
    Deleted(Arc<ChartManager>),
}

impl Event {
    /// Identity of the affected resource
    pub fn id(&self) -> ResourceId {
        match self {
            Event::Added(resource) | Event::Deleted(resource) => resource.id(),
            Event::Updated(_, new) => new.id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::Added(_) => "added",
            Event::Updated(..) => "updated",
            Event::Deleted(_) => "deleted",
        }
    }
}

/// Converts watcher events into [`Event`]s
#[derive(Debug, Default)]
pub struct ChangeTracker {
    /// Last seen version of every live object
    known: HashMap<ResourceId, Arc<ChartManager>>,
    /// Identities seen since the current re-list started
    relisting: Option<HashSet<ResourceId>>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Feed one watcher event, returning the resulting change events
    pub fn observe(&mut self, event: watcher::Event<ChartManager>) -> Vec<Event> {
        match event {
            watcher::Event::Apply(resource) => vec![self.apply(resource)],
            watcher::Event::Delete(resource) => {
                let id = resource.id();
                let last = self.known.remove(&id).unwrap_or_else(|| Arc::new(resource));
                vec![Event::Deleted(last)]
            }
            watcher::Event::Init => {
                self.relisting = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(resource) => {
                if let Some(seen) = self.relisting.as_mut() {
                    seen.insert(resource.id());
                }
                vec![self.apply(resource)]
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisting.take() else {
                    return Vec::new();
                };
                let mut gone: Vec<ResourceId> = self
                    .known
                    .keys()
                    .filter(|id| !seen.contains(*id))
                    .cloned()
                    .collect();
                gone.sort();
                gone.into_iter()
                    .filter_map(|id| self.known.remove(&id))
                    .map(Event::Deleted)
                    .collect()
            }
        }
    }

    fn apply(&mut self, resource: ChartManager) -> Event {
        let new = Arc::new(resource);
        match self.known.insert(new.id(), Arc::clone(&new)) {
            Some(old) => Event::Updated(old, new),
            None => Event::Added(new),
        }
    }
}
