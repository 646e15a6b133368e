// ── Central reactive data store ──
//
// Holds the current Topology behind a `watch` channel. Readers grab an
// `Arc<Topology>` snapshot without locking. Writers take turns: each
// applies its mutation to a private copy and publishes it in one step,
// so nobody ever observes a half-applied change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::feed::FeedSummary;
use super::{DiagramSnapshot, Topology};
use crate::config::TopologyRules;
use crate::error::Rejection;
use crate::model::{Connection, Controller, Endpoint, EntityId, WireColor};
use crate::stream::TopologyStream;

/// Central reactive store for the diagram.
pub struct DataStore {
    pub(crate) topology: watch::Sender<Arc<Topology>>,
    pub(crate) last_load: watch::Sender<Option<DateTime<Utc>>>,
    pub(crate) last_feed_update: watch::Sender<Option<DateTime<Utc>>>,
    writes: Mutex<()>,
}

impl DataStore {
    pub fn new(rules: TopologyRules) -> Self {
        let (topology, _) = watch::channel(Arc::new(Topology::new(rules)));
        let (last_load, _) = watch::channel(None);
        let (last_feed_update, _) = watch::channel(None);

        Self {
            topology,
            last_load,
            last_feed_update,
            writes: Mutex::new(()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current topology.
    pub fn snapshot(&self) -> Arc<Topology> {
        self.topology.borrow().clone()
    }

    /// Subscribe to every published revision.
    pub fn subscribe(&self) -> TopologyStream {
        TopologyStream::new(self.topology.subscribe())
    }

    pub fn rules(&self) -> TopologyRules {
        self.topology.borrow().rules.clone()
    }

    /// The current state in wire format.
    pub fn to_snapshot(&self) -> DiagramSnapshot {
        self.snapshot().to_snapshot()
    }

    pub fn last_load(&self) -> Option<DateTime<Utc>> {
        *self.last_load.borrow()
    }

    pub fn last_feed_update(&self) -> Option<DateTime<Utc>> {
        *self.last_feed_update.borrow()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Apply `f` to a copy of the topology and publish the copy if `f`
    /// succeeds. On error nothing is published.
    pub fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Topology) -> Result<T, Rejection>,
    ) -> Result<T, Rejection> {
        let _guard = self.write_guard();
        let mut next = Topology::clone(&self.topology.borrow());
        let value = f(&mut next)?;
        self.topology.send_replace(Arc::new(next));
        Ok(value)
    }

    /// Serializes writers. A panicked writer never published, so the
    /// lock stays usable after poisoning.
    fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole topology with a validated snapshot.
    ///
    /// A malformed snapshot leaves the current state untouched.
    pub fn load_snapshot(&self, snapshot: DiagramSnapshot) -> Result<(), Rejection> {
        let topo = Topology::from_snapshot(snapshot, self.rules())?;
        let _guard = self.write_guard();
        self.topology.send_replace(Arc::new(topo));
        self.last_load.send_replace(Some(Utc::now()));
        Ok(())
    }

    /// Parse and load a snapshot document.
    pub fn load_json(&self, raw: &str) -> Result<(), Rejection> {
        self.load_snapshot(DiagramSnapshot::from_json(raw)?)
    }

    /// Drop everything, keeping the rules.
    pub fn clear(&self) {
        let rules = self.rules();
        let _guard = self.write_guard();
        self.topology.send_replace(Arc::new(Topology::new(rules)));
    }

    /// Replace the controllers with a feed snapshot.
    pub fn apply_controller_feed(
        &self,
        controllers: Vec<Controller>,
    ) -> Result<FeedSummary, Rejection> {
        let summary = self.mutate(|t| t.apply_controller_feed(controllers))?;
        self.last_feed_update.send_replace(Some(Utc::now()));
        Ok(summary)
    }

    // ── Convenience wrappers ─────────────────────────────────────────

    pub fn connect(
        &self,
        from: Endpoint,
        to: Endpoint,
        wire_color: WireColor,
    ) -> Result<Connection, Rejection> {
        self.mutate(|t| t.connect(from, to, wire_color))
    }

    pub fn disconnect(&self, id: &EntityId) -> Result<Connection, Rejection> {
        self.mutate(|t| t.disconnect(id))
    }

    pub fn rename(&self, id: &EntityId, name: impl Into<String>) -> Result<(), Rejection> {
        self.mutate(|t| t.rename(id, name))
    }

    pub fn set_port_capacity(
        &self,
        id: &EntityId,
        index: usize,
        new_max: i64,
    ) -> Result<(), Rejection> {
        self.mutate(|t| t.set_port_capacity(id, index, new_max))
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(TopologyRules::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Handle;
    use crate::test_support::sample_topology;

    fn store() -> DataStore {
        let topo = sample_topology();
        let store = DataStore::new(topo.rules.clone());
        store.load_snapshot(topo.to_snapshot()).unwrap();
        store
    }

    #[test]
    fn rejected_mutation_publishes_nothing() {
        let store = store();
        let rx = store.topology.subscribe();
        let before = store.snapshot();

        let err = store.set_port_capacity(&"c1".into(), 0, -1).unwrap_err();
        assert_eq!(err, Rejection::InvalidCapacity { value: -1 });
        assert!(!rx.has_changed().unwrap());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn concurrent_writers_all_land() {
        let store = store();
        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    store
                        .mutate(|t| Ok(t.add_differential(format!("DB-{i}"))))
                        .unwrap()
                });
            }
        });
        assert_eq!(store.snapshot().differentials().count(), 9);
    }

    #[test]
    fn successful_mutation_publishes_new_revision() {
        let store = store();
        let mut rx = store.topology.subscribe();
        store
            .connect(
                Endpoint::new("dp2", Handle::DiffPortOutput),
                Endpoint::new("rx2", Handle::ReceiverInput),
                WireColor::Black,
            )
            .unwrap();
        assert!(rx.has_changed().unwrap());
        let topo = rx.borrow_and_update().clone();
        assert_eq!(topo.hierarchy().receivers_of(&"dp2".into()).len(), 1);
    }

    #[test]
    fn malformed_load_keeps_prior_state() {
        let store = store();
        let before = store.snapshot();
        assert!(store.load_json("{\"differentials\": 5}").is_err());
        assert_eq!(*store.snapshot(), *before);
    }

    #[test]
    fn empty_document_loads_as_empty() {
        let store = store();
        store.load_json("{}").unwrap();
        assert!(store.snapshot().is_empty());
        assert!(store.last_load().is_some());
    }

    #[test]
    fn feed_updates_are_stamped() {
        let store = store();
        assert!(store.last_feed_update().is_none());
        store.apply_controller_feed(Vec::new()).unwrap();
        assert!(store.last_feed_update().is_some());
        assert_eq!(store.snapshot().controllers().count(), 0);
    }
}
