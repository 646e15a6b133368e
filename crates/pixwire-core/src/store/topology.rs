// ── Topology value ──
//
// The complete diagram state as one plain value: keyed entity maps plus
// the edge list. The DataStore publishes immutable `Arc<Topology>`
// snapshots; every mutation works on a private clone and is published
// only when it succeeds.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::config::TopologyRules;
use crate::error::Rejection;
use crate::model::{
    Connection, Controller, Differential, DifferentialPort, Endpoint, EntityId, EntityKind,
    Model, Port, Receiver,
};

// ── Entity wrappers ──────────────────────────────────────────────────

/// An owned entity of any kind, used for upserts and removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Controller(Controller),
    Differential(Differential),
    DifferentialPort(DifferentialPort),
    Receiver(Receiver),
    Model(Model),
}

impl Entity {
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Controller(e) => &e.id,
            Self::Differential(e) => &e.id,
            Self::DifferentialPort(e) => &e.id,
            Self::Receiver(e) => &e.id,
            Self::Model(e) => &e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Controller(_) => EntityKind::Controller,
            Self::Differential(_) => EntityKind::Differential,
            Self::DifferentialPort(_) => EntityKind::DifferentialPort,
            Self::Receiver(_) => EntityKind::Receiver,
            Self::Model(_) => EntityKind::Model,
        }
    }

    fn ports(&self) -> &[Port] {
        match self {
            Self::Controller(c) => &c.ports,
            Self::Receiver(r) => &r.ports,
            _ => &[],
        }
    }
}

impl From<Controller> for Entity {
    fn from(e: Controller) -> Self {
        Self::Controller(e)
    }
}

impl From<Differential> for Entity {
    fn from(e: Differential) -> Self {
        Self::Differential(e)
    }
}

impl From<DifferentialPort> for Entity {
    fn from(e: DifferentialPort) -> Self {
        Self::DifferentialPort(e)
    }
}

impl From<Receiver> for Entity {
    fn from(e: Receiver) -> Self {
        Self::Receiver(e)
    }
}

impl From<Model> for Entity {
    fn from(e: Model) -> Self {
        Self::Model(e)
    }
}

/// A borrowed entity of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    Controller(&'a Controller),
    Differential(&'a Differential),
    DifferentialPort(&'a DifferentialPort),
    Receiver(&'a Receiver),
    Model(&'a Model),
}

impl<'a> EntityRef<'a> {
    pub fn id(&self) -> &'a EntityId {
        match self {
            Self::Controller(e) => &e.id,
            Self::Differential(e) => &e.id,
            Self::DifferentialPort(e) => &e.id,
            Self::Receiver(e) => &e.id,
            Self::Model(e) => &e.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            Self::Controller(e) => &e.name,
            Self::Differential(e) => &e.name,
            Self::DifferentialPort(e) => &e.name,
            Self::Receiver(e) => &e.name,
            Self::Model(e) => &e.name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Controller(_) => EntityKind::Controller,
            Self::Differential(_) => EntityKind::Differential,
            Self::DifferentialPort(_) => EntityKind::DifferentialPort,
            Self::Receiver(_) => EntityKind::Receiver,
            Self::Model(_) => EntityKind::Model,
        }
    }
}

/// A Controller or Receiver port together with its owner.
#[derive(Debug, Clone, Copy)]
pub struct PortOwner<'a> {
    pub kind: EntityKind,
    pub owner: &'a EntityId,
    pub index: usize,
    pub port: &'a Port,
}

/// What an id is currently used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdUse<'a> {
    Entity(EntityKind),
    Port { kind: EntityKind, owner: &'a EntityId },
    Connection,
}

// ── Topology ─────────────────────────────────────────────────────────

/// The full lighting network: entities, wires and passthrough layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    pub(crate) controllers: IndexMap<EntityId, Controller>,
    pub(crate) differentials: IndexMap<EntityId, Differential>,
    pub(crate) differential_ports: IndexMap<EntityId, DifferentialPort>,
    pub(crate) receivers: IndexMap<EntityId, Receiver>,
    pub(crate) models: IndexMap<EntityId, Model>,
    pub(crate) connections: IndexMap<EntityId, Connection>,
    pub(crate) rules: TopologyRules,
    /// Top-level snapshot keys this crate does not own (layout, viewport).
    pub(crate) extra: Map<String, Value>,
}

impl Topology {
    pub fn new(rules: TopologyRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    pub fn rules(&self) -> &TopologyRules {
        &self.rules
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
            && self.differentials.is_empty()
            && self.differential_ports.is_empty()
            && self.receivers.is_empty()
            && self.models.is_empty()
            && self.connections.is_empty()
    }

    // ── Collections ──────────────────────────────────────────────────

    pub fn controllers(&self) -> impl Iterator<Item = &Controller> {
        self.controllers.values()
    }

    pub fn differentials(&self) -> impl Iterator<Item = &Differential> {
        self.differentials.values()
    }

    pub fn differential_ports(&self) -> impl Iterator<Item = &DifferentialPort> {
        self.differential_ports.values()
    }

    pub fn receivers(&self) -> impl Iterator<Item = &Receiver> {
        self.receivers.values()
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    // ── Single-entity lookups ────────────────────────────────────────

    pub fn controller(&self, id: &EntityId) -> Option<&Controller> {
        self.controllers.get(id)
    }

    pub fn differential(&self, id: &EntityId) -> Option<&Differential> {
        self.differentials.get(id)
    }

    pub fn differential_port(&self, id: &EntityId) -> Option<&DifferentialPort> {
        self.differential_ports.get(id)
    }

    pub fn receiver(&self, id: &EntityId) -> Option<&Receiver> {
        self.receivers.get(id)
    }

    pub fn model(&self, id: &EntityId) -> Option<&Model> {
        self.models.get(id)
    }

    pub fn connection(&self, id: &EntityId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Look up an entity of a specific kind.
    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<EntityRef<'_>> {
        match kind {
            EntityKind::Controller => self.controllers.get(id).map(EntityRef::Controller),
            EntityKind::Differential => self.differentials.get(id).map(EntityRef::Differential),
            EntityKind::DifferentialPort => self
                .differential_ports
                .get(id)
                .map(EntityRef::DifferentialPort),
            EntityKind::Receiver => self.receivers.get(id).map(EntityRef::Receiver),
            EntityKind::Model => self.models.get(id).map(EntityRef::Model),
        }
    }

    /// Look up an entity of any kind. Ids are unique across kinds.
    pub fn find(&self, id: &EntityId) -> Option<EntityRef<'_>> {
        [
            EntityKind::Controller,
            EntityKind::Differential,
            EntityKind::DifferentialPort,
            EntityKind::Receiver,
            EntityKind::Model,
        ]
        .into_iter()
        .find_map(|kind| self.get(kind, id))
    }

    /// Find a Controller or Receiver port by its id.
    pub fn locate_port(&self, port_id: &EntityId) -> Option<PortOwner<'_>> {
        let on_controllers = self.controllers.values().map(|c| (EntityKind::Controller, &c.id, &c.ports));
        let on_receivers = self.receivers.values().map(|r| (EntityKind::Receiver, &r.id, &r.ports));
        on_controllers.chain(on_receivers).find_map(|(kind, owner, ports)| {
            ports
                .iter()
                .enumerate()
                .find(|(_, p)| &p.id == port_id)
                .map(|(index, port)| PortOwner {
                    kind,
                    owner,
                    index,
                    port,
                })
        })
    }

    pub fn port(&self, port_id: &EntityId) -> Option<&Port> {
        self.locate_port(port_id).map(|p| p.port)
    }

    pub(crate) fn id_use(&self, id: &EntityId) -> Option<IdUse<'_>> {
        if let Some(entity) = self.find(id) {
            return Some(IdUse::Entity(entity.kind()));
        }
        if let Some(owner) = self.locate_port(id) {
            return Some(IdUse::Port {
                kind: owner.kind,
                owner: owner.owner,
            });
        }
        self.connections.contains_key(id).then_some(IdUse::Connection)
    }

    /// Whether `id` names any entity, port or connection.
    pub fn id_in_use(&self, id: &EntityId) -> bool {
        self.id_use(id).is_some()
    }

    // ── Raw mutation ─────────────────────────────────────────────────

    /// Insert or replace an entity by id.
    ///
    /// Returns `true` when the entity is new. Fails if the entity's id,
    /// or one of its port ids, already belongs to something else.
    pub fn upsert(&mut self, entity: impl Into<Entity>) -> Result<bool, Rejection> {
        let entity = entity.into();
        let kind = entity.kind();
        let id = entity.id().clone();

        let mut claimed = HashSet::new();
        let claims = std::iter::once(&id).chain(entity.ports().iter().map(|p| &p.id));
        for claim in claims {
            if !claimed.insert(claim) {
                return Err(Rejection::DuplicateId { id: claim.clone() });
            }
            let reusable = match self.id_use(claim) {
                None => true,
                Some(IdUse::Entity(k)) => k == kind && claim == &id,
                Some(IdUse::Port { kind: k, owner }) => k == kind && owner == &id,
                Some(IdUse::Connection) => false,
            };
            if !reusable {
                return Err(Rejection::DuplicateId { id: claim.clone() });
            }
        }

        let is_new = match entity {
            Entity::Controller(e) => self.controllers.insert(id, e).is_none(),
            Entity::Differential(e) => self.differentials.insert(id, e).is_none(),
            Entity::DifferentialPort(e) => self.differential_ports.insert(id, e).is_none(),
            Entity::Receiver(e) => self.receivers.insert(id, e).is_none(),
            Entity::Model(e) => self.models.insert(id, e).is_none(),
        };
        self.recompute_demand();
        Ok(is_new)
    }

    /// Remove an entity without touching wires or dependents.
    ///
    /// See [`Topology::delete`] for the cascading variant.
    pub fn remove(&mut self, kind: EntityKind, id: &EntityId) -> Option<Entity> {
        let removed = match kind {
            EntityKind::Controller => self.controllers.shift_remove(id).map(Entity::from),
            EntityKind::Differential => self.differentials.shift_remove(id).map(Entity::from),
            EntityKind::DifferentialPort => {
                self.differential_ports.shift_remove(id).map(Entity::from)
            }
            EntityKind::Receiver => self.receivers.shift_remove(id).map(Entity::from),
            EntityKind::Model => self.models.shift_remove(id).map(Entity::from),
        };
        if removed.is_some() {
            self.recompute_demand();
        }
        removed
    }

    // ── Edges ────────────────────────────────────────────────────────

    /// The wire ending at `to`, if any. Targets accept at most one.
    pub fn incoming(&self, to: &Endpoint) -> Option<&Connection> {
        self.connections
            .values()
            .find(|c| c.target == to.entity && c.target_handle == to.handle)
    }

    /// All wires leaving `from`.
    pub fn outgoing<'a>(&'a self, from: &'a Endpoint) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .values()
            .filter(move |c| c.source == from.entity && c.source_handle == from.handle)
    }

    /// All wires with either end on `id`.
    pub fn connections_touching<'a>(
        &'a self,
        id: &'a EntityId,
    ) -> impl Iterator<Item = &'a Connection> {
        self.connections.values().filter(move |c| c.touches(id))
    }

    /// Drop every wire matching `pred`, returning how many went.
    pub(crate) fn remove_connections_where(
        &mut self,
        mut pred: impl FnMut(&Connection) -> bool,
    ) -> usize {
        let before = self.connections.len();
        self.connections.retain(|_, c| !pred(c));
        before - self.connections.len()
    }

    // ── Derived demand ───────────────────────────────────────────────

    /// Recompute `current_pixels` on every Controller and Receiver port
    /// from the models assigned to it.
    pub(crate) fn recompute_demand(&mut self) {
        let mut demand: HashMap<&EntityId, u32> = HashMap::new();
        for model in self.models.values() {
            let slot = demand.entry(&model.port_id).or_default();
            *slot = slot.saturating_add(model.pixels);
        }

        let ports = self
            .controllers
            .values_mut()
            .flat_map(|c| c.ports.iter_mut())
            .chain(self.receivers.values_mut().flat_map(|r| r.ports.iter_mut()));
        for port in ports {
            port.current_pixels = demand.get(&port.id).copied().unwrap_or(0);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ControllerType;
    use pretty_assertions::assert_eq;

    fn controller(id: &str, ports: &[(&str, u32)]) -> Controller {
        Controller {
            id: id.into(),
            name: id.to_uppercase(),
            controller_type: ControllerType::Falcon,
            ports: ports
                .iter()
                .map(|(pid, max)| Port::new(*pid, *pid, *max))
                .collect(),
        }
    }

    fn model(id: &str, pixels: u32, port: &str) -> Model {
        Model {
            id: id.into(),
            name: id.into(),
            pixels,
            port_id: port.into(),
        }
    }

    #[test]
    fn upsert_then_get() {
        let mut topo = Topology::default();
        assert!(topo.upsert(controller("c1", &[("p1", 100)])).unwrap());
        assert!(!topo.upsert(controller("c1", &[("p1", 200)])).unwrap());

        let got = topo.get(EntityKind::Controller, &"c1".into()).unwrap();
        assert_eq!(got.name(), "C1");
        assert_eq!(topo.port(&"p1".into()).unwrap().max_pixels, 200);
        assert!(topo.get(EntityKind::Receiver, &"c1".into()).is_none());
    }

    #[test]
    fn ids_are_unique_across_kinds_and_ports() {
        let mut topo = Topology::default();
        topo.upsert(controller("c1", &[("p1", 100)])).unwrap();

        let clash = Receiver {
            id: "c1".into(),
            name: "dup".into(),
            ports: vec![],
        };
        assert_eq!(
            topo.upsert(clash).unwrap_err(),
            Rejection::DuplicateId { id: "c1".into() }
        );

        let port_clash = Receiver {
            id: "r1".into(),
            name: "rx".into(),
            ports: vec![Port::new("p1", "P1", 10)],
        };
        assert_eq!(
            topo.upsert(port_clash).unwrap_err(),
            Rejection::DuplicateId { id: "p1".into() }
        );
        assert!(topo.receiver(&"r1".into()).is_none());
    }

    #[test]
    fn demand_tracks_models() {
        let mut topo = Topology::default();
        topo.upsert(controller("c1", &[("p1", 100), ("p2", 100)])).unwrap();
        topo.upsert(model("m1", 30, "p1")).unwrap();
        topo.upsert(model("m2", 12, "p1")).unwrap();
        topo.upsert(model("m3", 50, "gone")).unwrap();

        assert_eq!(topo.port(&"p1".into()).unwrap().current_pixels, 42);
        assert_eq!(topo.port(&"p2".into()).unwrap().current_pixels, 0);

        topo.remove(EntityKind::Model, &"m2".into()).unwrap();
        assert_eq!(topo.port(&"p1".into()).unwrap().current_pixels, 30);
    }

    #[test]
    fn locate_port_reports_owner() {
        let mut topo = Topology::default();
        topo.upsert(controller("c1", &[("p1", 100), ("p2", 100)])).unwrap();
        let owner = topo.locate_port(&"p2".into()).unwrap();
        assert_eq!(owner.kind, EntityKind::Controller);
        assert_eq!(owner.owner, &EntityId::from("c1"));
        assert_eq!(owner.index, 1);
    }
}
