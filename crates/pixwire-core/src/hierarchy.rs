// ── Hierarchy resolver ──
//
// Answers parent/child questions over a Topology. Structural links
// (board owns ports, port owns models) and wire links (controller feeds
// board, port lane feeds receiver) are merged into one upstream
// relation, which is also what cycle detection walks.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::model::{Controller, EntityId, Handle, Receiver};
use crate::store::{EntityRef, Topology};

/// Read-only view for hierarchy queries.
#[derive(Debug, Clone, Copy)]
pub struct Hierarchy<'a> {
    topo: &'a Topology,
}

impl Topology {
    pub fn hierarchy(&self) -> Hierarchy<'_> {
        Hierarchy { topo: self }
    }
}

impl<'a> Hierarchy<'a> {
    /// Ids wired to a DifferentialPort's lanes, in wiring order.
    ///
    /// Includes ids whose receiver no longer exists.
    pub fn receiver_ids_of(&self, port_id: &EntityId) -> Vec<&'a EntityId> {
        self.topo
            .connections
            .values()
            .filter(|c| {
                &c.source == port_id
                    && c.source_handle == Handle::DiffPortOutput
                    && c.target_handle == Handle::ReceiverInput
            })
            .map(|c| &c.target)
            .collect()
    }

    /// Receivers fed by a DifferentialPort. Dangling ids are skipped.
    pub fn receivers_of(&self, port_id: &EntityId) -> Vec<&'a Receiver> {
        self.receiver_ids_of(port_id)
            .into_iter()
            .filter_map(|id| {
                let found = self.topo.receivers.get(id);
                if found.is_none() {
                    debug!(port = %port_id, receiver = %id, "skipping dangling receiver");
                }
                found
            })
            .collect()
    }

    /// The immediate parent of an entity.
    ///
    /// Controllers have no parent. Boards, receivers and models whose
    /// feeding wire or port is missing have no parent either.
    pub fn parent_of(&self, id: &EntityId) -> Option<EntityRef<'a>> {
        let topo = self.topo;
        match topo.find(id)? {
            EntityRef::Controller(_) => None,
            EntityRef::DifferentialPort(dp) => topo.find(&dp.differential_id),
            EntityRef::Differential(board) => topo
                .connections
                .values()
                .find(|c| c.target == board.id && c.target_handle == Handle::BoardInput)
                .and_then(|c| topo.find(&c.source)),
            EntityRef::Receiver(rx) => topo
                .connections
                .values()
                .find(|c| c.target == rx.id && c.target_handle == Handle::ReceiverInput)
                .and_then(|c| topo.find(&c.source)),
            EntityRef::Model(model) => self.owner_of_port(&model.port_id),
        }
    }

    /// The immediate children of an entity, in stable order.
    ///
    /// `None` when `id` names no entity.
    pub fn children_of(&self, id: &EntityId) -> Option<Vec<&'a EntityId>> {
        let topo = self.topo;
        let children = match topo.find(id)? {
            EntityRef::Controller(ctrl) => topo
                .connections
                .values()
                .filter(|c| c.source == ctrl.id && c.source_handle == Handle::ControllerOutput)
                .filter_map(|c| topo.differentials.get(&c.target))
                .map(|d| &d.id)
                .collect(),
            EntityRef::Differential(board) => {
                let mut ports: Vec<_> = board
                    .ports
                    .iter()
                    .filter_map(|p| topo.differential_ports.get(p))
                    .collect();
                ports.sort_by_key(|dp| dp.port_number);
                ports.into_iter().map(|dp| &dp.id).collect()
            }
            EntityRef::DifferentialPort(dp) => self
                .receivers_of(&dp.id)
                .into_iter()
                .map(|rx| &rx.id)
                .collect(),
            EntityRef::Receiver(rx) => rx
                .ports
                .iter()
                .flat_map(|port| topo.models.values().filter(move |m| m.port_id == port.id))
                .map(|m| &m.id)
                .collect(),
            EntityRef::Model(_) => Vec::new(),
        };
        Some(children)
    }

    /// The Controller or Receiver that owns a port.
    pub fn owner_of_port(&self, port_id: &EntityId) -> Option<EntityRef<'a>> {
        let owner = self.topo.locate_port(port_id)?;
        self.topo.find(owner.owner)
    }

    /// The controller at the top of an entity's chain, if it is wired up.
    pub fn root_controller_of(&self, id: &EntityId) -> Option<&'a Controller> {
        let mut seen = HashSet::new();
        let mut current = self.topo.find(id)?;
        loop {
            if let EntityRef::Controller(ctrl) = current {
                return Some(ctrl);
            }
            if !seen.insert(current.id()) {
                return None;
            }
            current = self.parent_of(current.id())?;
        }
    }

    /// Everything directly upstream of `id`: the sources of its incoming
    /// wires plus its structural owner.
    pub fn upstream_of(&self, id: &EntityId) -> Vec<&'a EntityId> {
        let topo = self.topo;
        let mut up: Vec<&'a EntityId> = topo
            .connections
            .values()
            .filter(|c| &c.target == id)
            .map(|c| &c.source)
            .collect();
        if let Some(dp) = topo.differential_ports.get(id) {
            up.push(&dp.differential_id);
        }
        if let Some(model) = topo.models.get(id) {
            if let Some(owner) = topo.locate_port(&model.port_id) {
                up.push(owner.owner);
            }
        }
        up
    }

    /// Every id reachable by walking upstream from `id`.
    pub fn ancestors_of(&self, id: &EntityId) -> HashSet<&'a EntityId> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&'a EntityId> = self.upstream_of(id).into();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(self.upstream_of(next));
            }
        }
        seen
    }

    /// Whether adding a link `from -> to` would close a loop.
    pub fn would_create_cycle(&self, from: &EntityId, to: &EntityId) -> bool {
        from == to || self.ancestors_of(from).contains(to)
    }

    /// An id that sits on a cycle, if the graph has one.
    pub fn find_cycle(&self) -> Option<EntityId> {
        let topo = self.topo;
        let mut edges: Vec<(&EntityId, &EntityId)> = topo
            .connections
            .values()
            .map(|c| (&c.source, &c.target))
            .collect();
        edges.extend(
            topo.differential_ports
                .values()
                .map(|dp| (&dp.differential_id, &dp.id)),
        );
        edges.extend(topo.models.values().filter_map(|m| {
            topo.locate_port(&m.port_id).map(|owner| (owner.owner, &m.id))
        }));

        // Kahn's algorithm: whatever never reaches in-degree zero is on
        // (or downstream of) a cycle.
        let mut in_degree: HashMap<&EntityId, usize> = HashMap::new();
        let mut out: HashMap<&EntityId, Vec<&EntityId>> = HashMap::new();
        for (from, to) in &edges {
            in_degree.entry(from).or_default();
            *in_degree.entry(to).or_default() += 1;
            out.entry(from).or_default().push(to);
        }
        let mut ready: VecDeque<&EntityId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        while let Some(id) = ready.pop_front() {
            for next in out.get(id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }
        in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(id, _)| id)
            .min()
            .cloned()
    }
}
