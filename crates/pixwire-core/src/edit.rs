// ── Edit transactions ──
//
// Small mutations issued from the UI: renames, capacity edits, model
// edits, entity creation and cascading deletes. Each call validates
// first and leaves the topology untouched on rejection. Demand is
// recomputed whenever a model or port changes.

use serde::Serialize;
use tracing::debug;

use crate::error::Rejection;
use crate::model::{
    Controller, ControllerType, Differential, DifferentialPort, EntityId, EntityKind, Handle,
    Model, Port, Receiver,
};
use crate::store::Topology;

/// What a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub entities: Vec<EntityId>,
    pub connections: Vec<EntityId>,
}

fn pixel_count(value: i64) -> Result<u32, Rejection> {
    u32::try_from(value).map_err(|_| Rejection::InvalidCapacity { value })
}

impl Topology {
    // ── Rename / capacity ────────────────────────────────────────────

    /// Rename any entity, or a Controller/Receiver port by its id.
    pub fn rename(&mut self, id: &EntityId, name: impl Into<String>) -> Result<(), Rejection> {
        let name = name.into();
        let slot = match self.find(id).map(|e| e.kind()) {
            Some(EntityKind::Controller) => self.controllers.get_mut(id).map(|e| &mut e.name),
            Some(EntityKind::Differential) => self.differentials.get_mut(id).map(|e| &mut e.name),
            Some(EntityKind::DifferentialPort) => {
                self.differential_ports.get_mut(id).map(|e| &mut e.name)
            }
            Some(EntityKind::Receiver) => self.receivers.get_mut(id).map(|e| &mut e.name),
            Some(EntityKind::Model) => self.models.get_mut(id).map(|e| &mut e.name),
            None => self.port_mut(id).map(|p| &mut p.name),
        };
        let slot = slot.ok_or_else(|| Rejection::not_found("entity or port", id))?;
        debug!(%id, from = %slot, to = %name, "renamed");
        *slot = name;
        Ok(())
    }

    /// Set the budget of port `index` on a Controller or Receiver, or of
    /// shared slot `index` on a DifferentialPort.
    pub fn set_port_capacity(
        &mut self,
        id: &EntityId,
        index: usize,
        new_max: i64,
    ) -> Result<(), Rejection> {
        let max = pixel_count(new_max)?;
        let slot = match self.find(id).map(|e| e.kind()) {
            Some(EntityKind::Controller) => self
                .controllers
                .get_mut(id)
                .and_then(|c| c.ports.get_mut(index))
                .map(|p| &mut p.max_pixels),
            Some(EntityKind::Receiver) => self
                .receivers
                .get_mut(id)
                .and_then(|r| r.ports.get_mut(index))
                .map(|p| &mut p.max_pixels),
            Some(EntityKind::DifferentialPort) => self
                .differential_ports
                .get_mut(id)
                .and_then(|dp| dp.shared_ports.get_mut(index))
                .map(|s| &mut s.max_pixels),
            _ => None,
        };
        let slot = slot.ok_or_else(|| Rejection::not_found("port", format!("{id}[{index}]")))?;
        *slot = max;
        Ok(())
    }

    fn port_mut(&mut self, port_id: &EntityId) -> Option<&mut Port> {
        self.controllers
            .values_mut()
            .flat_map(|c| c.ports.iter_mut())
            .chain(self.receivers.values_mut().flat_map(|r| r.ports.iter_mut()))
            .find(|p| &p.id == port_id)
    }

    // ── Creation ─────────────────────────────────────────────────────

    fn new_ports(&self, ports: impl IntoIterator<Item = (String, u32)>) -> Vec<Port> {
        let mut out: Vec<Port> = Vec::new();
        for (name, max) in ports {
            let id = loop {
                let id = self.fresh_id();
                if out.iter().all(|p| p.id != id) {
                    break id;
                }
            };
            out.push(Port::new(id, name, max));
        }
        out
    }

    pub fn add_controller(
        &mut self,
        name: impl Into<String>,
        controller_type: ControllerType,
        ports: impl IntoIterator<Item = (String, u32)>,
    ) -> EntityId {
        let id = self.fresh_id();
        let ports = self.new_ports(ports);
        self.controllers.insert(
            id.clone(),
            Controller {
                id: id.clone(),
                name: name.into(),
                controller_type,
                ports,
            },
        );
        id
    }

    /// Create a board with `ports_per_board` ports named "Port N".
    pub fn add_differential(&mut self, name: impl Into<String>) -> EntityId {
        let board_id = self.fresh_id();
        let count = self.rules.ports_per_board.get();
        let mut port_ids = Vec::with_capacity(usize::from(count));
        for number in 1..=count {
            let id = self.fresh_id();
            self.differential_ports.insert(
                id.clone(),
                DifferentialPort {
                    id: id.clone(),
                    differential_id: board_id.clone(),
                    port_number: number,
                    name: format!("Port {number}"),
                    shared_ports: self.rules.shared_port_template.clone(),
                },
            );
            port_ids.push(id);
        }
        self.differentials.insert(
            board_id.clone(),
            Differential {
                id: board_id.clone(),
                name: name.into(),
                ports: port_ids,
            },
        );
        board_id
    }

    pub fn add_receiver(
        &mut self,
        name: impl Into<String>,
        ports: impl IntoIterator<Item = (String, u32)>,
    ) -> EntityId {
        let id = self.fresh_id();
        let ports = self.new_ports(ports);
        self.receivers.insert(
            id.clone(),
            Receiver {
                id: id.clone(),
                name: name.into(),
                ports,
            },
        );
        id
    }

    // ── Models ───────────────────────────────────────────────────────

    /// Create a model drawing `pixels` from an existing port.
    pub fn add_model(
        &mut self,
        name: impl Into<String>,
        pixels: i64,
        port_id: &EntityId,
    ) -> Result<EntityId, Rejection> {
        let pixels = pixel_count(pixels)?;
        if self.port(port_id).is_none() {
            return Err(Rejection::not_found("port", port_id));
        }
        let id = self.fresh_id();
        self.models.insert(
            id.clone(),
            Model {
                id: id.clone(),
                name: name.into(),
                pixels,
                port_id: port_id.clone(),
            },
        );
        self.recompute_demand();
        Ok(id)
    }

    pub fn set_model_pixels(&mut self, id: &EntityId, pixels: i64) -> Result<(), Rejection> {
        let pixels = pixel_count(pixels)?;
        let model = self
            .models
            .get_mut(id)
            .ok_or_else(|| Rejection::not_found("model", id))?;
        model.pixels = pixels;
        self.recompute_demand();
        Ok(())
    }

    /// Move a model to another port. A wire from the old port is dropped
    /// in the same step.
    pub fn reassign_model(&mut self, id: &EntityId, port_id: &EntityId) -> Result<(), Rejection> {
        if self.port(port_id).is_none() {
            return Err(Rejection::not_found("port", port_id));
        }
        let model = self
            .models
            .get_mut(id)
            .ok_or_else(|| Rejection::not_found("model", id))?;
        model.port_id = port_id.clone();

        let dropped = self.remove_connections_where(|c| {
            &c.target == id
                && c.target_handle == Handle::ModelInput
                && !c.leaves_port(port_id)
        });
        if dropped > 0 {
            debug!(model = %id, dropped, "dropped wire from previous port");
        }
        self.recompute_demand();
        Ok(())
    }

    pub fn remove_model(&mut self, id: &EntityId) -> Result<Model, Rejection> {
        let model = self
            .models
            .shift_remove(id)
            .ok_or_else(|| Rejection::not_found("model", id))?;
        self.remove_connections_where(|c| c.touches(id));
        self.recompute_demand();
        Ok(model)
    }

    // ── Cascading delete ─────────────────────────────────────────────

    /// Delete an entity or connection along with everything that
    /// depends on it.
    ///
    /// Controllers and Receivers take the models on their ports with
    /// them; a Differential takes its ports. DifferentialPorts cannot be
    /// deleted on their own.
    pub fn delete(&mut self, id: &EntityId) -> Result<Deleted, Rejection> {
        if self.connections.contains_key(id) {
            self.disconnect(id)?;
            return Ok(Deleted {
                entities: Vec::new(),
                connections: vec![id.clone()],
            });
        }

        let kind = self
            .find(id)
            .map(|e| e.kind())
            .ok_or_else(|| Rejection::not_found("entity", id))?;

        let mut doomed = vec![id.clone()];
        match kind {
            EntityKind::Controller | EntityKind::Receiver => {
                let ports: Vec<EntityId> = match kind {
                    EntityKind::Controller => self.controllers.get(id).map(|c| &c.ports),
                    _ => self.receivers.get(id).map(|r| &r.ports),
                }
                .into_iter()
                .flatten()
                .map(|p| p.id.clone())
                .collect();
                doomed.extend(
                    self.models
                        .values()
                        .filter(|m| ports.contains(&m.port_id))
                        .map(|m| m.id.clone()),
                );
            }
            EntityKind::Differential => {
                if let Some(board) = self.differentials.get(id) {
                    doomed.extend(board.ports.iter().cloned());
                }
            }
            EntityKind::DifferentialPort => {
                if let Some(dp) = self.differential_ports.get(id) {
                    return Err(Rejection::FixedPortCount {
                        port: id.clone(),
                        board: dp.differential_id.clone(),
                    });
                }
            }
            EntityKind::Model => {}
        }

        let connections: Vec<EntityId> = self
            .connections
            .values()
            .filter(|c| doomed.iter().any(|d| c.touches(d)))
            .map(|c| c.id.clone())
            .collect();
        self.connections.retain(|cid, _| !connections.contains(cid));

        for doomed_id in &doomed {
            self.controllers.shift_remove(doomed_id);
            self.differentials.shift_remove(doomed_id);
            self.differential_ports.shift_remove(doomed_id);
            self.receivers.shift_remove(doomed_id);
            self.models.shift_remove(doomed_id);
        }
        self.recompute_demand();
        debug!(%id, entities = doomed.len(), connections = connections.len(), "deleted");

        Ok(Deleted {
            entities: doomed,
            connections,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, WireColor};
    use crate::test_support::sample_topology;
    use pretty_assertions::assert_eq;

    #[test]
    fn widest_board_is_numbered_and_reloads() {
        use std::num::NonZeroU8;

        use crate::config::TopologyRules;

        let rules = TopologyRules {
            ports_per_board: NonZeroU8::MAX,
            ..TopologyRules::default()
        };
        let mut topo = Topology::new(rules.clone());
        let board = topo.add_differential("Wide");

        let ports = &topo.differential(&board).unwrap().ports;
        assert_eq!(ports.len(), 255);
        let last = topo.differential_port(&ports[254]).unwrap();
        assert_eq!(last.port_number, 255);

        let reloaded = Topology::from_snapshot(topo.to_snapshot(), rules).unwrap();
        assert_eq!(reloaded, topo);
    }

    #[test]
    fn rename_entities_and_ports() {
        let mut topo = sample_topology();
        topo.rename(&"dp1".into(), "Roofline").unwrap();
        topo.rename(&"rp2".into(), "Arches").unwrap();
        assert_eq!(topo.differential_port(&"dp1".into()).unwrap().name, "Roofline");
        assert_eq!(topo.port(&"rp2".into()).unwrap().name, "Arches");
        assert!(matches!(
            topo.rename(&"zzz".into(), "x"),
            Err(Rejection::NotFound { .. })
        ));
    }

    #[test]
    fn capacity_rejects_negative_and_bad_index() {
        let mut topo = sample_topology();
        let before = topo.clone();
        assert_eq!(
            topo.set_port_capacity(&"c1".into(), 0, -5),
            Err(Rejection::InvalidCapacity { value: -5 })
        );
        assert!(matches!(
            topo.set_port_capacity(&"c1".into(), 9, 100),
            Err(Rejection::NotFound { what: "port", .. })
        ));
        assert!(matches!(
            topo.set_port_capacity(&"m1".into(), 0, 100),
            Err(Rejection::NotFound { .. })
        ));
        assert_eq!(topo, before);

        topo.set_port_capacity(&"dp1".into(), 1, 170).unwrap();
        let slots = topo
            .capacity()
            .differential_port_utilization(&"dp1".into())
            .unwrap();
        assert_eq!(slots[1].max, 170);
        assert_eq!(slots[1].utilization_pct, 47.1);
    }

    #[test]
    fn new_board_gets_numbered_ports_from_template() {
        let mut topo = sample_topology();
        let board = topo.add_differential("DB2");
        let children = topo.hierarchy().children_of(&board).unwrap();
        assert_eq!(children.len(), 4);
        let first = topo.differential_port(children[0]).unwrap();
        assert_eq!(first.name, "Port 1");
        assert_eq!(first.port_number, 1);
        assert_eq!(first.shared_ports.len(), 2);
        assert_eq!(first.differential_id, board);
    }

    #[test]
    fn model_edits_keep_demand_in_sync() {
        let mut topo = sample_topology();
        let m = topo.add_model("Snowflake", 50, &"rp1".into()).unwrap();
        assert_eq!(topo.port(&"rp1".into()).unwrap().current_pixels, 170);

        topo.set_model_pixels(&m, 10).unwrap();
        assert_eq!(topo.port(&"rp1".into()).unwrap().current_pixels, 130);

        topo.reassign_model(&m, &"rp3".into()).unwrap();
        assert_eq!(topo.port(&"rp1".into()).unwrap().current_pixels, 120);
        assert_eq!(topo.port(&"rp3".into()).unwrap().current_pixels, 10);

        topo.remove_model(&m).unwrap();
        assert_eq!(topo.port(&"rp3".into()).unwrap().current_pixels, 0);

        assert!(matches!(
            topo.add_model("Ghost", 5, &"nope".into()),
            Err(Rejection::NotFound { what: "port", .. })
        ));
        assert_eq!(
            topo.add_model("Neg", -1, &"rp1".into()),
            Err(Rejection::InvalidCapacity { value: -1 })
        );
    }

    #[test]
    fn reassign_drops_wire_from_old_port() {
        let mut topo = sample_topology();
        topo.connect(
            Endpoint::new("rx1", Handle::PortOutput("rp1".into())),
            Endpoint::new("m1", Handle::ModelInput),
            WireColor::Black,
        )
        .unwrap();
        topo.reassign_model(&"m1".into(), &"rp3".into()).unwrap();
        assert!(topo.connections_touching(&"m1".into()).next().is_none());
    }

    #[test]
    fn deleting_a_receiver_takes_its_models_and_wires() {
        let mut topo = sample_topology();
        let deleted = topo.delete(&"rx1".into()).unwrap();
        assert_eq!(deleted.entities, ["rx1", "m1", "m2"].map(EntityId::from));
        assert_eq!(deleted.connections, [EntityId::from("e-dp1-rx1")]);
        assert!(topo.hierarchy().receivers_of(&"dp1".into()).is_empty());
        assert!(topo.model(&"m1".into()).is_none());
    }

    #[test]
    fn deleting_a_board_takes_its_ports() {
        let mut topo = sample_topology();
        topo.delete(&"d1".into()).unwrap();
        assert_eq!(topo.differential_ports().count(), 0);
        assert_eq!(topo.connections().count(), 0);
        assert!(topo.receiver(&"rx1".into()).is_some());
    }

    #[test]
    fn deleting_a_controller_orphans_its_board() {
        let mut topo = sample_topology();
        topo.delete(&"c1".into()).unwrap();
        assert!(topo.hierarchy().parent_of(&"d1".into()).is_none());
        assert!(topo.differential(&"d1".into()).is_some());
    }

    #[test]
    fn differential_ports_cannot_be_deleted_alone() {
        let mut topo = sample_topology();
        assert_eq!(
            topo.delete(&"dp2".into()),
            Err(Rejection::FixedPortCount {
                port: "dp2".into(),
                board: "d1".into(),
            })
        );
    }

    #[test]
    fn delete_accepts_connection_ids() {
        let mut topo = sample_topology();
        let deleted = topo.delete(&"e-c1-d1".into()).unwrap();
        assert!(deleted.entities.is_empty());
        assert!(topo.connection(&"e-c1-d1".into()).is_none());
    }
}
