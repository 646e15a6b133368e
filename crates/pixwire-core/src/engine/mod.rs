// ── Connection engine ──
//
// Validates and applies wires. Every check runs against the current
// topology before anything is written, so a rejected connect leaves
// no trace. Auto-snap lives in `snap` and funnels into `connect`.

mod snap;

pub use snap::{DEFAULT_SNAP_RADIUS, HandleAnchor, Point, SnapSettings, SnapTarget};

use tracing::debug;

use crate::error::Rejection;
use crate::model::{
    Connection, Endpoint, EntityId, EntityKind, Handle, HandleDirection, WireColor, WireRule,
};
use crate::store::{EntityRef, Topology};

impl Topology {
    /// Resolve an endpoint to the kind of entity it sits on.
    pub fn resolve_endpoint(&self, endpoint: &Endpoint) -> Result<EntityKind, Rejection> {
        let unknown = || Rejection::UnknownHandle {
            entity: endpoint.entity.clone(),
            handle: endpoint.handle.clone(),
        };
        let entity = self.find(&endpoint.entity).ok_or_else(unknown)?;
        if !endpoint.handle.belongs_to(entity.kind()) {
            return Err(unknown());
        }
        if let Handle::PortOutput(port_id) = &endpoint.handle {
            let owns_port = match entity {
                EntityRef::Controller(c) => c.port(port_id).is_some(),
                EntityRef::Receiver(r) => r.port(port_id).is_some(),
                _ => false,
            };
            if !owns_port {
                return Err(unknown());
            }
        }
        Ok(entity.kind())
    }

    /// Check a (source, target) pair against the allow-list.
    ///
    /// Board outputs may only feed the board's own ports.
    pub(crate) fn wire_shape(
        &self,
        from: (EntityKind, &Endpoint),
        to: (EntityKind, &Endpoint),
    ) -> Result<WireRule, Rejection> {
        let (from_kind, from) = from;
        let (to_kind, to) = to;
        let incompatible = || Rejection::IncompatibleKinds {
            from_kind,
            from_handle: from.handle.clone(),
            to_kind,
            to_handle: to.handle.clone(),
        };
        let rule = WireRule::classify((from_kind, &from.handle), (to_kind, &to.handle))
            .ok_or_else(incompatible)?;
        if rule == WireRule::BoardToPort {
            let own_port = self
                .differential_ports
                .get(&to.entity)
                .is_some_and(|dp| dp.differential_id == from.entity);
            if !own_port {
                return Err(incompatible());
            }
        }
        Ok(rule)
    }

    /// How many wires `from` may feed under `rule`. `None` is unbounded.
    pub(crate) fn fan_out_limit(&self, rule: WireRule, from: &EntityId) -> Option<usize> {
        match rule {
            WireRule::ControllerToBoard => Some(1),
            WireRule::PortToReceiver => Some(
                self.differential_ports
                    .get(from)
                    .map_or(0, |dp| dp.lane_count()),
            ),
            WireRule::BoardToPort | WireRule::PortToModel => None,
        }
    }

    /// A port output may only wire to a model assigned to that port.
    pub(crate) fn check_model_port(
        &self,
        rule: WireRule,
        from: &Endpoint,
        to: &Endpoint,
    ) -> Result<(), Rejection> {
        let (WireRule::PortToModel, Handle::PortOutput(port)) = (rule, &from.handle) else {
            return Ok(());
        };
        match self.models.get(&to.entity) {
            Some(model) if &model.port_id != port => Err(Rejection::PortMismatch {
                model: model.id.clone(),
                assigned: model.port_id.clone(),
                offered: port.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Run every connect check without applying anything.
    pub fn check_connect(&self, from: &Endpoint, to: &Endpoint) -> Result<WireRule, Rejection> {
        let from_kind = self.resolve_endpoint(from)?;
        let to_kind = self.resolve_endpoint(to)?;
        if from.handle.direction() != HandleDirection::Source
            || to.handle.direction() != HandleDirection::Target
        {
            return Err(Rejection::IncompatibleKinds {
                from_kind,
                from_handle: from.handle.clone(),
                to_kind,
                to_handle: to.handle.clone(),
            });
        }
        let rule = self.wire_shape((from_kind, from), (to_kind, to))?;

        if let Some(existing) = self.incoming(to) {
            return Err(Rejection::TargetOccupied {
                entity: to.entity.clone(),
                handle: to.handle.clone(),
                existing: existing.id.clone(),
            });
        }
        if let Some(limit) = self.fan_out_limit(rule, &from.entity) {
            if self.outgoing(from).count() >= limit {
                return Err(Rejection::SourceSaturated {
                    entity: from.entity.clone(),
                    handle: from.handle.clone(),
                    limit,
                });
            }
        }
        self.check_model_port(rule, from, to)?;

        if self.hierarchy().would_create_cycle(&from.entity, &to.entity) {
            return Err(Rejection::WouldCreateCycle {
                from: from.entity.clone(),
                to: to.entity.clone(),
            });
        }
        Ok(rule)
    }

    /// Validate and add a wire from `from` to `to`.
    pub fn connect(
        &mut self,
        from: Endpoint,
        to: Endpoint,
        wire_color: WireColor,
    ) -> Result<Connection, Rejection> {
        let rule = self.check_connect(&from, &to)?;
        let id = self.fresh_id();
        let connection = Connection::new(id.clone(), from, to, wire_color);
        debug!(connection = %id, ?rule, "connected");
        self.connections.insert(id, connection.clone());
        Ok(connection)
    }

    /// Remove a wire by id.
    pub fn disconnect(&mut self, id: &EntityId) -> Result<Connection, Rejection> {
        let removed = self
            .connections
            .shift_remove(id)
            .ok_or_else(|| Rejection::not_found("connection", id))?;
        debug!(connection = %id, "disconnected");
        Ok(removed)
    }

    /// Change the display color of a wire.
    pub fn recolor(&mut self, id: &EntityId, wire_color: WireColor) -> Result<(), Rejection> {
        let conn = self
            .connections
            .get_mut(id)
            .ok_or_else(|| Rejection::not_found("connection", id))?;
        conn.wire_color = wire_color;
        Ok(())
    }

    /// A new id not used by anything in this topology.
    pub(crate) fn fresh_id(&self) -> EntityId {
        loop {
            let id = EntityId::generate();
            if !self.id_in_use(&id) {
                return id;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Model, Port, Receiver};
    use crate::test_support::sample_topology;
    use pretty_assertions::assert_eq;

    fn ep(entity: &str, handle: Handle) -> Endpoint {
        Endpoint::new(entity, handle)
    }

    #[test]
    fn connect_then_disconnect_restores_state() {
        let mut topo = sample_topology();
        let before = topo.clone();
        let conn = topo
            .connect(
                ep("dp2", Handle::DiffPortOutput),
                ep("rx2", Handle::ReceiverInput),
                WireColor::Red,
            )
            .unwrap();
        assert_eq!(topo.hierarchy().receiver_ids_of(&"dp2".into()), [&EntityId::from("rx2")]);

        topo.disconnect(&conn.id).unwrap();
        assert_eq!(topo, before);
    }

    #[test]
    fn second_incoming_wire_is_rejected() {
        let mut topo = sample_topology();
        let before = topo.clone();
        let err = topo
            .connect(
                ep("dp2", Handle::DiffPortOutput),
                ep("rx1", Handle::ReceiverInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::TargetOccupied {
                entity: "rx1".into(),
                handle: Handle::ReceiverInput,
                existing: "e-dp1-rx1".into(),
            }
        );
        assert_eq!(topo, before);
    }

    #[test]
    fn unknown_entities_and_handles() {
        let mut topo = sample_topology();
        let err = topo
            .connect(
                ep("ghost", Handle::DiffPortOutput),
                ep("rx2", Handle::ReceiverInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::UnknownHandle { .. }));

        // A receiver has no board input.
        let err = topo
            .connect(
                ep("c2", Handle::ControllerOutput),
                ep("rx2", Handle::BoardInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::UnknownHandle { .. }));

        // Port output naming a port the receiver does not have.
        let err = topo
            .connect(
                ep("rx1", Handle::PortOutput("cp1".into())),
                ep("m1", Handle::ModelInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::UnknownHandle { .. }));
    }

    #[test]
    fn disallowed_pairs_are_incompatible() {
        let mut topo = sample_topology();
        let err = topo
            .connect(
                ep("c2", Handle::ControllerOutput),
                ep("rx2", Handle::ReceiverInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::IncompatibleKinds { .. }));

        // Reversed direction.
        let err = topo
            .connect(
                ep("rx2", Handle::ReceiverInput),
                ep("dp2", Handle::DiffPortOutput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::IncompatibleKinds { .. }));
    }

    #[test]
    fn board_output_only_feeds_its_own_ports() {
        let mut topo = sample_topology();
        topo.connect(
            ep("d1", Handle::BoardOutput),
            ep("dp3", Handle::DiffPortInput),
            WireColor::Black,
        )
        .unwrap();

        let mut other = sample_topology();
        let board = other.add_differential("DB2");
        let err = other
            .connect(
                Endpoint::new(board, Handle::BoardOutput),
                ep("dp3", Handle::DiffPortInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::IncompatibleKinds { .. }));
    }

    #[test]
    fn controller_output_feeds_one_board() {
        let mut topo = sample_topology();
        let board = topo.add_differential("DB2");
        let err = topo
            .connect(
                ep("c1", Handle::ControllerOutput),
                Endpoint::new(board, Handle::BoardInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::SourceSaturated {
                entity: "c1".into(),
                handle: Handle::ControllerOutput,
                limit: 1,
            }
        );
    }

    #[test]
    fn port_lanes_bound_receiver_fan_out() {
        let mut topo = sample_topology();
        for n in 0..3 {
            topo.upsert(Receiver {
                id: format!("extra{n}").into(),
                name: format!("Extra {n}"),
                ports: vec![Port::new(format!("xp{n}"), "P1", 100)],
            })
            .unwrap();
        }
        // dp1 has two lanes and already feeds rx1.
        topo.connect(
            ep("dp1", Handle::DiffPortOutput),
            ep("extra0", Handle::ReceiverInput),
            WireColor::Black,
        )
        .unwrap();
        let err = topo
            .connect(
                ep("dp1", Handle::DiffPortOutput),
                ep("extra1", Handle::ReceiverInput),
                WireColor::Black,
            )
            .unwrap_err();
        assert!(matches!(err, Rejection::SourceSaturated { limit: 2, .. }));
    }

    #[test]
    fn model_wire_must_match_assigned_port() {
        let mut topo = sample_topology();
        topo.connect(
            ep("rx1", Handle::PortOutput("rp1".into())),
            ep("m1", Handle::ModelInput),
            WireColor::Green,
        )
        .unwrap();
        let err = topo
            .connect(
                ep("rx1", Handle::PortOutput("rp1".into())),
                ep("m2", Handle::ModelInput),
                WireColor::Green,
            )
            .unwrap_err();
        assert_eq!(
            err,
            Rejection::PortMismatch {
                model: "m2".into(),
                assigned: "rp2".into(),
                offered: "rp1".into(),
            }
        );
        assert!(topo.model(&"m2".into()).is_some_and(|m: &Model| m.port_id == "rp2".into()));
    }

    #[test]
    fn disconnect_unknown_is_not_found() {
        let mut topo = sample_topology();
        assert!(matches!(
            topo.disconnect(&"nope".into()),
            Err(Rejection::NotFound { what: "connection", .. })
        ));
    }

    #[test]
    fn recolor_changes_only_color() {
        let mut topo = sample_topology();
        topo.recolor(&"e-dp1-rx1".into(), WireColor::Orange).unwrap();
        let conn = topo.connection(&"e-dp1-rx1".into()).unwrap();
        assert_eq!(conn.wire_color, WireColor::Orange);
        assert_eq!(conn.target, EntityId::from("rx1"));
    }
}
