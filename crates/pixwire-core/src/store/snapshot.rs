// ── Snapshot wire format ──
//
// The JSON document exchanged with the diagram server and snapshot
// files. Loading validates the whole document before building a
// Topology; nothing is applied if any check fails. Dangling references
// (wires or models pointing at ids that do not exist) are tolerated.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::Topology;
use crate::config::TopologyRules;
use crate::error::Rejection;
use crate::model::{
    Connection, Controller, Differential, DifferentialPort, EntityId, HandleDirection, Model,
    Receiver,
};

/// A DifferentialPort as it appears on the wire.
///
/// `connectedReceivers` mirrors the port's outgoing receiver wires. It is
/// written on save and, when present on load, must agree with them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialPortRecord {
    #[serde(flatten)]
    pub port: DifferentialPort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_receivers: Option<Vec<EntityId>>,
}

/// A complete saved diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSnapshot {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controllers: Vec<Controller>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differentials: Vec<Differential>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differential_ports: Vec<DifferentialPortRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<Receiver>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<Model>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
    /// Keys owned by the canvas (layout, viewport...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiagramSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, Rejection> {
        serde_json::from_str(raw).map_err(|e| Rejection::malformed(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self, Rejection> {
        if !value.is_object() {
            return Err(Rejection::malformed("snapshot must be a JSON object"));
        }
        serde_json::from_value(value).map_err(|e| Rejection::malformed(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, Rejection> {
        serde_json::to_string_pretty(self).map_err(|e| Rejection::malformed(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
            && self.differentials.is_empty()
            && self.differential_ports.is_empty()
            && self.receivers.is_empty()
            && self.models.is_empty()
            && self.connections.is_empty()
    }
}

impl Topology {
    /// Build a topology from a snapshot, validating it first.
    pub fn from_snapshot(
        snapshot: DiagramSnapshot,
        rules: TopologyRules,
    ) -> Result<Self, Rejection> {
        let DiagramSnapshot {
            controllers,
            differentials,
            differential_ports,
            receivers,
            models,
            connections,
            extra,
        } = snapshot;

        check_unique_ids(
            &controllers,
            &differentials,
            &differential_ports,
            &receivers,
            &models,
            &connections,
        )?;

        let mut topo = Self::new(rules);
        topo.extra = extra;
        let mut listed_receivers = Vec::new();
        topo.controllers = controllers.into_iter().map(|c| (c.id.clone(), c)).collect();
        topo.differentials = differentials.into_iter().map(|d| (d.id.clone(), d)).collect();
        topo.differential_ports = differential_ports
            .into_iter()
            .map(|record| {
                if let Some(listed) = record.connected_receivers {
                    listed_receivers.push((record.port.id.clone(), listed));
                }
                (record.port.id.clone(), record.port)
            })
            .collect();
        topo.receivers = receivers.into_iter().map(|r| (r.id.clone(), r)).collect();
        topo.models = models.into_iter().map(|m| (m.id.clone(), m)).collect();
        topo.connections = connections.into_iter().map(|c| (c.id.clone(), c)).collect();

        topo.check_boards()?;
        topo.check_wires()?;
        topo.check_listed_receivers(&listed_receivers)?;
        if let Some(id) = topo.hierarchy().find_cycle() {
            return Err(Rejection::malformed(format!("wiring loops back through {id}")));
        }

        topo.recompute_demand();
        debug!(
            controllers = topo.controllers.len(),
            differentials = topo.differentials.len(),
            receivers = topo.receivers.len(),
            models = topo.models.len(),
            connections = topo.connections.len(),
            "snapshot validated"
        );
        Ok(topo)
    }

    /// Serialize the current state for saving.
    pub fn to_snapshot(&self) -> DiagramSnapshot {
        let hierarchy = self.hierarchy();
        DiagramSnapshot {
            controllers: self.controllers.values().cloned().collect(),
            differentials: self.differentials.values().cloned().collect(),
            differential_ports: self
                .differential_ports
                .values()
                .map(|dp| DifferentialPortRecord {
                    port: dp.clone(),
                    connected_receivers: Some(
                        hierarchy
                            .receiver_ids_of(&dp.id)
                            .into_iter()
                            .cloned()
                            .collect(),
                    ),
                })
                .collect(),
            receivers: self.receivers.values().cloned().collect(),
            models: self.models.values().cloned().collect(),
            connections: self.connections.values().cloned().collect(),
            extra: self.extra.clone(),
        }
    }

    /// Every board has exactly `ports_per_board` ports numbered 1..=N,
    /// and every port is listed by the board it names.
    fn check_boards(&self) -> Result<(), Rejection> {
        let expected = usize::from(self.rules.ports_per_board.get());
        let mut claimed: HashSet<&EntityId> = HashSet::new();

        for board in self.differentials.values() {
            if board.ports.len() != expected {
                return Err(Rejection::malformed(format!(
                    "differential {} has {} ports, expected {expected}",
                    board.id,
                    board.ports.len()
                )));
            }
            let mut numbers = HashSet::new();
            for port_id in &board.ports {
                let dp = self.differential_ports.get(port_id).ok_or_else(|| {
                    Rejection::malformed(format!(
                        "differential {} lists missing port {port_id}",
                        board.id
                    ))
                })?;
                if dp.differential_id != board.id {
                    return Err(Rejection::malformed(format!(
                        "port {port_id} is listed by {} but belongs to {}",
                        board.id, dp.differential_id
                    )));
                }
                let in_range = (1..=expected).contains(&usize::from(dp.port_number));
                if !in_range || !numbers.insert(dp.port_number) {
                    return Err(Rejection::malformed(format!(
                        "port {port_id} on {} has invalid number {}",
                        board.id, dp.port_number
                    )));
                }
                if !claimed.insert(port_id) {
                    return Err(Rejection::malformed(format!(
                        "port {port_id} is listed twice"
                    )));
                }
            }
        }

        if let Some(orphan) = self
            .differential_ports
            .keys()
            .find(|id| !claimed.contains(id))
        {
            return Err(Rejection::malformed(format!(
                "differential port {orphan} belongs to no board"
            )));
        }
        Ok(())
    }

    /// Wire shape, direction, single-homing, model port and fan-out rules.
    fn check_wires(&self) -> Result<(), Rejection> {
        let mut targets: HashSet<(&EntityId, String)> = HashSet::new();
        let mut fan_out: HashMap<(&EntityId, String), usize> = HashMap::new();

        for conn in self.connections.values() {
            if conn.source_handle.direction() != HandleDirection::Source
                || conn.target_handle.direction() != HandleDirection::Target
            {
                return Err(Rejection::malformed(format!(
                    "connection {} runs {} -> {}",
                    conn.id, conn.source_handle, conn.target_handle
                )));
            }
            if !targets.insert((&conn.target, conn.target_handle.to_string())) {
                return Err(Rejection::malformed(format!(
                    "{} {} has more than one incoming connection",
                    conn.target, conn.target_handle
                )));
            }

            // Shape checks need both ends; dangling wires are kept as-is.
            let from = conn.from_endpoint();
            let to = conn.to_endpoint();
            let (Ok(from_kind), Ok(to_kind)) =
                (self.resolve_endpoint(&from), self.resolve_endpoint(&to))
            else {
                debug!(connection = %conn.id, "keeping dangling connection");
                continue;
            };
            let malformed =
                |e: Rejection| Rejection::malformed(format!("connection {}: {e}", conn.id));
            let rule = self
                .wire_shape((from_kind, &from), (to_kind, &to))
                .map_err(malformed)?;
            self.check_model_port(rule, &from, &to).map_err(malformed)?;

            let count = fan_out
                .entry((&conn.source, conn.source_handle.to_string()))
                .or_default();
            *count += 1;
            if let Some(limit) = self.fan_out_limit(rule, &conn.source) {
                if *count > limit {
                    return Err(Rejection::malformed(format!(
                        "{} {} feeds more than {limit} connection(s)",
                        conn.source, conn.source_handle
                    )));
                }
            }
        }
        Ok(())
    }

    /// A `connectedReceivers` list must name exactly the receivers the
    /// port's wires reach.
    fn check_listed_receivers(
        &self,
        listed: &[(EntityId, Vec<EntityId>)],
    ) -> Result<(), Rejection> {
        let hierarchy = self.hierarchy();
        for (port_id, receivers) in listed {
            let wired: HashSet<&EntityId> =
                hierarchy.receiver_ids_of(port_id).into_iter().collect();
            let named: HashSet<&EntityId> = receivers.iter().collect();
            if wired != named {
                return Err(Rejection::malformed(format!(
                    "connectedReceivers of {port_id} disagree with its connections"
                )));
            }
        }
        Ok(())
    }
}

/// Ids are unique across entities, ports and connections.
fn check_unique_ids(
    controllers: &[Controller],
    differentials: &[Differential],
    differential_ports: &[DifferentialPortRecord],
    receivers: &[Receiver],
    models: &[Model],
    connections: &[Connection],
) -> Result<(), Rejection> {
    let ids = controllers
        .iter()
        .flat_map(|c| std::iter::once(&c.id).chain(c.ports.iter().map(|p| &p.id)))
        .chain(differentials.iter().map(|d| &d.id))
        .chain(differential_ports.iter().map(|r| &r.port.id))
        .chain(
            receivers
                .iter()
                .flat_map(|r| std::iter::once(&r.id).chain(r.ports.iter().map(|p| &p.id))),
        )
        .chain(models.iter().map(|m| &m.id))
        .chain(connections.iter().map(|c| &c.id));

    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Rejection::malformed(format!("duplicate id {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::sample_topology;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rules() -> TopologyRules {
        sample_topology().rules.clone()
    }

    #[test]
    fn empty_object_loads_empty() {
        let snap = DiagramSnapshot::from_json("{}").unwrap();
        let topo = Topology::from_snapshot(snap, rules()).unwrap();
        assert!(topo.is_empty());
        assert_eq!(serde_json::to_value(topo.to_snapshot()).unwrap(), json!({}));
    }

    #[test]
    fn save_then_load_is_lossless() {
        let mut topo = sample_topology();
        topo.extra.insert("viewport".into(), json!({ "x": 10, "y": -4, "zoom": 1.5 }));
        let saved = serde_json::to_value(topo.to_snapshot()).unwrap();

        let loaded = Topology::from_snapshot(
            DiagramSnapshot::from_value(saved.clone()).unwrap(),
            rules(),
        )
        .unwrap();
        assert_eq!(loaded, topo);
        assert_eq!(serde_json::to_value(loaded.to_snapshot()).unwrap(), saved);
        assert_eq!(saved["differentialPorts"][0]["connectedReceivers"], json!(["rx1"]));
        assert_eq!(saved["viewport"]["zoom"], 1.5);
    }

    #[test]
    fn current_pixels_are_recomputed_on_load() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["receivers"][0]["ports"][0]["currentPixels"] = json!(9999);
        let topo = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap();
        assert_eq!(topo.port(&"rp1".into()).unwrap().current_pixels, 120);
    }

    #[test]
    fn wrong_port_count_is_malformed() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["differentials"][0]["differentialPorts"]
            .as_array_mut()
            .unwrap()
            .pop();
        let err = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap_err();
        assert!(matches!(err, Rejection::MalformedSnapshot { .. }));
    }

    #[test]
    fn listed_receivers_must_match_wires() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["differentialPorts"][1]["connectedReceivers"] = json!(["rx2"]);
        let err = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap_err();
        assert!(err.to_string().contains("connectedReceivers of dp2"));
    }

    #[test]
    fn missing_receiver_list_is_derived() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        for dp in saved["differentialPorts"].as_array_mut().unwrap() {
            dp.as_object_mut().unwrap().remove("connectedReceivers");
        }
        let topo = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap();
        assert_eq!(
            topo.hierarchy().receiver_ids_of(&"dp1".into()),
            [&EntityId::from("rx1")]
        );
    }

    #[test]
    fn duplicate_ids_and_double_feeds_are_malformed() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["models"][1]["id"] = json!("m1");
        assert!(Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .is_err());

        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["connections"].as_array_mut().unwrap().push(json!({
            "id": "e-dup",
            "source": "dp2",
            "sourceHandle": "diff-port-output",
            "target": "rx1",
            "targetHandle": "receiver-input"
        }));
        let err = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap_err();
        assert!(err.to_string().contains("more than one incoming"));
    }

    #[test]
    fn dangling_wires_survive_load() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["connections"].as_array_mut().unwrap().push(json!({
            "id": "e-ghost",
            "source": "dp2",
            "sourceHandle": "diff-port-output",
            "target": "rx-gone",
            "targetHandle": "receiver-input",
            "wireColor": "red"
        }));
        saved["differentialPorts"][1]["connectedReceivers"] = json!(["rx-gone"]);
        let topo = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap();
        assert!(topo.connection(&"e-ghost".into()).is_some());
        assert!(topo.hierarchy().receivers_of(&"dp2".into()).is_empty());
    }

    #[test]
    fn disallowed_wire_is_malformed() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["connections"].as_array_mut().unwrap().push(json!({
            "id": "e-bad",
            "source": "c2",
            "sourceHandle": "controller-output",
            "target": "rx2",
            "targetHandle": "receiver-input"
        }));
        assert!(Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .is_err());
    }

    #[test]
    fn model_wire_must_leave_the_assigned_port() {
        let mut saved = serde_json::to_value(sample_topology().to_snapshot()).unwrap();
        saved["connections"].as_array_mut().unwrap().push(json!({
            "id": "e-rp1-m1",
            "source": "rx1",
            "sourceHandle": "port-output:rp1",
            "target": "m1",
            "targetHandle": "model-input"
        }));
        assert!(Topology::from_snapshot(
            DiagramSnapshot::from_value(saved.clone()).unwrap(),
            rules()
        )
        .is_ok());

        saved["models"][0]["portId"] = json!("rp2");
        let err = Topology::from_snapshot(DiagramSnapshot::from_value(saved).unwrap(), rules())
            .unwrap_err();
        assert!(matches!(err, Rejection::MalformedSnapshot { .. }));
        assert!(err.to_string().contains("e-rp1-m1"));
    }

    #[test]
    fn non_object_payloads_are_malformed() {
        assert!(DiagramSnapshot::from_value(json!([1, 2])).is_err());
        assert!(DiagramSnapshot::from_json("{\"models\": [{\"id\": \"m\", \"pixels\": -3}]}").is_err());
    }
}
