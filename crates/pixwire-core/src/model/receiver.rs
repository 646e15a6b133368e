// ── Receivers ──

use serde::{Deserialize, Serialize};

use super::{EntityId, Port};

/// A long-range receiver fed by one DifferentialPort lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Receiver {
    pub fn port(&self, port_id: &EntityId) -> Option<&Port> {
        self.ports.iter().find(|p| &p.id == port_id)
    }
}
