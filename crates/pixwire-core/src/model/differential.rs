// ── Differential boards ──
//
// A Differential is a breakout board fed by one controller output. It
// always owns exactly `ports_per_board` DifferentialPorts, numbered
// from 1. Each DifferentialPort splits its pixel budget across shared
// slots and feeds one Receiver per slot.

use serde::{Deserialize, Serialize};

use super::EntityId;

/// A differential breakout board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Differential {
    pub id: EntityId,
    pub name: String,
    /// Ids of the board's ports, ordered by port number.
    #[serde(rename = "differentialPorts", default)]
    pub ports: Vec<EntityId>,
}

/// One budget slot on a DifferentialPort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPort {
    pub name: String,
    pub max_pixels: u32,
}

impl SharedPort {
    pub fn new(name: impl Into<String>, max_pixels: u32) -> Self {
        Self {
            name: name.into(),
            max_pixels,
        }
    }
}

/// A numbered output of a Differential board.
///
/// The receivers fed by this port are not stored here; they are the
/// targets of the port's outgoing `diff-port-output` connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialPort {
    pub id: EntityId,
    pub differential_id: EntityId,
    pub port_number: u8,
    pub name: String,
    #[serde(default)]
    pub shared_ports: Vec<SharedPort>,
}

impl DifferentialPort {
    /// Number of receivers this port can feed.
    pub fn lane_count(&self) -> usize {
        self.shared_ports.len()
    }
}
