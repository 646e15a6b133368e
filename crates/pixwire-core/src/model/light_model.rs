// ── Light models ──

use serde::{Deserialize, Serialize};

use super::EntityId;

/// A physical light fixture (string, matrix, arch...) drawing `pixels`
/// from the Controller or Receiver port named by `port_id`.
///
/// `port_id` may point at a port that no longer exists; the model then
/// contributes to nothing until it is reassigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: EntityId,
    pub name: String,
    pub pixels: u32,
    pub port_id: EntityId,
}
