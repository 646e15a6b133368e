// ── Controller and output ports ──
//
// Controllers arrive from the discovery feed. Receivers reuse `Port`
// for their own pixel outputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumString, IntoStaticStr};

use super::EntityId;

/// One pixel output on a Controller or Receiver.
///
/// `current_pixels` is derived: the sum of `pixels` across Models whose
/// `port_id` is this port. The store recomputes it after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: EntityId,
    pub name: String,
    pub max_pixels: u32,
    #[serde(default)]
    pub current_pixels: u32,
}

impl Port {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, max_pixels: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_pixels,
            current_pixels: 0,
        }
    }
}

/// Controller hardware family.
///
/// Unknown families are kept verbatim in [`ControllerType::Other`] so a
/// load/save cycle never rewrites what the feed reported.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
#[serde(from = "String", into = "String")]
pub enum ControllerType {
    Falcon,
    #[strum(serialize = "FPP")]
    Fpp,
    Kulp,
    HinksPix,
    #[strum(serialize = "WLED")]
    Wled,
    #[strum(serialize = "ESPixelStick")]
    EspixelStick,
    Genius,
    AlphaPix,
    #[strum(default)]
    Other(String),
}

impl Default for ControllerType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => f.write_str(raw),
            known => f.write_str(known.into()),
        }
    }
}

impl From<String> for ControllerType {
    fn from(raw: String) -> Self {
        raw.parse().unwrap_or(Self::Other(raw))
    }
}

impl From<ControllerType> for String {
    fn from(t: ControllerType) -> Self {
        t.to_string()
    }
}

/// A pixel controller with a fixed set of output ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Controller {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub controller_type: ControllerType,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Controller {
    pub fn port(&self, port_id: &EntityId) -> Option<&Port> {
        self.ports.iter().find(|p| &p.id == port_id)
    }
}
