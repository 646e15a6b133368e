// ── Wiring ──
//
// Connections are directed edges between named handles. A handle name
// says which side of which kind of entity it sits on; `port-output`
// handles also carry the id of the Controller/Receiver port they
// belong to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

use super::EntityId;

const PORT_OUTPUT_PREFIX: &str = "port-output:";

// ── EntityKind ───────────────────────────────────────────────────────

/// The kinds of entity a handle can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EntityKind {
    Controller,
    Differential,
    DifferentialPort,
    Receiver,
    Model,
}

// ── Handle ───────────────────────────────────────────────────────────

/// Whether a handle starts or ends a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleDirection {
    Source,
    Target,
}

/// A named connection point on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Handle {
    ControllerOutput,
    BoardInput,
    BoardOutput,
    DiffPortInput,
    DiffPortOutput,
    ReceiverInput,
    /// Output of one Controller or Receiver port.
    PortOutput(EntityId),
    ModelInput,
}

impl Handle {
    pub fn direction(&self) -> HandleDirection {
        match self {
            Self::ControllerOutput | Self::BoardOutput | Self::DiffPortOutput | Self::PortOutput(_) => {
                HandleDirection::Source
            }
            Self::BoardInput | Self::DiffPortInput | Self::ReceiverInput | Self::ModelInput => {
                HandleDirection::Target
            }
        }
    }

    /// Whether an entity of `kind` exposes this handle at all.
    pub fn belongs_to(&self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (Self::ControllerOutput, EntityKind::Controller)
                | (Self::BoardInput | Self::BoardOutput, EntityKind::Differential)
                | (
                    Self::DiffPortInput | Self::DiffPortOutput,
                    EntityKind::DifferentialPort
                )
                | (Self::ReceiverInput, EntityKind::Receiver)
                | (
                    Self::PortOutput(_),
                    EntityKind::Controller | EntityKind::Receiver
                )
                | (Self::ModelInput, EntityKind::Model)
        )
    }
}

/// Handle names without a payload, used for parsing and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
enum SimpleHandle {
    ControllerOutput,
    #[strum(serialize = "diff-board-input")]
    BoardInput,
    #[strum(serialize = "diff-board-output")]
    BoardOutput,
    DiffPortInput,
    DiffPortOutput,
    ReceiverInput,
    ModelInput,
}

impl From<SimpleHandle> for Handle {
    fn from(h: SimpleHandle) -> Self {
        match h {
            SimpleHandle::ControllerOutput => Self::ControllerOutput,
            SimpleHandle::BoardInput => Self::BoardInput,
            SimpleHandle::BoardOutput => Self::BoardOutput,
            SimpleHandle::DiffPortInput => Self::DiffPortInput,
            SimpleHandle::DiffPortOutput => Self::DiffPortOutput,
            SimpleHandle::ReceiverInput => Self::ReceiverInput,
            SimpleHandle::ModelInput => Self::ModelInput,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let simple = match self {
            Self::PortOutput(port) => return write!(f, "{PORT_OUTPUT_PREFIX}{port}"),
            Self::ControllerOutput => SimpleHandle::ControllerOutput,
            Self::BoardInput => SimpleHandle::BoardInput,
            Self::BoardOutput => SimpleHandle::BoardOutput,
            Self::DiffPortInput => SimpleHandle::DiffPortInput,
            Self::DiffPortOutput => SimpleHandle::DiffPortOutput,
            Self::ReceiverInput => SimpleHandle::ReceiverInput,
            Self::ModelInput => SimpleHandle::ModelInput,
        };
        write!(f, "{simple}")
    }
}

/// A handle name that matches no known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown handle name: {0:?}")]
pub struct UnknownHandleName(pub String);

impl FromStr for Handle {
    type Err = UnknownHandleName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(port) = s.strip_prefix(PORT_OUTPUT_PREFIX) {
            if port.is_empty() {
                return Err(UnknownHandleName(s.to_owned()));
            }
            return Ok(Self::PortOutput(EntityId::from(port)));
        }
        s.parse::<SimpleHandle>()
            .map(Self::from)
            .map_err(|_| UnknownHandleName(s.to_owned()))
    }
}

impl TryFrom<String> for Handle {
    type Error = UnknownHandleName;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Handle> for String {
    fn from(h: Handle) -> Self {
        h.to_string()
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// One end of a connection: an entity plus one of its handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub entity: EntityId,
    pub handle: Handle,
}

impl Endpoint {
    pub fn new(entity: impl Into<EntityId>, handle: Handle) -> Self {
        Self {
            entity: entity.into(),
            handle,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.handle)
    }
}

// ── WireColor ────────────────────────────────────────────────────────

/// Display color of a wire on the canvas.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum WireColor {
    #[default]
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    White,
    Orange,
    Purple,
    Brown,
    Gray,
}

// ── Connection ───────────────────────────────────────────────────────

/// A directed wire from a source handle to a target handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: EntityId,
    pub source: EntityId,
    pub source_handle: Handle,
    pub target: EntityId,
    pub target_handle: Handle,
    #[serde(default)]
    pub wire_color: WireColor,
}

impl Connection {
    pub fn new(id: EntityId, from: Endpoint, to: Endpoint, wire_color: WireColor) -> Self {
        Self {
            id,
            source: from.entity,
            source_handle: from.handle,
            target: to.entity,
            target_handle: to.handle,
            wire_color,
        }
    }

    pub fn from_endpoint(&self) -> Endpoint {
        Endpoint::new(self.source.clone(), self.source_handle.clone())
    }

    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(self.target.clone(), self.target_handle.clone())
    }

    /// Whether either end of this wire sits on `id`.
    pub fn touches(&self, id: &EntityId) -> bool {
        &self.source == id || &self.target == id
    }

    /// Whether this wire leaves from `port_id` (a Controller/Receiver port).
    pub fn leaves_port(&self, port_id: &EntityId) -> bool {
        matches!(&self.source_handle, Handle::PortOutput(p) if p == port_id)
    }
}

// ── Allowed wires ────────────────────────────────────────────────────

/// The wire shapes the topology accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireRule {
    /// Controller output into a differential board input.
    ControllerToBoard,
    /// Board output into one of the board's own port inputs.
    BoardToPort,
    /// Differential port lane into a receiver input.
    PortToReceiver,
    /// Controller/Receiver port output into a model input.
    PortToModel,
}

impl WireRule {
    /// Classify a (source, target) pair of kind/handle combinations.
    ///
    /// Returns `None` for anything outside the allow-list, including
    /// handles that do not belong to the given kinds.
    pub fn classify(
        from: (EntityKind, &Handle),
        to: (EntityKind, &Handle),
    ) -> Option<Self> {
        let (from_kind, from_handle) = from;
        let (to_kind, to_handle) = to;
        if !from_handle.belongs_to(from_kind) || !to_handle.belongs_to(to_kind) {
            return None;
        }
        match (from_handle, to_handle) {
            (Handle::ControllerOutput, Handle::BoardInput) => Some(Self::ControllerToBoard),
            (Handle::BoardOutput, Handle::DiffPortInput) => Some(Self::BoardToPort),
            (Handle::DiffPortOutput, Handle::ReceiverInput) => Some(Self::PortToReceiver),
            (Handle::PortOutput(_), Handle::ModelInput) => Some(Self::PortToModel),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn simple_handle_names_parse_back() {
        for simple in SimpleHandle::iter() {
            let handle = Handle::from(simple);
            assert_eq!(handle.to_string().parse::<Handle>().unwrap(), handle);
        }
        assert_eq!(Handle::BoardInput.to_string(), "diff-board-input");
        assert_eq!(Handle::ReceiverInput.to_string(), "receiver-input");
    }

    #[test]
    fn port_output_carries_port_id() {
        let h: Handle = "port-output:p-7".parse().unwrap();
        assert_eq!(h, Handle::PortOutput("p-7".into()));
        assert_eq!(h.to_string(), "port-output:p-7");
        assert!("port-output:".parse::<Handle>().is_err());
    }

    #[test]
    fn unknown_handle_name_is_an_error() {
        let err = "bogus".parse::<Handle>().unwrap_err();
        assert_eq!(err, UnknownHandleName("bogus".into()));
        let bad: Result<Connection, _> = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "source": "c1",
            "sourceHandle": "sideways",
            "target": "d1",
            "targetHandle": "diff-board-input"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn allow_list_matches_wire_shapes() {
        let port = Handle::PortOutput("p1".into());
        assert_eq!(
            WireRule::classify(
                (EntityKind::Controller, &Handle::ControllerOutput),
                (EntityKind::Differential, &Handle::BoardInput)
            ),
            Some(WireRule::ControllerToBoard)
        );
        assert_eq!(
            WireRule::classify(
                (EntityKind::Receiver, &port),
                (EntityKind::Model, &Handle::ModelInput)
            ),
            Some(WireRule::PortToModel)
        );
        assert_eq!(
            WireRule::classify(
                (EntityKind::Controller, &Handle::ControllerOutput),
                (EntityKind::Receiver, &Handle::ReceiverInput)
            ),
            None
        );
        // Right handle names on the wrong kind of entity.
        assert_eq!(
            WireRule::classify(
                (EntityKind::Model, &Handle::DiffPortOutput),
                (EntityKind::Receiver, &Handle::ReceiverInput)
            ),
            None
        );
    }

    #[test]
    fn wire_color_defaults_to_black() {
        let conn: Connection = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "source": "c1",
            "sourceHandle": "controller-output",
            "target": "d1",
            "targetHandle": "diff-board-input"
        }))
        .unwrap();
        assert_eq!(conn.wire_color, WireColor::Black);
        assert_eq!("RED".parse::<WireColor>().unwrap(), WireColor::Red);
    }
}
