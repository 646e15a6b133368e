// ── Command API ──
//
// Every write to a running Diagram flows through one `Command` enum and
// one queue. User edits and controller feed updates share that queue,
// so they are applied strictly in arrival order.

pub mod requests;

use crate::engine::{HandleAnchor, Point};
use crate::error::CoreError;
use crate::model::{Connection, Controller, ControllerType, Endpoint, EntityId, WireColor};
use crate::store::{DiagramSnapshot, FeedSummary};
use crate::edit::Deleted;

pub use requests::PortRequest;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All write operations against a diagram.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Wiring ───────────────────────────────────────────────────────
    Connect {
        from: Endpoint,
        to: Endpoint,
        wire_color: WireColor,
    },
    /// Complete a dragged wire using the diagram's snap settings.
    SnapConnect {
        fixed: Endpoint,
        release: Point,
        anchors: Vec<HandleAnchor>,
        wire_color: WireColor,
    },
    Disconnect {
        id: EntityId,
    },
    Recolor {
        id: EntityId,
        wire_color: WireColor,
    },

    // ── Edits ────────────────────────────────────────────────────────
    Rename {
        id: EntityId,
        name: String,
    },
    SetPortCapacity {
        id: EntityId,
        index: usize,
        max_pixels: i64,
    },

    // ── Creation / deletion ──────────────────────────────────────────
    AddController {
        name: String,
        controller_type: ControllerType,
        ports: Vec<PortRequest>,
    },
    AddDifferential {
        name: String,
    },
    AddReceiver {
        name: String,
        ports: Vec<PortRequest>,
    },
    Delete {
        id: EntityId,
    },

    // ── Models ───────────────────────────────────────────────────────
    AddModel {
        name: String,
        pixels: i64,
        port_id: EntityId,
    },
    SetModelPixels {
        id: EntityId,
        pixels: i64,
    },
    ReassignModel {
        id: EntityId,
        port_id: EntityId,
    },

    // ── Bulk ─────────────────────────────────────────────────────────
    LoadSnapshot(Box<DiagramSnapshot>),
    ApplyControllerFeed(Vec<Controller>),
}

/// Result of a successfully applied command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok,
    Connected(Connection),
    /// `None` when nothing was in snap range.
    Snapped(Option<Connection>),
    Disconnected(Connection),
    Created(EntityId),
    Deleted(Deleted),
    Feed(FeedSummary),
}
