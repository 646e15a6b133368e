//! Topology and capacity model for pixel lighting networks.
//!
//! This crate owns the domain model, wiring rules and capacity math for
//! a pixwire diagram:
//!
//! - **[`Topology`]**: The validated graph of controllers, differential
//!   boards, receivers and models. Edges are the single source of truth for
//!   which receiver hangs off which differential port.
//!
//! - **Connection engine** ([`engine`]): [`Topology::connect`] checks
//!   handle direction, wire shape, single-homing, lane limits and cycles
//!   before writing anything. Auto-snap picks the nearest compatible
//!   handle and funnels into the same path.
//!
//! - **[`CapacityAggregator`]**: Per-port, per-slot and per-entity pixel
//!   demand against configured limits.
//!
//! - **[`DataStore`]**: `watch`-backed store publishing immutable
//!   `Arc<Topology>` revisions. [`TopologyStream`] is its subscription
//!   handle.
//!
//! - **[`Diagram`]**: Session facade. Loads the saved diagram, serializes
//!   edits through a command queue and merges the live controller feed.

pub mod capacity;
pub mod command;
pub mod config;
pub mod diagram;
pub mod edit;
pub mod engine;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod store;
pub mod stream;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use capacity::{CapacityAggregator, CapacityReport, Totals, Utilization};
pub use command::{Command, CommandResult, PortRequest};
pub use config::{DiagramConfig, TlsVerification, TopologyRules};
pub use diagram::{ConnectionState, Diagram};
pub use edit::Deleted;
pub use engine::{HandleAnchor, Point, SnapSettings, SnapTarget};
pub use error::{CoreError, Rejection};
pub use hierarchy::Hierarchy;
pub use store::{DataStore, DiagramSnapshot, Entity, EntityRef, FeedSummary, Topology};
pub use stream::TopologyStream;

pub use model::{
    Connection, Controller, ControllerType, Differential, DifferentialPort, Endpoint, EntityId,
    EntityKind, Handle, HandleDirection, Model, Port, Receiver, SharedPort, WireColor, WireRule,
};
