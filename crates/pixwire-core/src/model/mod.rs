// ── Domain model ──
//
// Plain data types for the lighting network. No behavior beyond
// parsing and small lookups; topology rules live in the store and
// engine modules.

mod connection;
mod controller;
mod differential;
mod entity_id;
mod light_model;
mod receiver;

pub use connection::{
    Connection, Endpoint, EntityKind, Handle, HandleDirection, UnknownHandleName, WireColor,
    WireRule,
};
pub use controller::{Controller, ControllerType, Port};
pub use differential::{Differential, DifferentialPort, SharedPort};
pub use entity_id::EntityId;
pub use light_model::Model;
pub use receiver::Receiver;
