// ── Entity store ──

mod data_store;
mod feed;
mod snapshot;
mod topology;

pub use data_store::DataStore;
pub use feed::{FeedSummary, controllers_from_feed};
pub use snapshot::{DiagramSnapshot, DifferentialPortRecord};
pub use topology::{Entity, EntityRef, PortOwner, Topology};
