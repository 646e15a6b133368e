// ── Controller feed ingest ──
//
// The discovery feed delivers the full controller list on every update.
// Applying one replaces the Controllers only: boards, receivers, models
// and wires stay as the user left them. Wires and models that referred
// to a controller that vanished are left dangling.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::Topology;
use super::topology::IdUse;
use crate::error::Rejection;
use crate::model::{Controller, EntityId, EntityKind};

/// What a feed update changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Decode the raw controller list of a feed message.
///
/// One undecodable controller rejects the whole update.
pub fn controllers_from_feed(raw: Vec<Value>) -> Result<Vec<Controller>, Rejection> {
    raw.into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value(value)
                .map_err(|e| Rejection::malformed(format!("feed controller #{i}: {e}")))
        })
        .collect()
}

impl Topology {
    /// Replace the controller set with a fresh feed snapshot.
    pub fn apply_controller_feed(
        &mut self,
        controllers: Vec<Controller>,
    ) -> Result<FeedSummary, Rejection> {
        let mut seen = std::collections::HashSet::new();
        for ctrl in &controllers {
            for id in std::iter::once(&ctrl.id).chain(ctrl.ports.iter().map(|p| &p.id)) {
                if !seen.insert(id) {
                    return Err(Rejection::malformed(format!("feed repeats id {id}")));
                }
                let taken = match self.id_use(id) {
                    None
                    | Some(
                        IdUse::Entity(EntityKind::Controller)
                        | IdUse::Port {
                            kind: EntityKind::Controller,
                            ..
                        },
                    ) => false,
                    Some(_) => true,
                };
                if taken {
                    return Err(Rejection::DuplicateId { id: id.clone() });
                }
            }
        }

        let mut summary = FeedSummary::default();
        let next: IndexMap<EntityId, Controller> = controllers
            .into_iter()
            .map(|c| {
                if self.controllers.contains_key(&c.id) {
                    summary.updated += 1;
                } else {
                    summary.added += 1;
                }
                (c.id.clone(), c)
            })
            .collect();
        summary.removed = self
            .controllers
            .keys()
            .filter(|id| !next.contains_key(*id))
            .inspect(|id| debug!(controller = %id, "controller left the feed"))
            .count();

        self.controllers = next;
        self.recompute_demand();
        info!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "applied controller feed"
        );
        Ok(summary)
    }
}
