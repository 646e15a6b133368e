// ── Auto-snap ──
//
// When a dragged wire end is released near a compatible handle, the
// wire completes to that handle as if it had been dropped on it. The
// canvas supplies handle anchor positions; nothing here knows about
// layout beyond those points.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Rejection;
use crate::model::{Connection, Endpoint, HandleDirection, WireColor};
use crate::store::Topology;

/// Default snap radius in canvas units.
pub const DEFAULT_SNAP_RADIUS: f64 = 20.0;

/// Auto-snap behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    pub enabled: bool,
    /// Maximum distance (inclusive) between release point and anchor.
    pub radius: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            radius: DEFAULT_SNAP_RADIUS,
        }
    }
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Where a handle is drawn on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleAnchor {
    pub endpoint: Endpoint,
    pub position: Point,
}

/// The wire auto-snap would create.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapTarget {
    pub from: Endpoint,
    pub to: Endpoint,
    pub distance: f64,
}

impl Topology {
    /// Pick the handle a released wire end should snap to.
    ///
    /// `fixed` is the end of the wire that stays put. Candidates must be
    /// within `settings.radius` of `release` and form an allowed wire
    /// with `fixed` in either direction. The nearest wins; ties go to the
    /// lowest entity id, then the handle name.
    ///
    /// Fails only if snapping is on and `fixed` itself does not resolve.
    pub fn snap_target(
        &self,
        fixed: &Endpoint,
        release: Point,
        anchors: &[HandleAnchor],
        settings: &SnapSettings,
    ) -> Result<Option<SnapTarget>, Rejection> {
        if !settings.enabled || settings.radius.is_nan() || settings.radius < 0.0 {
            return Ok(None);
        }
        let fixed_kind = self.resolve_endpoint(fixed)?;
        let fixed_is_source = fixed.handle.direction() == HandleDirection::Source;

        let best = anchors
            .iter()
            .filter(|a| a.endpoint.entity != fixed.entity)
            .filter_map(|anchor| {
                let distance = release.distance_to(anchor.position);
                if distance.is_nan() || distance > settings.radius {
                    return None;
                }
                let kind = self.resolve_endpoint(&anchor.endpoint).ok()?;
                let (from, to) = if fixed_is_source {
                    ((fixed_kind, fixed), (kind, &anchor.endpoint))
                } else {
                    ((kind, &anchor.endpoint), (fixed_kind, fixed))
                };
                if from.1.handle.direction() != HandleDirection::Source
                    || to.1.handle.direction() != HandleDirection::Target
                {
                    return None;
                }
                self.wire_shape(from, to).ok()?;
                Some((distance, anchor))
            })
            .min_by(|(da, a), (db, b)| {
                da.total_cmp(db)
                    .then_with(|| a.endpoint.entity.cmp(&b.endpoint.entity))
                    .then_with(|| compare_handle_names(a, b))
            });

        Ok(best.map(|(distance, anchor)| {
            let (from, to) = if fixed_is_source {
                (fixed.clone(), anchor.endpoint.clone())
            } else {
                (anchor.endpoint.clone(), fixed.clone())
            };
            SnapTarget { from, to, distance }
        }))
    }

    /// Snap and connect in one step.
    ///
    /// `Ok(None)` when snapping is off or nothing compatible is in range;
    /// otherwise the result of [`Topology::connect`] on the chosen pair.
    pub fn snap_connect(
        &mut self,
        fixed: &Endpoint,
        release: Point,
        anchors: &[HandleAnchor],
        settings: &SnapSettings,
        wire_color: WireColor,
    ) -> Result<Option<Connection>, Rejection> {
        match self.snap_target(fixed, release, anchors, settings)? {
            Some(target) => self.connect(target.from, target.to, wire_color).map(Some),
            None => Ok(None),
        }
    }
}

fn compare_handle_names(a: &HandleAnchor, b: &HandleAnchor) -> Ordering {
    a.endpoint
        .handle
        .to_string()
        .cmp(&b.endpoint.handle.to_string())
}
