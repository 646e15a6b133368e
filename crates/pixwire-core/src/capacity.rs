// ── Capacity aggregator ──
//
// Pixel-budget utilization at every level of the network. Everything
// is computed on demand from the current Topology; nothing here is
// cached or written back.
//
// DifferentialPort slots are positional: slot `i` is consumed by port
// `i` of every receiver wired to the differential port.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::model::{DifferentialPort, EntityId, Port};
use crate::store::{EntityRef, Topology};

// ── Primitives ───────────────────────────────────────────────────────

/// Percentage of `max` used by `current`, rounded to one decimal.
///
/// Always `0.0` when `max` is zero.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn utilization_pct(current: u64, max: u64) -> f64 {
    if max == 0 {
        return 0.0;
    }
    let pct = current as f64 / max as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Demand on a single Controller/Receiver port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortUtilization {
    pub current: u32,
    pub max: u32,
    pub over_capacity: bool,
}

pub fn port_utilization(port: &Port) -> PortUtilization {
    PortUtilization {
        current: port.current_pixels,
        max: port.max_pixels,
        over_capacity: port.current_pixels > port.max_pixels,
    }
}

/// Demand on one shared slot of a DifferentialPort.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPortUtilization {
    pub name: String,
    pub current: u64,
    pub max: u32,
    pub utilization_pct: f64,
    pub over_capacity: bool,
}

/// Summed current/max demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub current: u64,
    pub max: u64,
}

impl Totals {
    pub const fn new(current: u64, max: u64) -> Self {
        Self { current, max }
    }

    pub fn utilization_pct(&self) -> f64 {
        utilization_pct(self.current, self.max)
    }

    /// Over budget. Never true for a zero budget.
    pub fn is_over_capacity(&self) -> bool {
        self.max > 0 && self.current > self.max
    }
}

impl Add for Totals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            current: self.current.saturating_add(rhs.current),
            max: self.max.saturating_add(rhs.max),
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Totals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Serialize for Totals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Totals", 4)?;
        s.serialize_field("current", &self.current)?;
        s.serialize_field("max", &self.max)?;
        s.serialize_field("utilizationPct", &self.utilization_pct())?;
        s.serialize_field("overCapacity", &self.is_over_capacity())?;
        s.end()
    }
}

// ── Report shapes ────────────────────────────────────────────────────

/// One Controller/Receiver port line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortLine {
    pub id: EntityId,
    pub name: String,
    #[serde(flatten)]
    pub usage: PortUtilization,
    pub utilization_pct: f64,
}

impl PortLine {
    fn new(port: &Port) -> Self {
        Self {
            id: port.id.clone(),
            name: port.name.clone(),
            usage: port_utilization(port),
            utilization_pct: utilization_pct(port.current_pixels.into(), port.max_pixels.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialPortLine {
    pub id: EntityId,
    pub port_number: u8,
    pub name: String,
    pub receivers: Vec<EntityId>,
    pub slots: Vec<SharedPortUtilization>,
    pub total: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerReport {
    pub id: EntityId,
    pub name: String,
    pub controller_type: String,
    pub total: Totals,
    pub ports: Vec<PortLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifferentialReport {
    pub id: EntityId,
    pub name: String,
    pub fed_by: Option<EntityId>,
    pub total: Totals,
    pub ports: Vec<DifferentialPortLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverReport {
    pub id: EntityId,
    pub name: String,
    pub fed_by: Option<EntityId>,
    pub total: Totals,
    pub ports: Vec<PortLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelReport {
    pub id: EntityId,
    pub name: String,
    pub pixels: u32,
    pub port_id: EntityId,
    /// The assigned port, if it still exists.
    pub port: Option<PortLine>,
}

/// Utilization of whatever an id names.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Utilization {
    Controller(ControllerReport),
    Differential(DifferentialReport),
    DifferentialPort(DifferentialPortLine),
    Receiver(ReceiverReport),
    Model(ModelReport),
    Port(PortLine),
}

/// Utilization of the whole network.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CapacityReport {
    pub controllers: Vec<ControllerReport>,
    pub differentials: Vec<DifferentialReport>,
    pub receivers: Vec<ReceiverReport>,
}

// ── Aggregator ───────────────────────────────────────────────────────

/// Read-only utilization queries over a Topology.
#[derive(Debug, Clone, Copy)]
pub struct CapacityAggregator<'a> {
    topo: &'a Topology,
}

impl Topology {
    pub fn capacity(&self) -> CapacityAggregator<'_> {
        CapacityAggregator { topo: self }
    }
}

impl<'a> CapacityAggregator<'a> {
    pub fn port_utilization(&self, port_id: &EntityId) -> Option<PortUtilization> {
        self.topo.port(port_id).map(port_utilization)
    }

    /// Per-slot demand on a DifferentialPort, in slot order.
    pub fn differential_port_utilization(
        &self,
        port_id: &EntityId,
    ) -> Option<Vec<SharedPortUtilization>> {
        let dp = self.topo.differential_port(port_id)?;
        Some(self.slots(dp))
    }

    fn slots(&self, dp: &DifferentialPort) -> Vec<SharedPortUtilization> {
        let receivers = self.topo.hierarchy().receivers_of(&dp.id);
        dp.shared_ports
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let current = receivers
                    .iter()
                    .filter_map(|rx| rx.ports.get(i))
                    .map(|p| u64::from(p.current_pixels))
                    .sum::<u64>();
                let max = u64::from(slot.max_pixels);
                SharedPortUtilization {
                    name: slot.name.clone(),
                    current,
                    max: slot.max_pixels,
                    utilization_pct: utilization_pct(current, max),
                    over_capacity: max > 0 && current > max,
                }
            })
            .collect()
    }

    /// All slots of a DifferentialPort summed into one line.
    pub fn differential_port_total(&self, port_id: &EntityId) -> Option<Totals> {
        self.differential_port_utilization(port_id)
            .map(|slots| sum_slots(&slots))
    }

    /// Sum over a board's DifferentialPorts.
    pub fn differential_total_utilization(&self, board_id: &EntityId) -> Option<Totals> {
        let board = self.topo.differential(board_id)?;
        Some(
            board
                .ports
                .iter()
                .filter_map(|p| self.differential_port_total(p))
                .sum(),
        )
    }

    pub fn controller_total_utilization(&self, controller_id: &EntityId) -> Option<Totals> {
        self.topo
            .controller(controller_id)
            .map(|c| sum_ports(&c.ports))
    }

    pub fn receiver_total_utilization(&self, receiver_id: &EntityId) -> Option<Totals> {
        self.topo.receiver(receiver_id).map(|r| sum_ports(&r.ports))
    }

    // ── Reports ──────────────────────────────────────────────────────

    /// Utilization for any entity or port id.
    pub fn utilization(&self, id: &EntityId) -> Option<Utilization> {
        let Some(entity) = self.topo.find(id) else {
            return self.topo.port(id).map(|p| Utilization::Port(PortLine::new(p)));
        };
        let report = match entity {
            EntityRef::Controller(_) => Utilization::Controller(self.controller_report(id)?),
            EntityRef::Differential(_) => {
                Utilization::Differential(self.differential_report(id)?)
            }
            EntityRef::DifferentialPort(dp) => Utilization::DifferentialPort(self.port_line(dp)),
            EntityRef::Receiver(_) => Utilization::Receiver(self.receiver_report(id)?),
            EntityRef::Model(m) => Utilization::Model(ModelReport {
                id: m.id.clone(),
                name: m.name.clone(),
                pixels: m.pixels,
                port_id: m.port_id.clone(),
                port: self.topo.port(&m.port_id).map(PortLine::new),
            }),
        };
        Some(report)
    }

    /// Utilization for every Controller, Differential and Receiver.
    pub fn report(&self) -> CapacityReport {
        CapacityReport {
            controllers: self
                .topo
                .controllers()
                .filter_map(|c| self.controller_report(&c.id))
                .collect(),
            differentials: self
                .topo
                .differentials()
                .filter_map(|d| self.differential_report(&d.id))
                .collect(),
            receivers: self
                .topo
                .receivers()
                .filter_map(|r| self.receiver_report(&r.id))
                .collect(),
        }
    }

    pub fn controller_report(&self, id: &EntityId) -> Option<ControllerReport> {
        let ctrl = self.topo.controller(id)?;
        Some(ControllerReport {
            id: ctrl.id.clone(),
            name: ctrl.name.clone(),
            controller_type: ctrl.controller_type.to_string(),
            total: sum_ports(&ctrl.ports),
            ports: ctrl.ports.iter().map(PortLine::new).collect(),
        })
    }

    pub fn differential_report(&self, id: &EntityId) -> Option<DifferentialReport> {
        let board = self.topo.differential(id)?;
        let mut ports: Vec<&DifferentialPort> = board
            .ports
            .iter()
            .filter_map(|p| self.topo.differential_port(p))
            .collect();
        ports.sort_by_key(|dp| dp.port_number);
        let ports: Vec<DifferentialPortLine> = ports.into_iter().map(|dp| self.port_line(dp)).collect();
        Some(DifferentialReport {
            id: board.id.clone(),
            name: board.name.clone(),
            fed_by: self.fed_by(id),
            total: ports.iter().map(|p| p.total).sum(),
            ports,
        })
    }

    pub fn receiver_report(&self, id: &EntityId) -> Option<ReceiverReport> {
        let rx = self.topo.receiver(id)?;
        Some(ReceiverReport {
            id: rx.id.clone(),
            name: rx.name.clone(),
            fed_by: self.fed_by(id),
            total: sum_ports(&rx.ports),
            ports: rx.ports.iter().map(PortLine::new).collect(),
        })
    }

    fn port_line(&self, dp: &DifferentialPort) -> DifferentialPortLine {
        let slots = self.slots(dp);
        DifferentialPortLine {
            id: dp.id.clone(),
            port_number: dp.port_number,
            name: dp.name.clone(),
            receivers: self
                .topo
                .hierarchy()
                .receivers_of(&dp.id)
                .into_iter()
                .map(|r| r.id.clone())
                .collect(),
            total: sum_slots(&slots),
            slots,
        }
    }

    fn fed_by(&self, id: &EntityId) -> Option<EntityId> {
        self.topo
            .hierarchy()
            .parent_of(id)
            .map(|parent| parent.id().clone())
    }
}

fn sum_ports(ports: &[Port]) -> Totals {
    ports
        .iter()
        .map(|p| Totals::new(p.current_pixels.into(), p.max_pixels.into()))
        .sum()
}

fn sum_slots(slots: &[SharedPortUtilization]) -> Totals {
    slots
        .iter()
        .map(|s| Totals::new(s.current, s.max.into()))
        .sum()
}
