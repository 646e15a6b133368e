//! `show` (tree view) and `list` (per-kind tables).

use pixwire_core::capacity::{CapacityAggregator, port_utilization};
use pixwire_core::{
    Connection, Controller, DifferentialPort, EntityId, Model, Port, Receiver, Topology, Totals,
};
use tabled::Tabled;

use crate::cli::{EntityKindArg, GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output;

use super::session::Session;

// ── Tree ─────────────────────────────────────────────────────────────

struct Node {
    label: String,
    children: Vec<Node>,
}

impl Node {
    fn leaf(label: String) -> Self {
        Self {
            label,
            children: Vec::new(),
        }
    }

    fn render(&self, prefix: &str, last: bool, root: bool, out: &mut Vec<String>) {
        if root {
            out.push(self.label.clone());
        } else {
            let branch = if last { "└─ " } else { "├─ " };
            out.push(format!("{prefix}{branch}{}", self.label));
        }
        let child_prefix = if root {
            String::new()
        } else if last {
            format!("{prefix}   ")
        } else {
            format!("{prefix}│  ")
        };
        for (i, child) in self.children.iter().enumerate() {
            child.render(&child_prefix, i + 1 == self.children.len(), false, out);
        }
    }
}

struct TreeBuilder<'a> {
    topo: &'a Topology,
    cap: CapacityAggregator<'a>,
    color: bool,
}

impl TreeBuilder<'_> {
    fn name(&self, name: &str, id: &EntityId) -> String {
        format!("{name} {}", output::dim(&format!("({id})"), self.color))
    }

    fn totals(&self, t: Totals) -> String {
        output::usage_cell(t.current, t.max, t.utilization_pct(), t.is_over_capacity(), self.color)
    }

    fn port(&self, port: &Port) -> Node {
        let usage = port_utilization(port);
        let pct = pixwire_core::capacity::utilization_pct(usage.current.into(), usage.max.into());
        let label = format!(
            "{}  {}",
            self.name(&port.name, &port.id),
            output::usage_cell(usage.current.into(), usage.max.into(), pct, usage.over_capacity, self.color)
        );
        let children = self
            .topo
            .models()
            .filter(|m| m.port_id == port.id)
            .map(|m| Node::leaf(format!("{}  {} px", self.name(&m.name, &m.id), m.pixels)))
            .collect();
        Node { label, children }
    }

    fn controller(&self, ctrl: &Controller) -> Node {
        let total = self.cap.controller_total_utilization(&ctrl.id).unwrap_or_default();
        let mut children: Vec<Node> = ctrl.ports.iter().map(|p| self.port(p)).collect();
        if let Some(boards) = self.topo.hierarchy().children_of(&ctrl.id) {
            children.extend(boards.into_iter().filter_map(|b| self.board(b)));
        }
        Node {
            label: format!(
                "{} [{}]  {}",
                self.name(&ctrl.name, &ctrl.id),
                ctrl.controller_type,
                self.totals(total)
            ),
            children,
        }
    }

    fn board(&self, id: &EntityId) -> Option<Node> {
        let board = self.topo.differential(id)?;
        let total = self.cap.differential_total_utilization(id).unwrap_or_default();
        let children = self
            .topo
            .hierarchy()
            .children_of(id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| self.topo.differential_port(p))
            .map(|dp| self.board_port(dp))
            .collect();
        Some(Node {
            label: format!("{}  {}", self.name(&board.name, &board.id), self.totals(total)),
            children,
        })
    }

    fn board_port(&self, dp: &DifferentialPort) -> Node {
        let slots = self
            .cap
            .differential_port_utilization(&dp.id)
            .unwrap_or_default()
            .into_iter()
            .map(|s| {
                let cell = output::usage_cell(
                    s.current,
                    s.max.into(),
                    s.utilization_pct,
                    s.over_capacity,
                    self.color,
                );
                format!("{} {cell}", s.name)
            })
            .collect::<Vec<_>>()
            .join("  ");
        let children = self
            .topo
            .hierarchy()
            .receivers_of(&dp.id)
            .into_iter()
            .map(|rx| self.receiver(rx))
            .collect();
        Node {
            label: format!("{}  {slots}", self.name(&dp.name, &dp.id)),
            children,
        }
    }

    fn receiver(&self, rx: &Receiver) -> Node {
        let total = self.cap.receiver_total_utilization(&rx.id).unwrap_or_default();
        Node {
            label: format!("{}  {}", self.name(&rx.name, &rx.id), self.totals(total)),
            children: rx.ports.iter().map(|p| self.port(p)).collect(),
        }
    }

    fn roots(&self) -> Vec<Node> {
        let h = self.topo.hierarchy();
        let mut roots: Vec<Node> = self.topo.controllers().map(|c| self.controller(c)).collect();
        roots.extend(
            self.topo
                .differentials()
                .filter(|d| h.parent_of(&d.id).is_none())
                .filter_map(|d| self.board(&d.id)),
        );
        roots.extend(
            self.topo
                .receivers()
                .filter(|r| h.parent_of(&r.id).is_none())
                .map(|r| self.receiver(r)),
        );
        let orphans: Vec<Node> = self
            .topo
            .models()
            .filter(|m| self.topo.port(&m.port_id).is_none())
            .map(|m| {
                Node::leaf(format!(
                    "{}  {} px, port {} missing",
                    self.name(&m.name, &m.id),
                    m.pixels,
                    m.port_id
                ))
            })
            .collect();
        if !orphans.is_empty() {
            roots.push(Node {
                label: "Unassigned models".into(),
                children: orphans,
            });
        }
        roots
    }
}

pub fn handle_tree(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let topo = session.topology();
    let snapshot = topo.to_snapshot();

    let out = output::render_single(
        &global.output,
        &snapshot,
        |_| {
            let builder = TreeBuilder {
                topo: &topo,
                cap: topo.capacity(),
                color: output::should_color(&global.color),
            };
            let roots = builder.roots();
            if roots.is_empty() {
                return "(empty diagram)".into();
            }
            let mut lines = Vec::new();
            for root in &roots {
                root.render("", true, true, &mut lines);
            }
            lines.join("\n")
        },
        |_| {
            let mut ids: Vec<String> = Vec::new();
            ids.extend(topo.controllers().map(|e| e.id.to_string()));
            ids.extend(topo.differentials().map(|e| e.id.to_string()));
            ids.extend(topo.differential_ports().map(|e| e.id.to_string()));
            ids.extend(topo.receivers().map(|e| e.id.to_string()));
            ids.extend(topo.models().map(|e| e.id.to_string()));
            ids.join("\n")
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Tables ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ControllerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    controller_type: String,
    #[tabled(rename = "Ports")]
    ports: usize,
    #[tabled(rename = "Usage")]
    usage: String,
}

#[derive(Tabled)]
struct BoardRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Fed By")]
    fed_by: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

#[derive(Tabled)]
struct BoardPortRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Board")]
    board: String,
    #[tabled(rename = "#")]
    number: u8,
    #[tabled(rename = "Receivers")]
    receivers: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

#[derive(Tabled)]
struct ReceiverRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Fed By")]
    fed_by: String,
    #[tabled(rename = "Ports")]
    ports: usize,
    #[tabled(rename = "Usage")]
    usage: String,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Pixels")]
    pixels: u32,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Owner")]
    owner: String,
}

#[derive(Tabled)]
struct WireRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Color")]
    color: String,
}

fn usage(t: Totals, color: bool) -> String {
    output::usage_cell(t.current, t.max, t.utilization_pct(), t.is_over_capacity(), color)
}

fn parent_name(topo: &Topology, id: &EntityId) -> String {
    topo.hierarchy()
        .parent_of(id)
        .map_or_else(|| "-".into(), |p| p.name().to_owned())
}

pub fn handle_list(session: &Session, args: &ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let topo = session.topology();
    let cap = topo.capacity();
    let color = output::should_color(&global.color);
    let format = &global.output;

    let out = match args.kind {
        EntityKindArg::Controllers => {
            let items: Vec<&Controller> = topo.controllers().collect();
            output::render_list(
                format,
                &items,
                |c| ControllerRow {
                    id: c.id.to_string(),
                    name: c.name.clone(),
                    controller_type: c.controller_type.to_string(),
                    ports: c.ports.len(),
                    usage: usage(cap.controller_total_utilization(&c.id).unwrap_or_default(), color),
                },
                |c| c.id.to_string(),
            )
        }
        EntityKindArg::Boards => {
            let items: Vec<_> = topo.differentials().collect();
            output::render_list(
                format,
                &items,
                |d| BoardRow {
                    id: d.id.to_string(),
                    name: d.name.clone(),
                    fed_by: parent_name(&topo, &d.id),
                    usage: usage(cap.differential_total_utilization(&d.id).unwrap_or_default(), color),
                },
                |d| d.id.to_string(),
            )
        }
        EntityKindArg::BoardPorts => {
            let items: Vec<&DifferentialPort> = topo.differential_ports().collect();
            output::render_list(
                format,
                &items,
                |dp| BoardPortRow {
                    id: dp.id.to_string(),
                    board: parent_name(&topo, &dp.id),
                    number: dp.port_number,
                    receivers: topo
                        .hierarchy()
                        .receivers_of(&dp.id)
                        .iter()
                        .map(|r| r.name.clone())
                        .collect::<Vec<_>>()
                        .join(", "),
                    usage: usage(cap.differential_port_total(&dp.id).unwrap_or_default(), color),
                },
                |dp| dp.id.to_string(),
            )
        }
        EntityKindArg::Receivers => {
            let items: Vec<&Receiver> = topo.receivers().collect();
            output::render_list(
                format,
                &items,
                |r| ReceiverRow {
                    id: r.id.to_string(),
                    name: r.name.clone(),
                    fed_by: parent_name(&topo, &r.id),
                    ports: r.ports.len(),
                    usage: usage(cap.receiver_total_utilization(&r.id).unwrap_or_default(), color),
                },
                |r| r.id.to_string(),
            )
        }
        EntityKindArg::Models => {
            let items: Vec<&Model> = topo.models().collect();
            output::render_list(
                format,
                &items,
                |m| ModelRow {
                    id: m.id.to_string(),
                    name: m.name.clone(),
                    pixels: m.pixels,
                    port: topo
                        .port(&m.port_id)
                        .map_or_else(|| format!("{} (missing)", m.port_id), |p| p.name.clone()),
                    owner: parent_name(&topo, &m.id),
                },
                |m| m.id.to_string(),
            )
        }
        EntityKindArg::Wires => {
            let items: Vec<&Connection> = topo.connections().collect();
            output::render_list(
                format,
                &items,
                |c| WireRow {
                    id: c.id.to_string(),
                    from: c.from_endpoint().to_string(),
                    to: c.to_endpoint().to_string(),
                    color: c.wire_color.to_string(),
                },
                |c| c.id.to_string(),
            )
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
