//! `utilization`: pixel demand against budget.

use pixwire_core::capacity::{PortLine, SharedPortUtilization};
use pixwire_core::{EntityId, Totals, Utilization};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, UtilizationArgs};
use crate::error::CliError;
use crate::output;

use super::session::Session;

// ── Whole-network table ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UsageEntry {
    kind: &'static str,
    id: EntityId,
    name: String,
    #[serde(flatten)]
    total: Totals,
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Usage")]
    usage: String,
}

pub fn handle(session: &Session, args: &UtilizationArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let topo = session.topology();
    let cap = topo.capacity();
    let color = output::should_color(&global.color);

    if let Some(ref id) = args.id {
        let id = EntityId::from(id.as_str());
        let report = cap.utilization(&id).ok_or_else(|| CliError::NotFound {
            resource_type: "entity or port".into(),
            identifier: id.to_string(),
        })?;
        let out = output::render_single(
            &global.output,
            &report,
            |r| detail(r, color),
            |_| id.to_string(),
        );
        output::print_output(&out, global.quiet);
        return Ok(());
    }

    let report = cap.report();
    let mut entries: Vec<UsageEntry> = Vec::new();
    entries.extend(report.controllers.into_iter().map(|c| UsageEntry {
        kind: "controller",
        id: c.id,
        name: c.name,
        total: c.total,
    }));
    entries.extend(report.differentials.into_iter().flat_map(|d| {
        let board = UsageEntry {
            kind: "board",
            id: d.id,
            name: d.name,
            total: d.total,
        };
        std::iter::once(board).chain(d.ports.into_iter().map(|p| UsageEntry {
            kind: "board-port",
            id: p.id,
            name: p.name,
            total: p.total,
        }))
    }));
    entries.extend(report.receivers.into_iter().map(|r| UsageEntry {
        kind: "receiver",
        id: r.id,
        name: r.name,
        total: r.total,
    }));
    if args.over {
        entries.retain(|e| e.total.is_over_capacity());
    }

    let out = output::render_list(
        &global.output,
        &entries,
        |e| UsageRow {
            kind: e.kind,
            id: e.id.to_string(),
            name: e.name.clone(),
            usage: output::usage_cell(
                e.total.current,
                e.total.max,
                e.total.utilization_pct(),
                e.total.is_over_capacity(),
                color,
            ),
        },
        |e| e.id.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Single-entity detail ─────────────────────────────────────────────

fn totals_line(label: &str, t: &Totals, color: bool) -> String {
    format!(
        "{label:<10}{}",
        output::usage_cell(t.current, t.max, t.utilization_pct(), t.is_over_capacity(), color)
    )
}

fn port_line(p: &PortLine, color: bool) -> String {
    format!(
        "  {:<16}{}",
        p.name,
        output::usage_cell(
            p.usage.current.into(),
            p.usage.max.into(),
            p.utilization_pct,
            p.usage.over_capacity,
            color
        )
    )
}

fn slot_line(s: &SharedPortUtilization, color: bool) -> String {
    format!(
        "  {:<16}{}",
        s.name,
        output::usage_cell(s.current, s.max.into(), s.utilization_pct, s.over_capacity, color)
    )
}

fn fed_by(id: Option<&EntityId>) -> String {
    id.map_or_else(|| "-".into(), ToString::to_string)
}

fn detail(report: &Utilization, color: bool) -> String {
    let mut lines = Vec::new();
    match report {
        Utilization::Controller(c) => {
            lines.push(format!("Controller {} ({}) [{}]", c.name, c.id, c.controller_type));
            lines.push(totals_line("Total:", &c.total, color));
            lines.extend(c.ports.iter().map(|p| port_line(p, color)));
        }
        Utilization::Differential(d) => {
            lines.push(format!("Board {} ({})", d.name, d.id));
            lines.push(format!("Fed by:   {}", fed_by(d.fed_by.as_ref())));
            lines.push(totals_line("Total:", &d.total, color));
            for p in &d.ports {
                lines.push(format!(
                    "  Port {} {}  {}",
                    p.port_number,
                    p.name,
                    output::usage_cell(
                        p.total.current,
                        p.total.max,
                        p.total.utilization_pct(),
                        p.total.is_over_capacity(),
                        color
                    )
                ));
            }
        }
        Utilization::DifferentialPort(p) => {
            lines.push(format!("Board port {} ({}) #{}", p.name, p.id, p.port_number));
            let receivers: Vec<String> = p.receivers.iter().map(ToString::to_string).collect();
            lines.push(format!(
                "Feeds:    {}",
                if receivers.is_empty() { "-".into() } else { receivers.join(", ") }
            ));
            lines.extend(p.slots.iter().map(|s| slot_line(s, color)));
            lines.push(totals_line("Total:", &p.total, color));
        }
        Utilization::Receiver(r) => {
            lines.push(format!("Receiver {} ({})", r.name, r.id));
            lines.push(format!("Fed by:   {}", fed_by(r.fed_by.as_ref())));
            lines.push(totals_line("Total:", &r.total, color));
            lines.extend(r.ports.iter().map(|p| port_line(p, color)));
        }
        Utilization::Model(m) => {
            lines.push(format!("Model {} ({})", m.name, m.id));
            lines.push(format!("Pixels:   {}", m.pixels));
            match &m.port {
                Some(p) => lines.push(port_line(p, color)),
                None => lines.push(format!("  port {} missing", m.port_id)),
            }
        }
        Utilization::Port(p) => {
            lines.push(format!("Port {} ({})", p.name, p.id));
            lines.push(port_line(p, color));
        }
    }
    lines.join("\n")
}
