//! `validate`: the diagram already passed load-time checks when the
//! session opened; report counts and non-fatal warnings.

use pixwire_core::Topology;
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::session::Session;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    controllers: usize,
    boards: usize,
    receivers: usize,
    models: usize,
    connections: usize,
    warnings: Vec<String>,
}

fn warnings(topo: &Topology) -> Vec<String> {
    let mut out = Vec::new();

    for conn in topo.connections() {
        for (end, id) in [("source", &conn.source), ("target", &conn.target)] {
            if topo.find(id).is_none() {
                out.push(format!("connection {} has a dangling {end} {id}", conn.id));
            }
        }
    }
    for model in topo.models() {
        if topo.port(&model.port_id).is_none() {
            out.push(format!("model {} is assigned to missing port {}", model.id, model.port_id));
        }
    }

    let cap = topo.capacity();
    let report = cap.report();
    for c in &report.controllers {
        for p in c.ports.iter().filter(|p| p.usage.over_capacity) {
            out.push(format!(
                "controller {} port {} is over capacity ({}/{})",
                c.name, p.name, p.usage.current, p.usage.max
            ));
        }
    }
    for d in &report.differentials {
        for p in &d.ports {
            for s in p.slots.iter().filter(|s| s.over_capacity) {
                out.push(format!(
                    "board {} port {} slot {} is over capacity ({}/{})",
                    d.name, p.port_number, s.name, s.current, s.max
                ));
            }
        }
    }
    for r in &report.receivers {
        for p in r.ports.iter().filter(|p| p.usage.over_capacity) {
            out.push(format!(
                "receiver {} port {} is over capacity ({}/{})",
                r.name, p.name, p.usage.current, p.usage.max
            ));
        }
    }
    out
}

pub fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let topo = session.topology();
    let report = ValidationReport {
        controllers: topo.controllers().count(),
        boards: topo.differentials().count(),
        receivers: topo.receivers().count(),
        models: topo.models().count(),
        connections: topo.connections().count(),
        warnings: warnings(&topo),
    };

    let out = output::render_single(
        &global.output,
        &report,
        |r| {
            let mut lines = vec![format!(
                "OK: {} controllers, {} boards, {} receivers, {} models, {} connections",
                r.controllers, r.boards, r.receivers, r.models, r.connections
            )];
            lines.extend(r.warnings.iter().map(|w| format!("warning: {w}")));
            lines.join("\n")
        },
        |r| r.warnings.join("\n"),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
