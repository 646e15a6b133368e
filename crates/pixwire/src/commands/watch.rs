//! `watch`: follow the controller feed until interrupted.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use pixwire_core::{Controller, Diagram, DiagramConfig, Topology};
use serde::Serialize;
use tracing::info;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedChange {
    at: String,
    added: Vec<String>,
    updated: Vec<String>,
    removed: Vec<String>,
    controllers: usize,
}

fn controllers_by_id(topo: &Topology) -> BTreeMap<String, &Controller> {
    topo.controllers().map(|c| (c.id.to_string(), c)).collect()
}

fn diff(before: &Topology, after: &Topology) -> FeedChange {
    let old = controllers_by_id(before);
    let new = controllers_by_id(after);
    FeedChange {
        at: Utc::now().format("%H:%M:%S").to_string(),
        added: new.keys().filter(|k| !old.contains_key(*k)).cloned().collect(),
        updated: new
            .iter()
            .filter(|&(k, v)| old.get(k).is_some_and(|o| **o != **v))
            .map(|(k, _)| k.clone())
            .collect(),
        removed: old.keys().filter(|k| !new.contains_key(*k)).cloned().collect(),
        controllers: new.len(),
    }
}

fn render(change: &FeedChange, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(change, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(change)),
        OutputFormat::Plain => change
            .added
            .iter()
            .chain(&change.updated)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Table => format!(
            "[{}] {} controllers  +{} ~{} -{}",
            change.at,
            change.controllers,
            change.added.len(),
            change.updated.len(),
            change.removed.len()
        ),
    }
}

pub async fn handle(mut config: DiagramConfig, global: &GlobalOpts) -> Result<(), CliError> {
    if global.file.is_some() {
        return Err(CliError::Validation {
            field: "file".into(),
            reason: "watch follows a live diagram server; drop --file".into(),
        });
    }
    if config.server.is_none() {
        return Err(CliError::NoTarget {
            path: crate::config::config_path().display().to_string(),
        });
    }
    config.feed_enabled = true;

    let diagram = Diagram::new(config);
    let mut stream = diagram.subscribe();
    diagram.connect().await?;
    info!("watching controller feed; Ctrl-C to stop");

    let mut last: Arc<Topology> = diagram.snapshot();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = stream.changed() => {
                let Some(topo) = next else { break };
                let change = diff(&last, &topo);
                if !(change.added.is_empty() && change.updated.is_empty() && change.removed.is_empty()) {
                    output::print_output(&render(&change, &global.output), global.quiet);
                }
                last = topo;
            }
        }
    }

    diagram.disconnect().await;
    Ok(())
}
