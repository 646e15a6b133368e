//! One CLI invocation's view of a diagram: a snapshot file or a server.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use pixwire_core::{Command, CommandResult, Diagram, DiagramConfig, DiagramSnapshot, Topology};
use tracing::{debug, info};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

/// Where edits are written back to.
#[derive(Debug, Clone)]
pub enum Target {
    File(PathBuf),
    Server(String),
}

pub struct Session {
    diagram: Diagram,
    target: Target,
}

impl Session {
    /// Load the diagram named by `--file`, or by the resolved server.
    ///
    /// A missing snapshot file starts an empty diagram; it is created on
    /// the first edit.
    pub async fn open(mut config: DiagramConfig, global: &GlobalOpts) -> Result<Self, CliError> {
        config.feed_enabled = false;

        if let Some(ref path) = global.file {
            config.server = None;
            let diagram = Diagram::new(config);
            diagram.connect().await?;

            match std::fs::read_to_string(path) {
                Ok(raw) => {
                    let snapshot = DiagramSnapshot::from_json(&raw)?;
                    diagram
                        .execute(Command::LoadSnapshot(Box::new(snapshot)))
                        .await?;
                    debug!(path = %path.display(), "loaded snapshot file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "snapshot file does not exist yet");
                }
                Err(e) => return Err(e.into()),
            }

            return Ok(Self {
                diagram,
                target: Target::File(path.clone()),
            });
        }

        let Some(url) = config.server.as_ref().map(ToString::to_string) else {
            return Err(CliError::NoTarget {
                path: config::config_path().display().to_string(),
            });
        };
        let diagram = Diagram::new(config);
        diagram.connect().await?;
        Ok(Self {
            diagram,
            target: Target::Server(url),
        })
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn topology(&self) -> Arc<Topology> {
        self.diagram.snapshot()
    }

    /// Apply one edit and write the result back.
    pub async fn apply(&self, cmd: Command) -> Result<CommandResult, CliError> {
        let result = self.diagram.execute(cmd).await?;
        self.persist().await?;
        Ok(result)
    }

    async fn persist(&self) -> Result<(), CliError> {
        match &self.target {
            Target::File(path) => {
                let json = self.diagram.store().to_snapshot().to_json_pretty()?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, json)?;
                info!(path = %path.display(), "wrote snapshot file");
            }
            Target::Server(url) => {
                self.diagram.save().await?;
                info!(server = %url, "saved to server");
            }
        }
        Ok(())
    }

    pub async fn close(self) {
        self.diagram.disconnect().await;
    }
}
