//! Entity edit handlers: rename, capacity, add, model, delete.

use pixwire_core::{Command as CoreCommand, CommandResult, ControllerType, EntityId};
use serde::Serialize;

use crate::cli::{AddArgs, AddCommand, CapacityArgs, GlobalOpts, IdArgs, ModelArgs, ModelCommand, RenameArgs};
use crate::error::CliError;
use crate::output;

use super::session::Session;
use super::util;

#[derive(Debug, Serialize)]
struct Outcome {
    id: EntityId,
    message: String,
}

fn report(id: EntityId, message: String, global: &GlobalOpts) {
    let outcome = Outcome { id, message };
    let out = output::render_single(
        &global.output,
        &outcome,
        |o| o.message.clone(),
        |o| o.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

fn created(result: CommandResult) -> Result<EntityId, CliError> {
    match result {
        CommandResult::Created(id) => Ok(id),
        other => Err(CliError::Internal(format!(
            "unexpected command result: {other:?}"
        ))),
    }
}

pub async fn rename(session: &Session, args: RenameArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = EntityId::from(args.id);
    session
        .apply(CoreCommand::Rename {
            id: id.clone(),
            name: args.name.clone(),
        })
        .await?;
    report(id.clone(), format!("Renamed {id} to \"{}\"", args.name), global);
    Ok(())
}

pub async fn capacity(session: &Session, args: CapacityArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = EntityId::from(args.id);
    let index = usize::from(args.port.saturating_sub(1));
    session
        .apply(CoreCommand::SetPortCapacity {
            id: id.clone(),
            index,
            max_pixels: args.max_pixels,
        })
        .await?;
    report(
        id.clone(),
        format!("Set {id} port {} to {} pixels", args.port, args.max_pixels),
        global,
    );
    Ok(())
}

pub async fn add(session: &Session, args: AddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cmd, what) = match args.command {
        AddCommand::Controller {
            name,
            controller_type,
            ports,
        } => (
            CoreCommand::AddController {
                name: name.clone(),
                controller_type: ControllerType::from(controller_type),
                ports: util::parse_ports(&ports)?,
            },
            format!("controller \"{name}\""),
        ),
        AddCommand::Board { name } => (
            CoreCommand::AddDifferential { name: name.clone() },
            format!("board \"{name}\""),
        ),
        AddCommand::Receiver { name, ports } => (
            CoreCommand::AddReceiver {
                name: name.clone(),
                ports: util::parse_ports(&ports)?,
            },
            format!("receiver \"{name}\""),
        ),
        AddCommand::Model { name, pixels, port } => (
            CoreCommand::AddModel {
                name: name.clone(),
                pixels,
                port_id: EntityId::from(port),
            },
            format!("model \"{name}\""),
        ),
    };
    let id = created(session.apply(cmd).await?)?;
    report(id.clone(), format!("Added {what} as {id}"), global);
    Ok(())
}

pub async fn model(session: &Session, args: ModelArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ModelCommand::Pixels { id, pixels } => {
            let id = EntityId::from(id);
            session
                .apply(CoreCommand::SetModelPixels {
                    id: id.clone(),
                    pixels,
                })
                .await?;
            report(id.clone(), format!("Model {id} now draws {pixels} pixels"), global);
        }
        ModelCommand::Move { id, port } => {
            let id = EntityId::from(id);
            session
                .apply(CoreCommand::ReassignModel {
                    id: id.clone(),
                    port_id: EntityId::from(port.as_str()),
                })
                .await?;
            report(id.clone(), format!("Moved model {id} to port {port}"), global);
        }
    }
    Ok(())
}

pub async fn delete(session: &Session, args: IdArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = EntityId::from(args.id);
    let topo = session.topology();
    let label = match topo.find(&id) {
        Some(entity) => format!("{} \"{}\"", entity.kind(), entity.name()),
        None if topo.connection(&id).is_some() => "connection".into(),
        None => {
            return Err(CliError::NotFound {
                resource_type: "entity or connection".into(),
                identifier: id.to_string(),
            });
        }
    };

    let prompt = format!("Delete {label} ({id}) and everything attached to it?");
    if !util::confirm(&prompt, "delete", global.yes)? {
        return Ok(());
    }

    match session.apply(CoreCommand::Delete { id: id.clone() }).await? {
        CommandResult::Deleted(deleted) => {
            let out = output::render_single(
                &global.output,
                &deleted,
                |d| {
                    format!(
                        "Deleted {label}: {} entities, {} connections",
                        d.entities.len(),
                        d.connections.len()
                    )
                },
                |d| {
                    d.entities
                        .iter()
                        .chain(&d.connections)
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        other => Err(CliError::Internal(format!(
            "unexpected command result: {other:?}"
        ))),
    }
}
