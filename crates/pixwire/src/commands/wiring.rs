//! Wire handlers: connect, disconnect, recolor, snap.

use pixwire_core::{Command as CoreCommand, CommandResult, Connection, EntityId};

use crate::cli::{ConnectArgs, GlobalOpts, IdArgs, RecolorArgs, SnapArgs};
use crate::error::CliError;
use crate::output;

use super::session::Session;
use super::util;

fn describe(c: &Connection) -> String {
    format!(
        "{}  {} -> {}  [{}]",
        c.id,
        c.from_endpoint(),
        c.to_endpoint(),
        c.wire_color
    )
}

fn print_connection(verb: &str, conn: &Connection, global: &GlobalOpts) {
    let out = output::render_single(
        &global.output,
        conn,
        |c| format!("{verb} {}", describe(c)),
        |c| c.id.to_string(),
    );
    output::print_output(&out, global.quiet);
}

fn unexpected(result: &CommandResult) -> CliError {
    CliError::Internal(format!("unexpected command result: {result:?}"))
}

pub async fn connect(session: &Session, args: ConnectArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cmd = CoreCommand::Connect {
        from: util::parse_endpoint(&args.from)?,
        to: util::parse_endpoint(&args.to)?,
        wire_color: util::parse_color(&args.color)?,
    };
    match session.apply(cmd).await? {
        CommandResult::Connected(conn) => {
            print_connection("Connected", &conn, global);
            Ok(())
        }
        other => Err(unexpected(&other)),
    }
}

pub async fn disconnect(session: &Session, args: IdArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = EntityId::from(args.id);
    match session.apply(CoreCommand::Disconnect { id }).await? {
        CommandResult::Disconnected(conn) => {
            print_connection("Disconnected", &conn, global);
            Ok(())
        }
        other => Err(unexpected(&other)),
    }
}

pub async fn recolor(session: &Session, args: RecolorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let id = EntityId::from(args.id);
    let wire_color = util::parse_color(&args.color)?;
    session
        .apply(CoreCommand::Recolor {
            id: id.clone(),
            wire_color,
        })
        .await?;
    if let Some(conn) = session.topology().connection(&id) {
        print_connection("Recolored", conn, global);
    }
    Ok(())
}

pub async fn snap(session: &Session, args: SnapArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let anchors = args
        .anchors
        .iter()
        .map(String::as_str)
        .map(util::parse_anchor)
        .collect::<Result<Vec<_>, _>>()?;
    let cmd = CoreCommand::SnapConnect {
        fixed: util::parse_endpoint(&args.fixed)?,
        release: util::parse_point(&args.at)?,
        anchors,
        wire_color: util::parse_color(&args.color)?,
    };
    match session.apply(cmd).await? {
        CommandResult::Snapped(Some(conn)) => {
            print_connection("Snapped", &conn, global);
            Ok(())
        }
        CommandResult::Snapped(None) => {
            let out = output::render_single(
                &global.output,
                &serde_json::Value::Null,
                |_| "No compatible handle in range; wire left detached".into(),
                |_| String::new(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        other => Err(unexpected(&other)),
    }
}
