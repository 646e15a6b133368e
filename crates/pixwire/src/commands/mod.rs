//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod config_cmd;
pub mod edit;
pub mod session;
pub mod show;
pub mod utilization;
pub mod util;
pub mod validate;
pub mod watch;
pub mod wiring;

use pixwire_core::DiagramConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use self::session::Session;

/// Dispatch a diagram-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    mut config: DiagramConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Snap(ref args) = cmd {
        config.snap.enabled = true;
        if let Some(radius) = args.radius {
            config.snap.radius = radius;
        }
    }
    if matches!(cmd, Command::Watch) {
        return watch::handle(config, global).await;
    }

    let session = Session::open(config, global).await?;
    let result = match cmd {
        Command::Show => show::handle_tree(&session, global),
        Command::List(args) => show::handle_list(&session, &args, global),
        Command::Utilization(args) => utilization::handle(&session, &args, global),
        Command::Validate => validate::handle(&session, global),
        Command::Connect(args) => wiring::connect(&session, args, global).await,
        Command::Disconnect(args) => wiring::disconnect(&session, args, global).await,
        Command::Recolor(args) => wiring::recolor(&session, args, global).await,
        Command::Snap(args) => wiring::snap(&session, args, global).await,
        Command::Rename(args) => edit::rename(&session, args, global).await,
        Command::Capacity(args) => edit::capacity(&session, args, global).await,
        Command::Add(args) => edit::add(&session, args, global).await,
        Command::Model(args) => edit::model(&session, args, global).await,
        Command::Delete(args) => edit::delete(&session, args, global).await,
        // Handled before a session is opened
        Command::Watch | Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    session.close().await;
    result
}
