//! Clap derive structures for the `pixwire` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pixwire -- inspect and edit pixel lighting network diagrams
#[derive(Debug, Parser)]
#[command(
    name = "pixwire",
    version,
    about = "Inspect and edit pixel lighting network diagrams",
    long_about = "Wire controllers, differential boards, receivers and models,\n\
        and check pixel capacity at every port.\n\n\
        Works on a diagram server (--server / profile) or a snapshot file (--file).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "PIXWIRE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Diagram server URL (overrides profile)
    #[arg(long, short = 's', env = "PIXWIRE_SERVER", global = true)]
    pub server: Option<String>,

    /// Work on a snapshot file instead of a server
    #[arg(long, short = 'f', env = "PIXWIRE_FILE", global = true, conflicts_with = "server")]
    pub file: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PIXWIRE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "PIXWIRE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "PIXWIRE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the network as a tree with per-entity utilization
    #[command(alias = "tree")]
    Show,

    /// List entities of one kind
    #[command(alias = "ls")]
    List(ListArgs),

    /// Pixel utilization of one entity, or of the whole network
    #[command(alias = "util", alias = "u")]
    Utilization(UtilizationArgs),

    /// Check that a diagram loads cleanly and report over-capacity ports
    Validate,

    /// Wire a source handle to a target handle
    #[command(alias = "c")]
    Connect(ConnectArgs),

    /// Remove a wire
    Disconnect(IdArgs),

    /// Change a wire's color
    Recolor(RecolorArgs),

    /// Connect a dropped wire end to the nearest compatible handle
    Snap(SnapArgs),

    /// Rename an entity or port
    Rename(RenameArgs),

    /// Set the pixel budget of a port or shared slot
    #[command(alias = "cap")]
    Capacity(CapacityArgs),

    /// Create controllers, boards, receivers and models
    Add(AddArgs),

    /// Edit light models
    Model(ModelArgs),

    /// Delete an entity or wire (and everything that hangs off it)
    #[command(alias = "rm")]
    Delete(IdArgs),

    /// Follow the live controller feed and print each change
    Watch,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IdArgs {
    /// Entity or connection ID
    pub id: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EntityKindArg {
    Controllers,
    #[value(alias = "differentials")]
    Boards,
    #[value(alias = "differential-ports")]
    BoardPorts,
    Receivers,
    Models,
    #[value(alias = "connections")]
    Wires,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// What to list
    pub kind: EntityKindArg,
}

#[derive(Debug, Args)]
pub struct UtilizationArgs {
    /// Entity or port ID (omit for the whole network)
    pub id: Option<String>,

    /// Only show entries over capacity
    #[arg(long)]
    pub over: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WIRING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Source endpoint as ENTITY:HANDLE (e.g. c1:controller-output, rx1:port-output:rp1)
    pub from: String,

    /// Target endpoint as ENTITY:HANDLE (e.g. d1:diff-board-input)
    pub to: String,

    /// Wire color
    #[arg(long, default_value = "black")]
    pub color: String,
}

#[derive(Debug, Args)]
pub struct RecolorArgs {
    /// Connection ID
    pub id: String,

    /// New wire color
    pub color: String,
}

#[derive(Debug, Args)]
pub struct SnapArgs {
    /// The fixed end of the wire as ENTITY:HANDLE
    pub fixed: String,

    /// Release point as X,Y
    #[arg(long)]
    pub at: String,

    /// Candidate handle as ENTITY:HANDLE@X,Y (repeatable)
    #[arg(long = "anchor", required = true)]
    pub anchors: Vec<String>,

    /// Snap radius (overrides profile)
    #[arg(long)]
    pub radius: Option<f64>,

    /// Wire color
    #[arg(long, default_value = "black")]
    pub color: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  EDITING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Entity or port ID
    pub id: String,

    /// New name
    pub name: String,
}

#[derive(Debug, Args)]
pub struct CapacityArgs {
    /// Controller, receiver or differential port ID
    pub id: String,

    /// Port number (controller/receiver) or slot number (differential port), from 1
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// New maximum pixel count
    #[arg(allow_negative_numbers = true)]
    pub max_pixels: i64,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[command(subcommand)]
    pub command: AddCommand,
}

#[derive(Debug, Subcommand)]
pub enum AddCommand {
    /// Add a controller
    Controller {
        /// Display name
        name: String,

        /// Controller type (Falcon, FPP, WLED...)
        #[arg(long = "type", short = 't', default_value = "Falcon")]
        controller_type: String,

        /// Output port as NAME:MAX_PIXELS (repeatable)
        #[arg(long = "port")]
        ports: Vec<String>,
    },

    /// Add a differential board with its fixed set of ports
    #[command(alias = "differential")]
    Board {
        /// Display name
        name: String,
    },

    /// Add a receiver
    Receiver {
        /// Display name
        name: String,

        /// Output port as NAME:MAX_PIXELS (repeatable)
        #[arg(long = "port")]
        ports: Vec<String>,
    },

    /// Add a light model on a controller or receiver port
    Model {
        /// Display name
        name: String,

        /// Pixel count
        #[arg(long, allow_negative_numbers = true)]
        pixels: i64,

        /// Port ID the model draws from
        #[arg(long)]
        port: String,
    },
}

#[derive(Debug, Args)]
pub struct ModelArgs {
    #[command(subcommand)]
    pub command: ModelCommand,
}

#[derive(Debug, Subcommand)]
pub enum ModelCommand {
    /// Change a model's pixel count
    Pixels {
        /// Model ID
        id: String,

        /// New pixel count
        #[arg(allow_negative_numbers = true)]
        pixels: i64,
    },

    /// Move a model to another port
    Move {
        /// Model ID
        id: String,

        /// Destination port ID
        port: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
