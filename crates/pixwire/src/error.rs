//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `Rejection` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use pixwire_config::ConfigError;
use pixwire_core::{CoreError, Rejection};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REJECTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to diagram server at {url}")]
    #[diagnostic(
        code(pixwire::connection_failed),
        help(
            "Check that the diagram server is running and reachable.\n\
             Use --insecure (-k) for self-signed certificates, or --file to work offline."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("No diagram server or snapshot file configured")]
    #[diagnostic(
        code(pixwire::no_target),
        help(
            "Pass --server URL or --file PATH, or create a profile with: pixwire config init\n\
             Expected config at: {path}"
        )
    )]
    NoTarget { path: String },

    #[error("Controller feed failed: {message}")]
    #[diagnostic(code(pixwire::feed))]
    Feed { message: String },

    // ── Topology ─────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(pixwire::not_found),
        help("Run: pixwire show  to see the ids in this diagram")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("{message}")]
    #[diagnostic(
        code(pixwire::conflict),
        help("Disconnect the existing wire first, or pick a free handle.")
    )]
    Conflict { message: String },

    #[error("Rejected: {message}")]
    #[diagnostic(code(pixwire::rejected))]
    Rejected { message: String },

    // ── Server ───────────────────────────────────────────────────────

    #[error("Server error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    #[diagnostic(code(pixwire::api_error))]
    Api { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pixwire::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pixwire::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pixwire config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(pixwire::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pixwire::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(pixwire::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NoTarget { .. } | Self::Feed { .. } => {
                exit_code::CONNECTION
            }
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Rejection / CoreError → CliError mapping ─────────────────────────

impl From<Rejection> for CliError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NotFound { what, id } => CliError::NotFound {
                resource_type: what.into(),
                identifier: id,
            },
            r @ (Rejection::TargetOccupied { .. }
            | Rejection::SourceSaturated { .. }
            | Rejection::DuplicateId { .. }) => CliError::Conflict {
                message: r.to_string(),
            },
            other => CliError::Rejected {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Rejected(rejection) => rejection.into(),

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Feed { message } => CliError::Feed { message },

            CoreError::DiagramClosed => CliError::Internal("diagram session closed".into()),

            CoreError::NoServer => CliError::NoTarget {
                path: pixwire_config::config_path().display().to_string(),
            },

            CoreError::Api { message, status } => CliError::Api { status, message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
