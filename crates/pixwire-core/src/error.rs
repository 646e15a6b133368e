// ── Core error types ──
//
// `Rejection` is the closed set of reasons a topology mutation is
// refused; a rejected mutation never leaves partial state behind.
// `CoreError` adds the I/O failures of the diagram facade. The
// `From<pixwire_api::Error>` impl keeps HTTP details out of consumers.

use thiserror::Error;

use crate::model::{EntityId, EntityKind, Handle};

/// Why a topology mutation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{entity} has no handle named {handle}")]
    UnknownHandle { entity: EntityId, handle: Handle },

    #[error("cannot wire {from_kind} {from_handle} into {to_kind} {to_handle}")]
    IncompatibleKinds {
        from_kind: EntityKind,
        from_handle: Handle,
        to_kind: EntityKind,
        to_handle: Handle,
    },

    #[error("{entity} {handle} is already fed by connection {existing}")]
    TargetOccupied {
        entity: EntityId,
        handle: Handle,
        existing: EntityId,
    },

    #[error("{entity} {handle} cannot feed more than {limit} connection(s)")]
    SourceSaturated {
        entity: EntityId,
        handle: Handle,
        limit: usize,
    },

    #[error("model {model} is assigned to port {assigned}, not {offered}")]
    PortMismatch {
        model: EntityId,
        assigned: EntityId,
        offered: EntityId,
    },

    #[error("wiring {from} into {to} would create a cycle")]
    WouldCreateCycle { from: EntityId, to: EntityId },

    #[error("invalid pixel capacity {value}: must be between 0 and {}", u32::MAX)]
    InvalidCapacity { value: i64 },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("id {id} is already in use")]
    DuplicateId { id: EntityId },

    #[error("differential port {port} can only be removed with its board {board}")]
    FixedPortCount { port: EntityId, board: EntityId },

    #[error("malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },
}

impl Rejection {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            reason: reason.into(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Topology ─────────────────────────────────────────────────────
    #[error(transparent)]
    Rejected(#[from] Rejection),

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach diagram server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Diagram server timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Controller feed error: {message}")]
    Feed { message: String },

    #[error("Diagram is not running")]
    DiagramClosed,

    #[error("No diagram server configured")]
    NoServer,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The topology rejection behind this error, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pixwire_api::Error> for CoreError {
    fn from(err: pixwire_api::Error) -> Self {
        match err {
            pixwire_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            pixwire_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pixwire_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            pixwire_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            pixwire_api::Error::Status { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            pixwire_api::Error::FeedConnect(reason) => CoreError::Feed { message: reason },
            pixwire_api::Error::FeedClosed { reason } => CoreError::Feed {
                message: format!("closed: {reason}"),
            },
            pixwire_api::Error::Deserialization { message, body: _ } => {
                CoreError::Rejected(Rejection::malformed(message))
            }
        }
    }
}
