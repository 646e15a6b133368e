// ── Runtime diagram configuration ──
//
// Describes where the diagram lives and the board rules the topology
// enforces. Never touches disk: the CLI builds a `DiagramConfig` from
// its profile and hands it in.

use std::num::NonZeroU8;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::engine::SnapSettings;
use crate::model::SharedPort;

/// Ports every Differential board is created with.
pub const DEFAULT_PORTS_PER_BOARD: NonZeroU8 = match NonZeroU8::new(4) {
    Some(n) => n,
    None => NonZeroU8::MIN,
};

/// Budget for each shared slot on a new DifferentialPort.
pub const DEFAULT_SHARED_PORT_MAX_PIXELS: u32 = 1024;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs on a show LAN).
    DangerAcceptInvalid,
}

/// Structural rules for boards created or loaded into a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRules {
    /// Exact number of DifferentialPorts per Differential. Port numbers
    /// are `u8`, so a board holds 1..=255 ports.
    pub ports_per_board: NonZeroU8,
    /// Shared slots stamped onto every new DifferentialPort.
    pub shared_port_template: Vec<SharedPort>,
}

impl Default for TopologyRules {
    fn default() -> Self {
        Self {
            ports_per_board: DEFAULT_PORTS_PER_BOARD,
            shared_port_template: ["A", "B", "C", "D"]
                .into_iter()
                .map(|name| SharedPort::new(name, DEFAULT_SHARED_PORT_MAX_PIXELS))
                .collect(),
        }
    }
}

/// Configuration for one diagram session.
#[derive(Debug, Clone)]
pub struct DiagramConfig {
    /// Diagram server base URL. `None` runs purely in memory.
    pub server: Option<Url>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Subscribe to the controller feed after connecting.
    pub feed_enabled: bool,
    /// Auto-snap behavior for dropped wires.
    pub snap: SnapSettings,
    /// Board rules enforced on load and on edit.
    pub rules: TopologyRules,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            server: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            feed_enabled: true,
            snap: SnapSettings::default(),
            rules: TopologyRules::default(),
        }
    }
}
