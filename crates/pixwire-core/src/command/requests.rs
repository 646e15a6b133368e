// ── Request payloads ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A port to create on a new Controller or Receiver.
///
/// Parses from `name:max`, e.g. `Port 1:680`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRequest {
    pub name: String,
    pub max_pixels: u32,
}

impl PortRequest {
    pub fn new(name: impl Into<String>, max_pixels: u32) -> Self {
        Self {
            name: name.into(),
            max_pixels,
        }
    }
}

impl From<PortRequest> for (String, u32) {
    fn from(p: PortRequest) -> Self {
        (p.name, p.max_pixels)
    }
}

impl fmt::Display for PortRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.max_pixels)
    }
}

impl FromStr for PortRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, max) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected NAME:MAX_PIXELS, got {s:?}"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("port name is empty in {s:?}"));
        }
        let max_pixels = max
            .trim()
            .parse()
            .map_err(|_| format!("invalid pixel count {max:?}"))?;
        Ok(Self::new(name, max_pixels))
    }
}
