//! Shared helpers for command handlers: argument parsing and prompts.

use std::io::IsTerminal;

use pixwire_core::{Endpoint, HandleAnchor, Point, PortRequest, WireColor};

use crate::error::CliError;

fn invalid(field: &str, reason: impl Into<String>) -> CliError {
    CliError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Parse `ENTITY:HANDLE`, e.g. `rx1:port-output:rp1`.
pub fn parse_endpoint(raw: &str) -> Result<Endpoint, CliError> {
    let (entity, handle) = raw
        .split_once(':')
        .filter(|(e, h)| !e.is_empty() && !h.is_empty())
        .ok_or_else(|| invalid("endpoint", format!("expected ENTITY:HANDLE, got '{raw}'")))?;
    let handle = handle
        .parse()
        .map_err(|e| invalid("endpoint", format!("{e}")))?;
    Ok(Endpoint::new(entity, handle))
}

/// Parse `X,Y`.
pub fn parse_point(raw: &str) -> Result<Point, CliError> {
    let (x, y) = raw
        .split_once(',')
        .ok_or_else(|| invalid("point", format!("expected X,Y, got '{raw}'")))?;
    let coord = |s: &str| {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid("point", format!("'{s}' is not a number")))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

/// Parse `ENTITY:HANDLE@X,Y`.
pub fn parse_anchor(raw: &str) -> Result<HandleAnchor, CliError> {
    let (endpoint, point) = raw
        .rsplit_once('@')
        .ok_or_else(|| invalid("anchor", format!("expected ENTITY:HANDLE@X,Y, got '{raw}'")))?;
    Ok(HandleAnchor {
        endpoint: parse_endpoint(endpoint)?,
        position: parse_point(point)?,
    })
}

pub fn parse_color(raw: &str) -> Result<WireColor, CliError> {
    raw.parse()
        .map_err(|_| invalid("color", format!("unknown wire color '{raw}'")))
}

pub fn parse_ports(raw: &[String]) -> Result<Vec<PortRequest>, CliError> {
    raw.iter()
        .map(|p| p.parse().map_err(|e| invalid("port", format!("{e}"))))
        .collect()
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
