//! Parsing of port-forward output.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ReleaseError, Result};

/// Prefix of the first line kubectl prints once a tunnel is listening.
pub const FORWARDING_MARKER: &str = "Forwarding from";

fn port_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":([0-9]+) ->").expect("port pattern is a valid regex"))
}

/// Whether `line` announces an established tunnel.
pub fn is_forwarding_line(line: &str) -> bool {
    line.starts_with(FORWARDING_MARKER)
}

/// Extract the local port from a `Forwarding from <addr>:<port> -> <target>` line.
///
/// # Errors
///
/// Returns `ReleaseError::MalformedForwardingLine` when the first `:<digits> ->`
/// occurrence is missing or does not fit a port number.
pub fn extract_port(line: &str) -> Result<u16> {
    port_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .ok_or_else(|| ReleaseError::MalformedForwardingLine(line.to_string()))
}
