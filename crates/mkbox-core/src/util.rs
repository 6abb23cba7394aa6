//! Identity and size helpers

use crate::error::{Result, SandboxError};

/// Real UID/GID of the invoking user.
///
/// Must be captured before the user namespace is created: afterwards the
/// kernel reports the overflow ID until a map is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl OuterIdentity {
    pub fn current() -> Self {
        Self {
            uid: get_uid(),
            gid: get_gid(),
        }
    }
}

/// Get real UID
pub fn get_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}

/// Get real GID
pub fn get_gid() -> u32 {
    nix::unistd::getgid().as_raw()
}

/// Parse a numeric UID/GID argument
pub fn parse_id(s: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|_| SandboxError::InvalidId(s.to_string()))
}

/// Parse size string (e.g., "64k", "1M")
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024u64 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| SandboxError::InvalidConfig(format!("Invalid size: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| SandboxError::InvalidConfig(format!("Size overflow: {}", s)))
}
