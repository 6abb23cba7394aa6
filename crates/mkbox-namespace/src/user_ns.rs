//! User namespace UID/GID mapping support
//!
//! After `unshare(CLONE_NEWUSER)` the process runs as the overflow ID until a
//! map is written to /proc/self/uid_map and /proc/self/gid_map. Each file
//! accepts exactly one write per namespace.

use log::{debug, info};
use mkbox_core::{Result, Step, SyscallResultExt};
use nix::unistd::{Gid, Uid, setresgid, setresuid};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;

/// Which identity a mapping applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdAxis {
    User,
    Group,
}

impl IdAxis {
    pub fn map_path(&self) -> &'static str {
        match self {
            IdAxis::User => "/proc/self/uid_map",
            IdAxis::Group => "/proc/self/gid_map",
        }
    }
}

/// A single-row ID map: `inner` inside the namespace is `outer` outside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMapping {
    pub inner: u32,
    pub outer: u32,
}

impl IdMapping {
    pub fn new(inner: u32, outer: u32) -> Self {
        Self { inner, outer }
    }
}

impl fmt::Display for IdMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} 1", self.inner, self.outer)
    }
}

/// Write the one-line map for `axis`. The record goes out in a single
/// `write(2)`; the kernel rejects partial or repeated writes.
pub fn write_id_map(axis: IdAxis, mapping: IdMapping) -> Result<()> {
    let record = mapping.to_string();
    let path = axis.map_path();
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .context(Step::Remap, "open", path)?;
    let written = file
        .write(record.as_bytes())
        .context(Step::Remap, "write", format!("{}, {:?}", path, record.trim_end()))?;
    if written != record.len() {
        return Err(std::io::Error::from(std::io::ErrorKind::WriteZero)).context(
            Step::Remap,
            "write",
            format!("{}, {:?}", path, record.trim_end()),
        );
    }
    debug!("{} <- {}", path, record.trim_end());
    Ok(())
}

/// Deny setgroups(2) in the namespace so an unprivileged gid_map write is
/// accepted. A no-op if already denied or if the kernel predates the file.
pub fn deny_setgroups() -> Result<()> {
    const PATH: &str = "/proc/self/setgroups";
    match fs::read_to_string(PATH) {
        Ok(current) if current.trim() == "allow" => {
            fs::write(PATH, "deny\n").context(Step::Remap, "write", PATH)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(Step::Remap, "read", PATH),
    }
}

/// Map `inner` to the invoking user's `outer` UID and become `inner`
/// (real, effective and saved).
pub fn remap_uid(inner: u32, outer: u32) -> Result<()> {
    info!("uid: {} => {}", outer, inner);
    write_id_map(IdAxis::User, IdMapping::new(inner, outer))?;
    let uid = Uid::from_raw(inner);
    setresuid(uid, uid, uid).context(Step::Remap, "setresuid", inner)
}

/// Map `inner` to the invoking user's `outer` GID and become `inner`
/// (real, effective and saved).
pub fn remap_gid(inner: u32, outer: u32) -> Result<()> {
    info!("gid: {} => {}", outer, inner);
    deny_setgroups()?;
    write_id_map(IdAxis::Group, IdMapping::new(inner, outer))?;
    let gid = Gid::from_raw(inner);
    setresgid(gid, gid, gid).context(Step::Remap, "setresgid", inner)
}
