//! Namespace isolation
//!
//! A sandbox always detaches into the same five namespaces at once. There
//! is no partial set: if any of them cannot be created, nothing is.

use log::debug;
use mkbox_core::{Result, Step, SyscallResultExt};
use nix::sched::CloneFlags;
use std::os::unix::fs::MetadataExt;

/// Namespace types a sandbox detaches into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceType {
    Mount,
    Uts,
    Ipc,
    User,
    Net,
}

impl NamespaceType {
    /// Name of the entry under /proc/self/ns
    pub fn proc_name(&self) -> &'static str {
        match self {
            NamespaceType::Mount => "mnt",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::User => "user",
            NamespaceType::Net => "net",
        }
    }

    pub fn clone_flag(&self) -> CloneFlags {
        match self {
            NamespaceType::Mount => CloneFlags::CLONE_NEWNS,
            NamespaceType::Uts => CloneFlags::CLONE_NEWUTS,
            NamespaceType::Ipc => CloneFlags::CLONE_NEWIPC,
            NamespaceType::User => CloneFlags::CLONE_NEWUSER,
            NamespaceType::Net => CloneFlags::CLONE_NEWNET,
        }
    }

    pub fn all() -> [NamespaceType; 5] {
        [
            NamespaceType::Mount,
            NamespaceType::Uts,
            NamespaceType::Ipc,
            NamespaceType::User,
            NamespaceType::Net,
        ]
    }
}

/// Flags passed to the single `unshare(2)` call
pub const SANDBOX_NAMESPACES: CloneFlags = CloneFlags::CLONE_NEWNS
    .union(CloneFlags::CLONE_NEWUTS)
    .union(CloneFlags::CLONE_NEWIPC)
    .union(CloneFlags::CLONE_NEWUSER)
    .union(CloneFlags::CLONE_NEWNET);

/// Detach the calling process into fresh mount, UTS, IPC, user and network
/// namespaces with one `unshare(2)`.
///
/// Fails with `EINVAL` if the process is multithreaded.
pub fn unshare_all() -> Result<()> {
    nix::sched::unshare(SANDBOX_NAMESPACES).context(
        Step::Isolate,
        "unshare",
        format!("{:?}", SANDBOX_NAMESPACES),
    )?;

    for ns_type in NamespaceType::all() {
        if let Ok(inode) = get_namespace_inode(ns_type.proc_name()) {
            debug!("entered {} namespace {}", ns_type.proc_name(), inode);
        }
    }
    Ok(())
}

/// Inode of the calling process's namespace of the given kind
pub fn get_namespace_inode(ns_type: &str) -> Result<u64> {
    let path = format!("/proc/self/ns/{}", ns_type);
    let stat = std::fs::metadata(&path).precondition(Step::Isolate, "stat", &path)?;
    Ok(stat.ino())
}
