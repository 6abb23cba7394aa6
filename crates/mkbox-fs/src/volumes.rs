//! Size-capped tmpfs scratch space inside the sandbox

use log::info;
use mkbox_core::{Result, SandboxError, Step, SyscallResultExt};
use nix::mount::{MsFlags, mount};
use std::path::Path;

use crate::filesystem::ensure_directory;

/// Source name shown for the scratch mounts in /proc/mounts
const TMPFS_SOURCE: &str = "sandbox-dev";

/// tmpfs capacity and permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmpfsConfig {
    /// Capacity in bytes
    pub size: u64,
    /// Maximum number of inodes
    pub nr_inodes: u64,
    /// Permissions of the tmpfs root directory
    pub mode: u32,
}

impl Default for TmpfsConfig {
    fn default() -> Self {
        Self {
            size: 64 * 1024,
            nr_inodes: 16,
            mode: 0o755,
        }
    }
}

impl TmpfsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(SandboxError::InvalidConfig(
                "tmpfs size must be non-zero (0 means unlimited)".to_string(),
            ));
        }
        if self.nr_inodes == 0 {
            return Err(SandboxError::InvalidConfig(
                "tmpfs inode cap must be non-zero (0 means unlimited)".to_string(),
            ));
        }
        if self.mode > 0o7777 {
            return Err(SandboxError::InvalidConfig(format!(
                "tmpfs mode out of range: {:o}",
                self.mode
            )));
        }
        Ok(())
    }

    /// Mount data string, e.g. `size=65536,nr_inodes=16,mode=755`
    pub fn mount_options(&self) -> String {
        format!(
            "size={},nr_inodes={},mode={:o}",
            self.size, self.nr_inodes, self.mode
        )
    }

    pub fn mount_flags(&self) -> MsFlags {
        MsFlags::MS_NOSUID | MsFlags::MS_NOEXEC | MsFlags::MS_NOATIME
    }
}

/// Mount a capped tmpfs at `path`, creating the directory if needed.
pub fn mount_tmpfs(path: &Path, config: &TmpfsConfig) -> Result<()> {
    info!("tmp: {}", path.display());
    config.validate()?;
    ensure_directory(path)?;

    let options = config.mount_options();
    mount(
        Some(TMPFS_SOURCE),
        path,
        Some("tmpfs"),
        config.mount_flags(),
        Some(options.as_str()),
    )
    .context(
        Step::Assemble,
        "mount",
        format!("{}, {}, tmpfs, {}", TMPFS_SOURCE, path.display(), options),
    )
}
