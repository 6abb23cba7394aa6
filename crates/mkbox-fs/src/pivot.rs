//! Root finalization: pivot into the assembled root and drop the old one

use log::{debug, info};
use mkbox_core::{Result, Step, SyscallResultExt};
use nix::mount::{MntFlags, umount2};
use nix::sys::stat::Mode;
use nix::unistd::{chdir, mkdir, pivot_root};
use std::fs;
use std::path::Path;

use crate::filesystem::remount_bind_readonly;

/// Rendezvous directory for the old root, relative to the new root
pub const OLD_ROOT: &str = ".oldroot";

/// Make the current working directory the process root.
///
/// The caller must already be inside the bind-mounted sandbox root. After
/// this returns nothing under the old root is reachable, and `/` is mounted
/// read-only, nosuid, noatime. There is no way back.
///
/// Fails with EPERM when the root is a bind of a host mount whose atime
/// mode is locked to something other than noatime.
pub fn finalize_root() -> Result<()> {
    info!("pivot: . => /");
    mkdir(OLD_ROOT, Mode::from_bits_truncate(0o755)).context(Step::Finalize, "mkdir", OLD_ROOT)?;

    pivot_root(".", OLD_ROOT).context(Step::Finalize, "pivot_root", format!("., {}", OLD_ROOT))?;
    chdir("/").context(Step::Finalize, "chdir", "/")?;

    let old_root = format!("/{}", OLD_ROOT);
    umount2(old_root.as_str(), MntFlags::MNT_DETACH).context(
        Step::Finalize,
        "umount2",
        format!("{}, MNT_DETACH", old_root),
    )?;
    fs::remove_dir(&old_root).context(Step::Finalize, "rmdir", &old_root)?;
    debug!("old root detached");

    remount_bind_readonly(Path::new("/"), Step::Finalize)
}
