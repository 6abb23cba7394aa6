//! Mount primitives for assembling the sandbox root
//!
//! Every function here operates on the calling process's mount namespace and
//! must only be called after the process has unshared one.

use log::{debug, info};
use mkbox_core::{Result, Step, SyscallResultExt};
use nix::mount::{MsFlags, mount};
use nix::sys::statvfs::{FsFlags, statvfs};
use nix::sys::stat::Mode;
use nix::unistd::{chdir, mkdir};
use std::fs::{self, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Flags applied to every read-only remount
pub const READONLY_REMOUNT_FLAGS: MsFlags = MsFlags::MS_RDONLY
    .union(MsFlags::MS_NOSUID)
    .union(MsFlags::MS_REMOUNT)
    .union(MsFlags::MS_NOATIME)
    .union(MsFlags::MS_BIND);

const NONE: Option<&str> = None;

fn dir_mode() -> Mode {
    Mode::from_bits_truncate(0o755)
}

/// Stop mount events propagating between this namespace and the host's
/// (`mount --make-rprivate /`).
pub fn make_tree_private() -> Result<()> {
    mount(NONE, "/", NONE, MsFlags::MS_REC | MsFlags::MS_PRIVATE, NONE).context(
        Step::Assemble,
        "mount",
        "/, MS_REC|MS_PRIVATE",
    )
}

/// Turn `path` into a mount point of its own and step inside it, ready to
/// become the new root.
pub fn prepare_sandbox_root(path: &Path) -> Result<()> {
    info!("root: {}", path.display());
    make_tree_private()?;

    mount(
        Some(path),
        path,
        NONE,
        MsFlags::MS_BIND | MsFlags::MS_NOSUID,
        NONE,
    )
    .context(Step::Assemble, "mount", format!("{0}, {0}, MS_BIND|MS_NOSUID", path.display()))?;

    chdir(path).context(Step::Assemble, "chdir", path.display())
}

/// Bind `source` onto `destination`, creating the destination first.
///
/// Directories are bound recursively onto a directory; anything else is
/// bound onto an empty regular file.
pub fn bind_mount(source: &Path, destination: &Path) -> Result<()> {
    info!("mount: {} => {}", source.display(), destination.display());

    let meta = fs::metadata(source).precondition(Step::Assemble, "stat", source.display())?;

    if meta.is_dir() {
        ensure_directory(destination)?;
        mount(
            Some(source),
            destination,
            NONE,
            MsFlags::MS_REC | MsFlags::MS_BIND,
            NONE,
        )
        .context(
            Step::Assemble,
            "mount",
            format!("{}, {}, MS_REC|MS_BIND", source.display(), destination.display()),
        )
    } else {
        ensure_file(destination)?;
        mount(Some(source), destination, NONE, MsFlags::MS_BIND, NONE).context(
            Step::Assemble,
            "mount",
            format!("{}, {}, MS_BIND", source.display(), destination.display()),
        )
    }
}

/// Re-apply the bind at `path` read-only. The bind must already exist: the
/// kernel ignores MS_RDONLY on the initial bind.
pub fn remount_readonly(path: &Path) -> Result<()> {
    info!("ro: {}", path.display());
    remount_bind_readonly(path, Step::Assemble)
}

/// Flags for a read-only bind remount of `path`, keeping the `nodev` and
/// `noexec` bits the mount already carries. Inside a user namespace those
/// bits are locked and a remount that clears them fails with EPERM.
///
/// The atime mode is locked the same way, so remounting a bind of a host
/// `relatime` mount fails with EPERM. That failure is fatal.
pub fn readonly_remount_flags(path: &Path, step: Step) -> Result<MsFlags> {
    let current = statvfs(path)
        .context(step, "statvfs", path.display())?
        .flags();
    let mut flags = READONLY_REMOUNT_FLAGS;
    if current.contains(FsFlags::ST_NODEV) {
        flags |= MsFlags::MS_NODEV;
    }
    if current.contains(FsFlags::ST_NOEXEC) {
        flags |= MsFlags::MS_NOEXEC;
    }
    Ok(flags)
}

pub(crate) fn remount_bind_readonly(path: &Path, step: Step) -> Result<()> {
    let flags = readonly_remount_flags(path, step)?;
    debug!("remount {} {:?}", path.display(), flags);
    mount(Some(path), path, NONE, flags, NONE).context(
        step,
        "mount",
        format!("{0}, {0}, {1:?}", path.display(), flags),
    )
}

/// Plain mkdir; fails if `path` already exists.
pub fn make_directory(path: &Path) -> Result<()> {
    info!("mkdir: {}", path.display());
    mkdir(path, dir_mode()).context(Step::Assemble, "mkdir", path.display())
}

/// Create `path` as a directory unless something is already there.
pub(crate) fn ensure_directory(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        return Ok(());
    }
    debug!("creating mount point {}", path.display());
    mkdir(path, dir_mode()).context(Step::Assemble, "mkdir", path.display())
}

/// Create `path` as an empty file to bind a file onto. Existing content is
/// never truncated.
fn ensure_file(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .mode(0o666)
        .open(path)
        .map(drop)
        .context(Step::Assemble, "open", format!("{}, O_WRONLY|O_CREAT", path.display()))
}
