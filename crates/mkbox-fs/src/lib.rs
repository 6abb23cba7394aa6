//! mkbox-fs: Filesystem assembly for mkbox
//!
//! Provides the mount primitives used to assemble a sandbox root (bind
//! mounts, read-only remounts, capped tmpfs scratch space) and the final
//! pivot that makes it the process root.

pub mod filesystem;
pub mod pivot;
pub mod volumes;

pub use filesystem::{bind_mount, make_directory, prepare_sandbox_root, remount_readonly};
pub use pivot::finalize_root;
pub use volumes::{TmpfsConfig, mount_tmpfs};
