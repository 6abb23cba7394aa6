//! mkbox-core: shared types, errors, and privilege handling for mkbox
//!
//! This crate provides the foundational pieces used by the other mkbox crates:
//! - Error types, the [`Step`] that produced them, and the Result alias
//! - Identity helpers (outer UID/GID, numeric ID and size parsing)
//! - Host capability detection (root, unprivileged user namespaces)
//! - Capability set inspection and dropping

pub mod capabilities;
pub mod error;
pub mod privilege;
pub mod util;

pub use error::{Result, SandboxError, Step, SyscallResultExt};
pub use privilege::CapabilitySet;
pub use util::OuterIdentity;
