//! mkbox-namespace: Linux namespace isolation with user namespace ID mapping
//!
//! Detaches the process into new mount, UTS, IPC, user and network
//! namespaces, and writes the single-row UID/GID maps that give the
//! sandbox its inner identity.

pub mod config;
pub mod user_ns;

pub use config::{NamespaceType, SANDBOX_NAMESPACES, unshare_all};
pub use user_ns::{IdAxis, IdMapping};
