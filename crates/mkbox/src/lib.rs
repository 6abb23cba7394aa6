//! mkbox: build an isolated root and run a program inside it
//!
//! The process detaches into new mount, UTS, IPC, user and network
//! namespaces, assembles a filesystem view under a sandbox root from an
//! ordered list of actions, remaps its identity, pivots into the new root,
//! drops every capability and finally `execv`s the target program.
//!
//! # Example
//!
//! ```ignore
//! use mkbox::{Action, ActionList, AssemblyConfig, Target};
//!
//! let plan = ActionList::new()
//!     .with(Action::EphemeralMount { path: "/srv/sbx".into() })
//!     .with(Action::SetSandboxRoot { path: "/srv/sbx".into() })
//!     .with(Action::SetUid { target: 1000 })
//!     .with(Action::SetGid { target: 1000 })
//!     .with(Action::BindMount { source: "/usr".into(), destination: "/srv/sbx/usr".into() })
//!     .with(Action::EphemeralMount { path: "/srv/sbx/tmp".into() })
//!     .with(Action::SetWorkingDirectory { path: "/".into() })
//!     .validate()?;
//!
//! let target = Target::new(["/bin/sh"])?;
//! mkbox::run(plan, AssemblyConfig::default(), &target)?;
//! ```

pub mod action;
pub mod config;
pub mod controller;
pub mod execution;

pub use mkbox_core::{
    self as core, Result, SandboxError, Step, capabilities::SystemCapabilities,
};
pub use mkbox_fs::TmpfsConfig;
pub use mkbox_namespace::{NamespaceType, SANDBOX_NAMESPACES};

pub use action::{Action, ActionList, Plan};
pub use config::{AssemblyConfig, DEFAULT_DELAY};
pub use controller::{Assembled, Finalized, Isolated, Sandbox, Unprivileged, run};
pub use execution::Target;
