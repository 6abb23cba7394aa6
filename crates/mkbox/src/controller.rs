//! Sandbox construction pipeline
//!
//! Each kernel-state mutation consumes the current [`Sandbox`] token and
//! returns one for the next stage:
//!
//! ```text
//! Sandbox<Isolated> --assemble--> Sandbox<Assembled> --finalize--> Sandbox<Finalized>
//!     --drop_privileges--> Sandbox<Unprivileged> --exec--> (target program)
//! ```
//!
//! so calling them out of order does not compile. There is no way back from
//! any stage: on error the caller reports and exits, and the kernel reclaims
//! everything.

use std::convert::Infallible;
use std::marker::PhantomData;
use std::thread;

use log::{debug, info};
use mkbox_core::{CapabilitySet, OuterIdentity, Result, SandboxError, Step, SyscallResultExt};
use mkbox_fs::{
    bind_mount, finalize_root, make_directory, mount_tmpfs, prepare_sandbox_root,
    remount_readonly,
};
use mkbox_namespace::{unshare_all, user_ns};
use nix::unistd::chdir;

use crate::action::{Action, Plan};
use crate::config::AssemblyConfig;
use crate::execution::Target;

/// Namespaces created; nothing mounted yet
#[derive(Debug)]
pub struct Isolated;

/// Every action ran and the sandbox root is set
#[derive(Debug)]
pub struct Assembled;

/// The sandbox root is now `/`
#[derive(Debug)]
pub struct Finalized;

/// Capabilities cleared; only the handoff is left
#[derive(Debug)]
pub struct Unprivileged;

/// Single-owner token for the process-wide sandbox state
#[derive(Debug)]
pub struct Sandbox<S> {
    plan: Plan,
    config: AssemblyConfig,
    outer: OuterIdentity,
    _state: PhantomData<S>,
}

impl<S> Sandbox<S> {
    fn advance<T>(self) -> Sandbox<T> {
        Sandbox {
            plan: self.plan,
            config: self.config,
            outer: self.outer,
            _state: PhantomData,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// The invoking user's identity, captured before isolation
    pub fn outer_identity(&self) -> OuterIdentity {
        self.outer
    }
}

impl Sandbox<Isolated> {
    /// Detach into new namespaces. Must be the first privileged operation,
    /// and the process must be single-threaded.
    pub fn isolate(plan: Plan, config: AssemblyConfig) -> Result<Self> {
        config.validate()?;
        let outer = OuterIdentity::current();
        debug!("outer identity {}:{}", outer.uid, outer.gid);

        unshare_all()?;
        Ok(Sandbox {
            plan,
            config,
            outer,
            _state: PhantomData,
        })
    }

    /// Run every action in list order. Identity actions are applied where
    /// they appear; the working directory is deferred to
    /// [`Sandbox::drop_privileges`].
    pub fn assemble(self) -> Result<Sandbox<Assembled>> {
        let mut root_set = false;

        for action in self.plan.actions() {
            debug!("action: {:?}", action);
            match action {
                Action::SetSandboxRoot { path } => {
                    prepare_sandbox_root(path)?;
                    root_set = true;
                }
                Action::BindMount {
                    source,
                    destination,
                } => bind_mount(source, destination)?,
                Action::EphemeralMount { path } => mount_tmpfs(path, &self.config.tmpfs)?,
                Action::ReadOnlyRemount { path } => remount_readonly(path)?,
                Action::MakeDirectory { path } => make_directory(path)?,
                Action::SetUid { target } => user_ns::remap_uid(*target, self.outer.uid)?,
                Action::SetGid { target } => user_ns::remap_gid(*target, self.outer.gid)?,
                Action::SetWorkingDirectory { .. } => {}
                Action::Delay => {
                    info!("delay: {:?}", self.config.delay);
                    thread::sleep(self.config.delay);
                }
            }
        }

        if !root_set {
            return Err(SandboxError::MissingSandboxRoot);
        }
        Ok(self.advance())
    }
}

impl Sandbox<Assembled> {
    /// Pivot into the sandbox root and detach the host root.
    pub fn finalize(self) -> Result<Sandbox<Finalized>> {
        finalize_root()?;
        Ok(self.advance())
    }
}

impl Sandbox<Finalized> {
    /// Enter the requested working directory, then clear every capability.
    pub fn drop_privileges(self) -> Result<Sandbox<Unprivileged>> {
        if let Some(dir) = self.plan.working_directory() {
            info!("cwd: {}", dir.display());
            chdir(dir).context(Step::Handoff, "chdir", dir.display())?;
        }

        if let Ok(caps) = CapabilitySet::current() {
            debug!("dropping capabilities {}", caps);
        }
        mkbox_core::privilege::drop_all()?;
        Ok(self.advance())
    }
}

impl Sandbox<Unprivileged> {
    /// Replace the process image with `target`. Only returns on failure.
    pub fn exec(self, target: &Target) -> Result<Infallible> {
        target.exec()
    }
}

/// Run the whole pipeline and hand off to `target`.
pub fn run(plan: Plan, config: AssemblyConfig, target: &Target) -> Result<Infallible> {
    Sandbox::isolate(plan, config)?
        .assemble()?
        .finalize()?
        .drop_privileges()?
        .exec(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionList;
    use std::path::PathBuf;

    #[test]
    fn test_invalid_config_fails_before_isolation() {
        let plan = ActionList::new()
            .with(Action::SetSandboxRoot {
                path: PathBuf::from("/srv/sbx"),
            })
            .validate()
            .unwrap();
        let config = AssemblyConfig::default().tmpfs_inodes(0);
        let err = Sandbox::isolate(plan, config).unwrap_err();
        assert!(err.is_config());
    }
}
