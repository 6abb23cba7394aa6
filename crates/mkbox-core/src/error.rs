//! Error types for sandbox construction

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Isolate,
    Assemble,
    Remap,
    Finalize,
    Handoff,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Isolate => write!(f, "namespace isolation"),
            Step::Assemble => write!(f, "filesystem assembly"),
            Step::Remap => write!(f, "identity remapping"),
            Step::Finalize => write!(f, "root finalization"),
            Step::Handoff => write!(f, "handoff"),
        }
    }
}

/// Errors that can occur while building the sandbox.
///
/// Every variant is fatal: the caller is expected to report it and exit.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("no sandbox root set (a SetSandboxRoot action is mandatory)")]
    MissingSandboxRoot,

    #[error("sandbox root set more than once: {0}")]
    DuplicateSandboxRoot(String),

    #[error("could not parse {0}")]
    InvalidId(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{step}: {op}({arg}) failed: {source}")]
    Precondition {
        step: Step,
        op: &'static str,
        arg: String,
        #[source]
        source: io::Error,
    },

    #[error("{step}: {op}({arg}) failed: {source}")]
    Syscall {
        step: Step,
        op: &'static str,
        arg: String,
        #[source]
        source: io::Error,
    },
}

impl SandboxError {
    /// True for errors raised before any kernel state was touched
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SandboxError::MissingSandboxRoot
                | SandboxError::DuplicateSandboxRoot(_)
                | SandboxError::InvalidId(_)
                | SandboxError::UnknownAction(_)
                | SandboxError::InvalidConfig(_)
        )
    }

    /// Underlying OS error number, if the error came from the kernel
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            SandboxError::Precondition { source, .. } | SandboxError::Syscall { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }
}

/// Attach the failing operation to a kernel or I/O result.
pub trait SyscallResultExt<T> {
    fn context(self, step: Step, op: &'static str, arg: impl fmt::Display) -> Result<T>;

    /// Same as [`context`](Self::context) but classifies the failure as a
    /// precondition on the action's input rather than a kernel operation.
    fn precondition(self, step: Step, op: &'static str, arg: impl fmt::Display) -> Result<T>;
}

impl<T, E: Into<io::Error>> SyscallResultExt<T> for std::result::Result<T, E> {
    fn context(self, step: Step, op: &'static str, arg: impl fmt::Display) -> Result<T> {
        self.map_err(|e| SandboxError::Syscall {
            step,
            op,
            arg: arg.to_string(),
            source: e.into(),
        })
    }

    fn precondition(self, step: Step, op: &'static str, arg: impl fmt::Display) -> Result<T> {
        self.map_err(|e| SandboxError::Precondition {
            step,
            op,
            arg: arg.to_string(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_missing_root_display() {
        let err = SandboxError::MissingSandboxRoot;
        assert!(err.to_string().contains("SetSandboxRoot"));
        assert!(err.is_config());
    }

    #[test]
    fn test_syscall_error_names_operation() {
        let res: nix::Result<()> = Err(Errno::EPERM);
        let err = res.context(Step::Assemble, "mount", "/srv/sbx").unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("filesystem assembly: mount(/srv/sbx) failed"));
        assert!(msg.contains("os error 1"));
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));
        assert!(!err.is_config());
    }

    #[test]
    fn test_precondition_from_io() {
        let res: io::Result<()> = Err(io::Error::from_raw_os_error(libc::ENOENT));
        let err = res.precondition(Step::Assemble, "stat", "/missing").unwrap_err();
        assert!(matches!(err, SandboxError::Precondition { op: "stat", .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Finalize.to_string(), "root finalization");
        assert_eq!(Step::Handoff.to_string(), "handoff");
    }

    #[test]
    fn test_invalid_id() {
        let err = SandboxError::InvalidId("abc".to_string());
        assert_eq!(err.to_string(), "could not parse abc");
    }
}
