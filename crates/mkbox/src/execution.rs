//! Target program resolution and process image replacement

use std::convert::Infallible;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::info;
use mkbox_core::{Result, SandboxError, Step, SyscallResultExt};
use nix::errno::Errno;
use nix::unistd::{AccessFlags, access, execv};

const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Program to hand the process over to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Executable to run; defaults to `argv[0]`
    pub binary: Option<PathBuf>,
    /// Full argument vector, including `argv[0]`. Passed to the kernel
    /// byte for byte.
    pub argv: Vec<OsString>,
}

impl Target {
    pub fn new<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            return Err(SandboxError::InvalidConfig(
                "no program to run".to_string(),
            ));
        }
        Ok(Self { binary: None, argv })
    }

    /// Run `binary` instead of looking up `argv[0]`
    pub fn binary(mut self, binary: impl AsRef<Path>) -> Self {
        self.binary = Some(binary.as_ref().to_path_buf());
        self
    }

    /// Resolve the executable path the way `execvp` would, but against the
    /// filesystem visible now (after the pivot, the sandbox root).
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }
        let program = self.argv[0].as_os_str();
        if program.as_bytes().contains(&b'/') {
            return Ok(PathBuf::from(program));
        }

        let path_value = std::env::var_os("PATH").unwrap_or_else(|| DEFAULT_PATH.into());
        resolve_in_path(program, &path_value)
    }

    /// Replace the process image. Only returns on failure.
    pub(crate) fn exec(&self) -> Result<Infallible> {
        let path = self.resolve()?;
        let c_path = to_cstring(path.as_os_str().as_bytes())?;
        let c_argv = self
            .argv
            .iter()
            .map(|arg| to_cstring(arg.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        info!("exec: {} {:?}", path.display(), &self.argv[1..]);
        execv(&c_path, &c_argv).context(Step::Handoff, "execv", path.display())
    }
}

fn resolve_in_path(program: &OsStr, path_value: &OsStr) -> Result<PathBuf> {
    for entry in path_value.as_bytes().split(|b| *b == b':') {
        let dir = if entry.is_empty() { b".".as_slice() } else { entry };
        let candidate = Path::new(OsStr::from_bytes(dir)).join(program);

        if access(&candidate, AccessFlags::X_OK).is_ok() {
            return Ok(candidate);
        }
    }

    Err(Errno::ENOENT).context(Step::Handoff, "execv", program.to_string_lossy())
}

fn to_cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| {
        SandboxError::InvalidConfig(format!(
            "argument contains NUL byte: {:?}",
            String::from_utf8_lossy(bytes)
        ))
    })
}
