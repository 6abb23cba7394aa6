//! End-to-end construction tests
//!
//! Each scenario runs in a forked child: the pipeline pivots the root and
//! drops capabilities, which must never happen to the test runner itself.
//! They do NOT require root, but do need unprivileged user namespaces; a
//! child that cannot create them, or whose very first mount is refused,
//! exits with SKIP and the test passes.
//!
//! Sandbox roots that get finalized are tmpfs mounts made inside the
//! namespace. A bind of a host directory keeps the host's locked atime
//! mode, and the final noatime remount of `/` would be refused.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mkbox::core::CapabilitySet;
use mkbox::{Action, ActionList, AssemblyConfig, Sandbox, SandboxError, Step, Target};

const SKIP: i32 = 77;

fn in_child(child: impl FnOnce() -> i32) -> i32 {
    unsafe {
        let pid = libc::fork();
        assert!(pid >= 0, "fork failed: {}", std::io::Error::last_os_error());

        if pid == 0 {
            let code = child();
            libc::_exit(code);
        }

        let mut status: i32 = 0;
        libc::waitpid(pid, &mut status, 0);
        assert!(libc::WIFEXITED(status), "Child should exit normally");
        libc::WEXITSTATUS(status)
    }
}

fn report(name: &str, code: i32) {
    if code == SKIP {
        eprintln!("SKIP: {}: cannot build a sandbox on this host", name);
        return;
    }
    assert_eq!(code, 0, "{} failed in child (exit={})", name, code);
}

/// EPERM from the mount whose argument starts with `first_mount`
fn first_mount_refused(err: &SandboxError, first_mount: &str) -> bool {
    match err {
        SandboxError::Syscall {
            step: Step::Assemble,
            op: "mount",
            arg,
            ..
        } => arg.starts_with(first_mount) && err.raw_os_error() == Some(libc::EPERM),
        _ => false,
    }
}

/// Argument prefix of the tmpfs mount at `path`
fn tmpfs_mount_arg(path: &Path) -> String {
    format!("sandbox-dev, {}, ", path.display())
}

/// Argument of the recursive private remount of `/`
const MAKE_PRIVATE_ARG: &str = "/, MS_REC|MS_PRIVATE";

/// Sandbox root directory inside a fresh scratch dir
fn scratch_root() -> (tempfile::TempDir, PathBuf) {
    let scratch = tempfile::tempdir().unwrap();
    let root = scratch.path().join("root");
    fs::create_dir(&root).unwrap();
    (scratch, root)
}

fn roomy_tmpfs() -> AssemblyConfig {
    AssemblyConfig::default()
        .tmpfs_size_str("1M")
        .unwrap()
        .tmpfs_inodes(64)
}

#[test]
fn missing_sandbox_root_is_config_error() {
    let list = ActionList::new()
        .with(Action::BindMount {
            source: PathBuf::from("/usr"),
            destination: PathBuf::from("/srv/sbx/usr"),
        })
        .with(Action::SetUid { target: 1000 });
    let err = list.validate().unwrap_err();
    assert!(matches!(err, SandboxError::MissingSandboxRoot));
    assert!(err.is_config());
}

/// Assemble, pivot and drop privileges, then inspect the result from inside.
#[test]
fn finalized_root_hides_host_and_drops_privileges() {
    let (scratch, root) = scratch_root();
    let host_path = scratch.path().to_path_buf();

    let plan = ActionList::new()
        .with(Action::EphemeralMount { path: root.clone() })
        .with(Action::SetSandboxRoot { path: root.clone() })
        // Files can only be created in a namespace-owned tmpfs once the
        // creator's IDs are mapped, so remap first.
        .with(Action::SetUid { target: 1000 })
        .with(Action::SetGid { target: 1000 })
        .with(Action::MakeDirectory {
            path: root.join("marker"),
        })
        .with(Action::EphemeralMount {
            path: root.join("tmp"),
        })
        .with(Action::MakeDirectory {
            path: root.join("tmp/work"),
        })
        .with(Action::SetWorkingDirectory {
            path: PathBuf::from("/tmp/work"),
        })
        .validate()
        .unwrap();

    let code = in_child(move || {
        let sandbox = match Sandbox::isolate(plan, roomy_tmpfs()) {
            Ok(sandbox) => sandbox,
            Err(_) => return SKIP,
        };
        let sandbox = match sandbox.assemble() {
            Ok(sandbox) => sandbox,
            Err(e) if first_mount_refused(&e, &tmpfs_mount_arg(&root)) => return SKIP,
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        };
        let sandbox = match sandbox.finalize() {
            Ok(sandbox) => sandbox,
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        };

        if !Path::new("/marker").is_dir() {
            return 2;
        }
        if host_path.exists() || Path::new("/.oldroot").exists() {
            return 3;
        }
        if fs::write("/written-after-finalize", "x").is_ok() {
            return 4;
        }

        if sandbox.drop_privileges().is_err() {
            return 5;
        }
        if std::env::current_dir().ok().as_deref() != Some(Path::new("/tmp/work")) {
            return 6;
        }
        match CapabilitySet::current() {
            Ok(held) if held.is_empty() => {}
            _ => return 7,
        }
        let ids = unsafe { (libc::getuid(), libc::getgid()) };
        if ids != (1000, 1000) {
            return 8;
        }
        if fs::write("/tmp/work/scratch", "ok").is_err() {
            return 9;
        }
        0
    });
    report("finalized_root_hides_host_and_drops_privileges", code);
}

/// Each Delay action blocks for the configured duration, in list order.
#[test]
fn delay_actions_block_during_assembly() {
    let (_scratch, root) = scratch_root();
    let plan = ActionList::new()
        .with(Action::SetSandboxRoot { path: root.clone() })
        .with(Action::Delay)
        .with(Action::Delay)
        .validate()
        .unwrap();
    let config = AssemblyConfig::default().delay(Duration::from_millis(60));

    let code = in_child(move || {
        let sandbox = match Sandbox::isolate(plan, config) {
            Ok(sandbox) => sandbox,
            Err(_) => return SKIP,
        };
        let started = Instant::now();
        match sandbox.assemble() {
            Ok(_) => {}
            Err(e) if first_mount_refused(&e, MAKE_PRIVATE_ARG) => return SKIP,
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        }
        let elapsed = started.elapsed();
        if elapsed < Duration::from_millis(120) {
            return 2;
        }
        if elapsed > Duration::from_secs(10) {
            return 3;
        }
        0
    });
    report("delay_actions_block_during_assembly", code);
}

/// A second SetUid in one plan cannot rewrite the uid map and aborts the run.
#[test]
fn second_set_uid_aborts_assembly() {
    let (_scratch, root) = scratch_root();
    let plan = ActionList::new()
        .with(Action::SetSandboxRoot { path: root.clone() })
        .with(Action::SetUid { target: 1000 })
        .with(Action::SetUid { target: 2000 })
        .validate()
        .unwrap();

    let code = in_child(move || {
        let sandbox = match Sandbox::isolate(plan, AssemblyConfig::default()) {
            Ok(sandbox) => sandbox,
            Err(_) => return SKIP,
        };
        let err = match sandbox.assemble() {
            Ok(_) => return 1,
            Err(e) => e,
        };
        if first_mount_refused(&err, MAKE_PRIVATE_ARG) {
            return SKIP;
        }
        if !matches!(
            err,
            SandboxError::Syscall {
                step: Step::Remap,
                op: "write",
                ..
            }
        ) {
            eprintln!("{}", err);
            return 2;
        }
        if !err.to_string().contains("/proc/self/uid_map") {
            return 3;
        }
        // The first mapping stays in force.
        if unsafe { libc::getuid() } != 1000 {
            return 4;
        }
        0
    });
    report("second_set_uid_aborts_assembly", code);
}

/// The full pipeline ending in /bin/sh, which checks its environment and
/// exits 0 if everything is as expected.
#[test]
fn shell_runs_inside_sandbox() {
    if !Path::new("/bin/sh").exists() || !Path::new("/usr/bin/id").exists() {
        eprintln!("SKIP: shell_runs_inside_sandbox: no /bin/sh or /usr/bin/id");
        return;
    }
    let (_scratch, root) = scratch_root();

    let mut list = ActionList::new()
        .with(Action::EphemeralMount { path: root.clone() })
        .with(Action::SetSandboxRoot { path: root.clone() })
        .with(Action::SetUid { target: 1000 })
        .with(Action::SetGid { target: 1000 });
    for dir in ["/usr", "/bin", "/lib", "/lib64", "/sbin"] {
        if Path::new(dir).exists() {
            list.push(Action::BindMount {
                source: PathBuf::from(dir),
                destination: root.join(&dir[1..]),
            });
        }
    }
    let plan = list
        .with(Action::EphemeralMount {
            path: root.join("tmp"),
        })
        .with(Action::SetWorkingDirectory {
            path: PathBuf::from("/"),
        })
        .validate()
        .unwrap();

    let script = r#"
        [ "$(pwd)" = / ] || exit 10
        [ -x /usr/bin/id ] || exit 11
        [ "$(id -u):$(id -g)" = 1000:1000 ] || exit 12
        echo scratch > /tmp/scratch || exit 13
        if echo x > /rootfile; then exit 14; fi
        [ ! -e /.oldroot ] || exit 15
        if echo x > /usr/written; then exit 16; fi
        exit 0
    "#;
    let target = Target::new(["/bin/sh", "-c", script]).unwrap();

    let code = in_child(move || {
        let sandbox = match Sandbox::isolate(plan, roomy_tmpfs()) {
            Ok(sandbox) => sandbox,
            Err(_) => return SKIP,
        };
        let result = match sandbox.assemble() {
            Err(e) if first_mount_refused(&e, &tmpfs_mount_arg(&root)) => return SKIP,
            assembled => assembled
                .and_then(|s| s.finalize())
                .and_then(|s| s.drop_privileges())
                .and_then(|s| s.exec(&target)),
        };
        if let Err(e) = result {
            eprintln!("{}", e);
        }
        1
    });
    report("shell_runs_inside_sandbox", code);
}
