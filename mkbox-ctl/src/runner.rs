use log::{debug, info};
use mkbox::{ActionList, AssemblyConfig, SandboxError, Target};
use std::convert::Infallible;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for sandbox construction
pub struct RunConfig {
    pub plan: Option<PathBuf>,
    pub actions: ActionList,
    pub command: Vec<OsString>,
    pub binary: Option<PathBuf>,
    pub tmpfs_size: Option<String>,
    pub tmpfs_inodes: Option<u64>,
    pub delay_secs: Option<u64>,
}

/// Build the sandbox and hand off to the program. Only returns on failure.
pub fn run_sandbox(config: RunConfig) -> mkbox::Result<Infallible> {
    let actions = combined_actions(config.plan.as_deref(), config.actions)?;
    let plan = actions.validate()?;
    debug!(
        "{} actions, root {}",
        plan.actions().len(),
        plan.sandbox_root().display()
    );

    let assembly = assembly_config(
        config.tmpfs_size.as_deref(),
        config.tmpfs_inodes,
        config.delay_secs,
    )?;

    let mut target = Target::new(config.command)?;
    if let Some(binary) = config.binary {
        debug!("Using binary: {}", binary.display());
        target = target.binary(binary);
    }

    mkbox::run(plan, assembly, &target)
}

/// Plan-file actions first, then the command-line ones
fn combined_actions(plan: Option<&Path>, flags: ActionList) -> mkbox::Result<ActionList> {
    let mut actions = match plan {
        Some(path) => load_plan(path)?,
        None => ActionList::new(),
    };
    actions.extend(flags);
    Ok(actions)
}

fn load_plan(path: &Path) -> mkbox::Result<ActionList> {
    info!("plan: {}", path.display());
    let text = fs::read_to_string(path)
        .map_err(|e| SandboxError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    ActionList::from_json(&text)
}

fn assembly_config(
    tmpfs_size: Option<&str>,
    tmpfs_inodes: Option<u64>,
    delay_secs: Option<u64>,
) -> mkbox::Result<AssemblyConfig> {
    let mut config = AssemblyConfig::default();

    if let Some(size) = tmpfs_size {
        debug!("Overriding tmpfs size: {}", size);
        config = config.tmpfs_size_str(size)?;
    }
    if let Some(inodes) = tmpfs_inodes {
        debug!("Overriding tmpfs inodes: {}", inodes);
        config = config.tmpfs_inodes(inodes);
    }
    if let Some(secs) = delay_secs {
        config = config.delay(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}
