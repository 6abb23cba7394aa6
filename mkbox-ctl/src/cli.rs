use clap::{ArgAction, ArgMatches, Parser};
use mkbox::core::util::parse_id;
use mkbox::{Action, ActionList, SandboxError};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mkbox")]
#[command(version, about = "Build an isolated root and run a program inside it", long_about = None)]
#[command(after_help = "Actions run in the order they are given on the command line.

EXAMPLES:
    # Minimal shell on a scratch root with /usr and /bin from the host
    mkbox -t /srv/sbx -s /srv/sbx -u 1000 -g 1000 -b /usr=/srv/sbx/usr \\
          -b /bin=/srv/sbx/bin -t /srv/sbx/tmp -d / /bin/sh

    # Actions from a plan file, then extra flags
    mkbox --plan box.json -b $PWD=/srv/sbx/work -d /work -- make test

    # Report host support
    mkbox --check
")]
pub struct Cli {
    /// Directory that becomes the new root (exactly once)
    #[arg(short = 's', long, value_name = "DIR", action = ArgAction::Append)]
    pub sandbox_root: Vec<PathBuf>,

    /// Bind-mount SRC onto DST
    #[arg(short = 'b', long, value_name = "SRC=DST", action = ArgAction::Append)]
    pub bind: Vec<String>,

    /// Mount a small tmpfs at DIR
    #[arg(short = 't', long, value_name = "DIR", action = ArgAction::Append)]
    pub tmpfs: Vec<PathBuf>,

    /// Remount an earlier bind read-only
    #[arg(short = 'r', long, value_name = "DIR", action = ArgAction::Append)]
    pub remount_ro: Vec<PathBuf>,

    /// Create a directory
    #[arg(short = 'D', long, value_name = "DIR", action = ArgAction::Append)]
    pub mkdir: Vec<PathBuf>,

    /// UID inside the sandbox
    #[arg(short = 'u', long, value_name = "UID", action = ArgAction::Append)]
    pub uid: Vec<String>,

    /// GID inside the sandbox
    #[arg(short = 'g', long, value_name = "GID", action = ArgAction::Append)]
    pub gid: Vec<String>,

    /// Working directory inside the sandbox
    #[arg(short = 'd', long, value_name = "DIR", action = ArgAction::Append)]
    pub workdir: Vec<PathBuf>,

    /// Pause during assembly (see --delay-secs)
    #[arg(
        short = 'Z',
        long,
        action = ArgAction::Append,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        hide_possible_values = true
    )]
    pub delay: Vec<bool>,

    /// Read actions from a JSON plan; they run before any action flags
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Executable to run instead of looking up PROGRAM
    #[arg(short = 'B', long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Capacity of every tmpfs (64k, 1M)
    #[arg(long, value_name = "SIZE")]
    pub tmpfs_size: Option<String>,

    /// Inode limit of every tmpfs
    #[arg(long, value_name = "COUNT")]
    pub tmpfs_inodes: Option<u64>,

    /// Length of each -Z pause
    #[arg(long, value_name = "SECONDS")]
    pub delay_secs: Option<u64>,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Check sandbox requirements
    #[arg(long)]
    pub check: bool,

    /// Program and its arguments
    #[arg(
        value_name = "PROGRAM",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "check"
    )]
    pub command: Vec<OsString>,
}

/// Rebuild the action flags in command-line order.
///
/// clap groups values per argument, so the command-line interleaving is
/// recovered from each value's index.
pub fn ordered_actions(matches: &ArgMatches) -> mkbox::Result<ActionList> {
    let mut indexed: Vec<(usize, Action)> = Vec::new();

    for (index, path) in indexed_values::<PathBuf>(matches, "sandbox_root") {
        indexed.push((index, Action::SetSandboxRoot { path }));
    }
    for (index, spec) in indexed_values::<String>(matches, "bind") {
        let (source, destination) = parse_bind(&spec)?;
        indexed.push((
            index,
            Action::BindMount {
                source,
                destination,
            },
        ));
    }
    for (index, path) in indexed_values::<PathBuf>(matches, "tmpfs") {
        indexed.push((index, Action::EphemeralMount { path }));
    }
    for (index, path) in indexed_values::<PathBuf>(matches, "remount_ro") {
        indexed.push((index, Action::ReadOnlyRemount { path }));
    }
    for (index, path) in indexed_values::<PathBuf>(matches, "mkdir") {
        indexed.push((index, Action::MakeDirectory { path }));
    }
    for (index, value) in indexed_values::<String>(matches, "uid") {
        indexed.push((index, Action::SetUid { target: parse_id(&value)? }));
    }
    for (index, value) in indexed_values::<String>(matches, "gid") {
        indexed.push((index, Action::SetGid { target: parse_id(&value)? }));
    }
    for (index, path) in indexed_values::<PathBuf>(matches, "workdir") {
        indexed.push((index, Action::SetWorkingDirectory { path }));
    }
    for (index, enabled) in indexed_values::<bool>(matches, "delay") {
        if enabled {
            indexed.push((index, Action::Delay));
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, action)| action).collect())
}

fn indexed_values<T>(matches: &ArgMatches, id: &str) -> Vec<(usize, T)>
where
    T: Clone + Send + Sync + 'static,
{
    match (matches.indices_of(id), matches.get_many::<T>(id)) {
        (Some(indices), Some(values)) => indices.zip(values.cloned()).collect(),
        _ => Vec::new(),
    }
}

fn parse_bind(spec: &str) -> mkbox::Result<(PathBuf, PathBuf)> {
    match spec.split_once('=') {
        Some((source, destination)) if !source.is_empty() && !destination.is_empty() => {
            Ok((PathBuf::from(source), PathBuf::from(destination)))
        }
        Some(_) => Err(SandboxError::InvalidConfig(format!(
            "bind {:?}: both sides of '=' are required",
            spec
        ))),
        None => Err(SandboxError::InvalidConfig(format!(
            "bind {:?}: argument must have '='",
            spec
        ))),
    }
}
