//! mkbox - build an isolated root and run a program inside it

mod cli;
mod commands;
mod logging;
mod runner;

use clap::{CommandFactory, FromArgMatches};
use cli::Cli;
use commands::check_requirements;
use console::style;
use runner::{RunConfig, run_sandbox};

fn main() {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    logging::init_logger(cli.quiet, cli.verbose);

    if cli.check {
        if !check_requirements() {
            std::process::exit(1);
        }
        return;
    }

    let result = cli::ordered_actions(&matches).and_then(|actions| {
        run_sandbox(RunConfig {
            plan: cli.plan,
            actions,
            command: cli.command,
            binary: cli.binary,
            tmpfs_size: cli.tmpfs_size,
            tmpfs_inodes: cli.tmpfs_inodes,
            delay_secs: cli.delay_secs,
        })
    });

    if let Err(e) = result {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
