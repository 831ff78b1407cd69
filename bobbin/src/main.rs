use std::path::PathBuf;
use std::process::ExitCode;

use spindle::error;
use spindle::error::{Chainable, Result};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::tasks::Context;

mod config;
mod tasks;

pub const CONFIG_FILE: &str = "spindle.toml";

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Runs the asset tasks of a static site.
        cmd bobbin {
            /// Tasks to run, in order. Runs `default` when none are given.
            repeated tasks: String
            /// Project root. Defaults to the current directory.
            optional -C, --root root: PathBuf
            /// Configuration file, relative to the root. Defaults to `spindle.toml`.
            optional -c, --config config: PathBuf
            /// Dev server port. `0` picks a free port.
            optional -p, --port port: u16
            /// Don't open a browser when the dev server starts.
            optional --no-open
            /// Use OS file notifications instead of polling.
            optional --no-poll
            /// Log more. Repeat for even more.
            repeated -v, --verbose
            /// Only log warnings and errors.
            optional -q, --quiet
            /// List the available tasks and exit.
            optional -l, --list
        }
    }
}

pub fn main() -> ExitCode {
    let flags = flags::Bobbin::from_env_or_exit();
    init_logging(&flags);

    match run(flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(flags: &flags::Bobbin) {
    let level = match (flags.quiet, flags.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,bobbin={level},spindle={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(flags: flags::Bobbin) -> Result<()> {
    let root = flags.root.unwrap_or_else(|| PathBuf::from("."));
    let root = root.canonicalize()
        .chain_with(|| error!("invalid project root", "root" => root.display()))?;

    let mut config = Config::load(&root, flags.config.as_deref())?;
    if let Some(port) = flags.port {
        config.server.port = port;
    }

    config.server.open &= !flags.no_open;
    config.server.poll &= !flags.no_poll;

    let registry = tasks::registry();
    if flags.list {
        for name in registry.names() {
            println!("{name:<16}{}", registry.describe(name).unwrap_or_default());
        }

        return Ok(());
    }

    let tasks = match flags.tasks.is_empty() {
        true => vec!["default".to_string()],
        false => flags.tasks,
    };

    let cx = Context::new(root, config);
    tasks.iter().try_for_each(|task| registry.run(task, &cx))
}
