//! Ferret CLI binary: the single-shot query tool and the search daemon.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, bail};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use ferret::cli::{SearchArgs, service_request};
use ferret::config::{DaemonType, SearchConfig};
use ferret::daemon::{self, PidFile, SearchDaemon};
use ferret::error::{EXIT_NO_READ_INDEX, EXIT_OTHER, EXIT_SUCCESS, EXIT_USAGE, FerretError};
use ferret::index::IndexFile;

/// Context attached when the index file cannot be opened.
#[derive(Debug)]
struct UnreadableIndex(PathBuf);

impl fmt::Display for UnreadableIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not read index file {}", self.0.display())
    }
}

fn main() {
    let args = match SearchArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            process::exit(code);
        }
    };

    // Set up logging/verbosity based on args
    let log_level = match args.verbosity() {
        0 => LevelFilter::Error, // Quiet mode
        1 => LevelFilter::Warn,  // Default
        2 => LevelFilter::Info,  // Verbose
        _ => LevelFilter::Debug, // Very verbose (3+)
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = run(args) {
        eprintln!("ferret: {e:#}");
        process::exit(exit_code(&e));
    }
}

fn exit_code(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<UnreadableIndex>().is_some() {
        return EXIT_NO_READ_INDEX;
    }
    e.downcast_ref::<FerretError>()
        .map_or(EXIT_OTHER, FerretError::exit_code)
}

fn run(args: SearchArgs) -> anyhow::Result<()> {
    let search_config = args.search_config(&SearchConfig::default());
    let index = IndexFile::open(&search_config.index_file)
        .with_context(|| UnreadableIndex(search_config.index_file.clone()))?;

    let daemon_config = args
        .daemon
        .to_config()
        .with_absolute_paths()
        .context("could not resolve daemon paths")?;
    if daemon_config.daemon_type == DaemonType::None {
        let stdout = io::stdout();
        let mut out = io::BufWriter::new(stdout.lock());
        service_request(&index, &args, &search_config, &mut out)?;
        return Ok(());
    }

    if !args.words.is_empty() {
        bail!(FerretError::usage("a daemon takes no query words"));
    }
    let server = SearchDaemon::bind(index, search_config, daemon_config.clone())
        .context("could not start daemon")?;
    if daemon_config.background {
        daemon::daemonize().context("could not detach from terminal")?;
    }
    let _pid_file = daemon_config
        .pid_file
        .as_ref()
        .map(PidFile::create)
        .transpose()
        .context("could not write pid file")?;
    daemon::drop_privileges(daemon_config.user.as_deref(), daemon_config.group.as_deref())?;
    server.run()?;
    Ok(())
}
