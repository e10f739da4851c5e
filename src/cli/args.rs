//! Command line argument parsing for Ferret using clap.
//!
//! The same [`SearchArgs`] parses the process command line and every daemon
//! request line, so a request accepts exactly the options of the query tool.
//! Search options are all optional: unset options leave the base
//! [`SearchConfig`] untouched, which lets a request override only what it
//! names.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{ArgGroup, Args, Parser};

use crate::config::{DaemonConfig, DaemonType, ResultsFormat, SearchConfig};
use crate::error::{FerretError, Result};

/// Ferret - search a pre-built full-text index
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ferret")]
#[command(about = "Search a pre-built full-text index, or serve searches as a daemon")]
#[command(version = crate::VERSION)]
#[command(group(
    ArgGroup::new("dump")
        .args(["dump_words", "dump_index", "dump_stop", "dump_meta", "window"])
        .multiple(false)
))]
pub struct SearchArgs {
    /// Index file to search
    #[arg(short = 'i', long = "index-file", value_name = "FILE")]
    pub index_file: Option<PathBuf>,

    /// Maximum number of results
    #[arg(short = 'm', long = "max-results", value_name = "N")]
    pub max_results: Option<usize>,

    /// Number of initial results to skip
    #[arg(short = 'r', long = "skip-results", value_name = "N")]
    pub skip_results: Option<usize>,

    /// Separator between result fields
    #[arg(short = 'R', long = "separator", value_name = "SEP")]
    pub separator: Option<String>,

    /// Results format
    #[arg(short = 'F', long = "format", value_enum)]
    pub format: Option<ResultsFormat>,

    /// Stem query words
    #[arg(short = 's', long = "stem-words")]
    pub stem_words: bool,

    /// Ignore words occurring in more than N files
    #[arg(short = 'f', long = "word-files", value_name = "N")]
    pub word_files: Option<usize>,

    /// Ignore words occurring in more than P% of files
    #[arg(
        short = 'p',
        long = "word-percent",
        value_name = "P",
        value_parser = clap::value_parser!(u8).range(1..=100)
    )]
    pub word_percent: Option<u8>,

    /// Dump the postings of the given words
    #[arg(short = 'd', long = "dump-words")]
    pub dump_words: bool,

    /// Dump every word and its postings
    #[arg(short = 'D', long = "dump-index")]
    pub dump_index: bool,

    /// Dump the stop words
    #[arg(short = 'S', long = "dump-stop")]
    pub dump_stop: bool,

    /// Dump the meta names
    #[arg(short = 'M', long = "dump-meta")]
    pub dump_meta: bool,

    /// Dump a window of N words around each given word, matching M bytes
    #[arg(short = 'w', long = "window", value_name = "N[,M]")]
    pub window: Option<Window>,

    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub daemon: DaemonArgs,

    /// Query, or the words to dump
    #[arg(value_name = "WORDS")]
    pub words: Vec<String>,
}

/// Options that only make sense when starting the daemon.
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Run as a daemon on these sockets
    #[arg(short = 'b', long = "daemon-type", value_enum)]
    pub daemon_type: Option<DaemonType>,

    /// TCP address as host:port, *:port, port, or host
    #[arg(short = 'a', long = "socket-address", value_name = "ADDR")]
    pub socket_address: Option<String>,

    /// Unix domain socket path
    #[arg(short = 'u', long = "socket-file", value_name = "FILE")]
    pub socket_file: Option<PathBuf>,

    /// Minimum number of worker threads
    #[arg(short = 't', long = "min-threads", value_name = "N")]
    pub min_threads: Option<usize>,

    /// Maximum number of worker threads
    #[arg(short = 'T', long = "max-threads", value_name = "N")]
    pub max_threads: Option<usize>,

    /// Seconds a client has to send its request
    #[arg(short = 'o', long = "socket-timeout", value_name = "SECS")]
    pub socket_timeout: Option<u64>,

    /// Seconds an idle spare thread lives
    #[arg(short = 'O', long = "thread-timeout", value_name = "SECS")]
    pub thread_timeout: Option<u64>,

    /// Connections waiting for a worker
    #[arg(short = 'Q', long = "queue-size", value_name = "N")]
    pub queue_size: Option<usize>,

    /// Maximum number of arguments in one request
    #[arg(long = "max-args", value_name = "N")]
    pub max_args: Option<usize>,

    /// Write the daemon's PID to this file
    #[arg(short = 'P', long = "pid-file", value_name = "FILE")]
    pub pid_file: Option<PathBuf>,

    /// Stay in the foreground
    #[arg(short = 'B', long = "no-background")]
    pub no_background: bool,

    /// User to run as
    #[arg(short = 'U', long = "user")]
    pub user: Option<String>,

    /// Group to run as
    #[arg(short = 'G', long = "group")]
    pub group: Option<String>,
}

impl DaemonArgs {
    /// Whether any daemon option was given.
    pub fn any_given(&self) -> bool {
        self.daemon_type.is_some()
            || self.socket_address.is_some()
            || self.socket_file.is_some()
            || self.min_threads.is_some()
            || self.max_threads.is_some()
            || self.socket_timeout.is_some()
            || self.thread_timeout.is_some()
            || self.queue_size.is_some()
            || self.max_args.is_some()
            || self.pid_file.is_some()
            || self.no_background
            || self.user.is_some()
            || self.group.is_some()
    }

    pub fn to_config(&self) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        if let Some(daemon_type) = self.daemon_type {
            config.daemon_type = daemon_type;
        }
        if let Some(address) = &self.socket_address {
            config.socket_address = address.clone();
        }
        if let Some(path) = &self.socket_file {
            config.socket_file = path.clone();
        }
        if let Some(n) = self.min_threads {
            config.min_threads = n;
        }
        if let Some(n) = self.max_threads {
            config.max_threads = n;
        }
        if let Some(secs) = self.socket_timeout {
            config.socket_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.thread_timeout {
            config.thread_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.queue_size {
            config.queue_size = n;
        }
        if let Some(n) = self.max_args {
            config.max_args = n;
        }
        config.pid_file = self.pid_file.clone();
        config.background = !self.no_background;
        config.user = self.user.clone();
        config.group = self.group.clone();
        config.normalized()
    }
}

/// `--window n[,m]`: show `size` words, comparing the first `match_len` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub size: usize,
    pub match_len: usize,
}

impl FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (size, match_len) = match s.split_once(',') {
            Some((size, match_len)) => (size, Some(match_len)),
            None => (s, None),
        };
        let size: usize = size
            .trim()
            .parse()
            .map_err(|_| format!("window size '{size}' is not a number"))?;
        if size == 0 {
            return Err("window size must be positive".to_string());
        }
        let match_len = match match_len {
            Some(m) => m
                .trim()
                .parse()
                .map_err(|_| format!("match length '{m}' is not a number"))?,
            None => 0,
        };
        Ok(Window { size, match_len })
    }
}

/// What one invocation or request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Search(String),
    DumpWords(Vec<String>),
    DumpIndex,
    DumpStopWords,
    DumpMetaNames,
    DumpWindow { window: Window, words: Vec<String> },
}

impl SearchArgs {
    /// Parse a daemon request's arguments; daemon-only options are refused.
    pub fn from_request<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        let argv = std::iter::once(std::ffi::OsString::from("ferret"))
            .chain(args.into_iter().map(Into::into));
        let parsed = Self::try_parse_from(argv).map_err(|e| FerretError::usage(e.to_string()))?;
        if parsed.daemon.any_given() || parsed.index_file.is_some() {
            return Err(FerretError::usage(
                "daemon and index options are not allowed in a request",
            ));
        }
        Ok(parsed)
    }

    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }

    /// `base` with every search option given here applied over it.
    pub fn search_config(&self, base: &SearchConfig) -> SearchConfig {
        let mut config = base.clone();
        if let Some(path) = &self.index_file {
            config.index_file = path.clone();
        }
        if let Some(n) = self.max_results {
            config.max_results = n;
        }
        if let Some(n) = self.skip_results {
            config.skip_results = n;
        }
        if let Some(separator) = &self.separator {
            config.result_separator = separator.clone();
        }
        if let Some(format) = self.format {
            config.results_format = format;
        }
        if self.stem_words {
            config.stem_words = true;
        }
        if let Some(n) = self.word_files {
            config.word_files_max = Some(n);
        }
        if let Some(p) = self.word_percent {
            config.word_percent_max = Some(p);
        }
        config
    }

    /// Work out which command the arguments ask for.
    pub fn request(&self) -> Result<Request> {
        let words = || -> Result<Vec<String>> {
            if self.words.is_empty() {
                Err(FerretError::usage("no words given"))
            } else {
                Ok(self.words.clone())
            }
        };

        if self.dump_index {
            Ok(Request::DumpIndex)
        } else if self.dump_stop {
            Ok(Request::DumpStopWords)
        } else if self.dump_meta {
            Ok(Request::DumpMetaNames)
        } else if self.dump_words {
            Ok(Request::DumpWords(words()?))
        } else if let Some(window) = self.window {
            Ok(Request::DumpWindow {
                window,
                words: words()?,
            })
        } else if self.words.is_empty() {
            Err(FerretError::usage("no query given"))
        } else {
            Ok(Request::Search(self.words.join(" ")))
        }
    }
}
