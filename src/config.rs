//! Configuration for searching and for the search daemon.
//!
//! Both structs are built once at startup from the command line and then
//! passed by reference; nothing here is mutated while requests are served.
//! A daemon request may carry its own search options, which produce a new
//! [`SearchConfig`] for that request only.

use std::path::{self, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default index file name.
pub const DEFAULT_INDEX_FILE: &str = "ferret.index";
/// Default maximum number of results.
pub const DEFAULT_MAX_RESULTS: usize = 100;
/// Default TCP port for the daemon.
pub const DEFAULT_PORT: u16 = 1967;
/// Default Unix domain socket path for the daemon.
pub const DEFAULT_SOCKET_FILE: &str = "/tmp/ferret.socket";
/// Default bound on the number of arguments in one daemon request.
pub const DEFAULT_MAX_ARGS: usize = 50;
/// Default bound on the length of one daemon request line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// How search results are written.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsFormat {
    /// `# results: N` header then one line per file
    #[default]
    Classic,
    /// An XML document
    Xml,
    /// A JSON object
    Json,
}

/// Which sockets the daemon listens on.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonType {
    /// Do not run as a daemon
    #[default]
    None,
    /// Listen on a TCP socket
    Tcp,
    /// Listen on a Unix domain socket
    Unix,
    /// Listen on both
    Both,
}

impl DaemonType {
    pub fn uses_tcp(self) -> bool {
        matches!(self, DaemonType::Tcp | DaemonType::Both)
    }

    pub fn uses_unix(self) -> bool {
        matches!(self, DaemonType::Unix | DaemonType::Both)
    }
}

/// Options that shape one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Path of the index file.
    pub index_file: PathBuf,

    /// Maximum number of results to output.
    pub max_results: usize,

    /// Number of leading results to skip.
    pub skip_results: usize,

    /// Written between the fields of a result line.
    pub result_separator: String,

    pub results_format: ResultsFormat,

    /// Stem query words before looking them up.
    pub stem_words: bool,

    /// Ignore words that occur in more than this many files.
    pub word_files_max: Option<usize>,

    /// Ignore words that occur in more than this percentage of files.
    pub word_percent_max: Option<u8>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_file: PathBuf::from(DEFAULT_INDEX_FILE),
            max_results: DEFAULT_MAX_RESULTS,
            skip_results: 0,
            result_separator: " ".to_string(),
            results_format: ResultsFormat::Classic,
            stem_words: false,
            word_files_max: None,
            word_percent_max: None,
        }
    }
}

impl SearchConfig {
    pub fn with_index_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.index_file = path.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_skip_results(mut self, skip_results: usize) -> Self {
        self.skip_results = skip_results;
        self
    }

    pub fn with_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.result_separator = separator.into();
        self
    }

    pub fn with_format(mut self, format: ResultsFormat) -> Self {
        self.results_format = format;
        self
    }

    pub fn with_stemming(mut self, stem_words: bool) -> Self {
        self.stem_words = stem_words;
        self
    }

    pub fn with_word_files_max(mut self, max: usize) -> Self {
        self.word_files_max = Some(max);
        self
    }

    pub fn with_word_percent_max(mut self, percent: u8) -> Self {
        self.word_percent_max = Some(percent);
        self
    }
}

/// Options for the search daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub daemon_type: DaemonType,

    /// TCP address as `host:port`, `*:port`, `port`, or `host`.
    pub socket_address: String,

    /// Unix domain socket path.
    pub socket_file: PathBuf,

    /// Worker threads kept alive even when idle.
    pub min_threads: usize,

    /// Upper bound on worker threads.
    pub max_threads: usize,

    /// Time a client has to send its request line; also the write deadline.
    pub socket_timeout: Duration,

    /// How long a spare worker above `min_threads` waits for work before exiting.
    pub thread_timeout: Duration,

    /// Accepted connections waiting for a worker before accepting blocks.
    pub queue_size: usize,

    /// Requests with more arguments than this are rejected.
    pub max_args: usize,

    /// Requests with a longer line than this are rejected.
    pub max_line_len: usize,

    /// User to run as after binding sockets.
    pub user: Option<String>,

    /// Group to run as after binding sockets.
    pub group: Option<String>,

    /// File to record the daemon's PID in.
    pub pid_file: Option<PathBuf>,

    /// Detach from the terminal.
    pub background: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemon_type: DaemonType::None,
            socket_address: format!("*:{DEFAULT_PORT}"),
            socket_file: PathBuf::from(DEFAULT_SOCKET_FILE),
            min_threads: num_cpus::get(),
            max_threads: 100,
            socket_timeout: Duration::from_secs(10),
            thread_timeout: Duration::from_secs(30),
            queue_size: 511,
            max_args: DEFAULT_MAX_ARGS,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            user: None,
            group: None,
            pid_file: None,
            background: true,
        }
    }
}

impl DaemonConfig {
    pub fn with_daemon_type(mut self, daemon_type: DaemonType) -> Self {
        self.daemon_type = daemon_type;
        self
    }

    pub fn with_socket_address<S: Into<String>>(mut self, address: S) -> Self {
        self.socket_address = address.into();
        self
    }

    pub fn with_socket_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.socket_file = path.into();
        self
    }

    pub fn with_threads(mut self, min_threads: usize, max_threads: usize) -> Self {
        self.min_threads = min_threads;
        self.max_threads = max_threads;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_thread_timeout(mut self, timeout: Duration) -> Self {
        self.thread_timeout = timeout;
        self
    }

    pub fn with_max_args(mut self, max_args: usize) -> Self {
        self.max_args = max_args;
        self
    }

    pub fn with_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_pid_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    /// Resolve the socket and PID file paths against the current directory.
    ///
    /// Must be called before detaching, which changes the working directory.
    pub fn with_absolute_paths(mut self) -> Result<Self> {
        self.socket_file = path::absolute(&self.socket_file)?;
        if let Some(pid_file) = &self.pid_file {
            self.pid_file = Some(path::absolute(pid_file)?);
        }
        Ok(self)
    }

    /// Clamp the thread bounds so that `1 <= min <= max`.
    pub fn normalized(mut self) -> Self {
        self.max_threads = self.max_threads.max(1);
        self.min_threads = self.min_threads.clamp(1, self.max_threads);
        self.queue_size = self.queue_size.max(1);
        self
    }
}
