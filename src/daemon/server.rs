//! The accept loops of the search daemon.

use std::fs;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use log::{debug, info, warn};

use crate::config::{DEFAULT_PORT, DaemonConfig, SearchConfig};
use crate::daemon::connection::{ClientStream, RequestLimits, handle_connection};
use crate::daemon::pool::ThreadPool;
use crate::error::{FerretError, Result};
use crate::index::IndexFile;

/// Resolve a socket address given as `host:port`, `*:port`, `port`, or `host`.
pub fn parse_socket_address(address: &str) -> Result<Vec<SocketAddr>> {
    let address = address.trim();
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| {
                FerretError::invalid_argument(format!("bad port in socket address '{address}'"))
            })?;
            (host, port)
        }
        None => match address.parse::<u16>() {
            Ok(port) => ("*", port),
            Err(_) => (address, DEFAULT_PORT),
        },
    };
    let host = match host.trim_start_matches('[').trim_end_matches(']') {
        "" | "*" => "0.0.0.0",
        host => host,
    };
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| FerretError::invalid_argument(format!("cannot resolve '{address}': {e}")))?
        .collect();
    if addrs.is_empty() {
        return Err(FerretError::invalid_argument(format!(
            "'{address}' resolves to no address"
        )));
    }
    Ok(addrs)
}

/// Stops a running [`SearchDaemon`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    tcp_addr: Option<SocketAddr>,
    unix_path: Option<PathBuf>,
}

impl ShutdownHandle {
    /// Ask the accept loops to stop and wake them with a dummy connection.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Release);
        if let Some(addr) = self.tcp_addr {
            let _ = TcpStream::connect(addr);
        }
        if let Some(path) = &self.unix_path {
            let _ = UnixStream::connect(path);
        }
    }
}

/// A bound daemon, ready to serve.
pub struct SearchDaemon {
    index: Arc<IndexFile>,
    search_config: Arc<SearchConfig>,
    config: DaemonConfig,
    tcp: Option<TcpListener>,
    unix: Option<UnixListener>,
    shutdown: Arc<AtomicBool>,
}

impl SearchDaemon {
    /// Bind the sockets `config` asks for.
    pub fn bind(index: IndexFile, search_config: SearchConfig, config: DaemonConfig) -> Result<Self> {
        let config = config.normalized();
        if !config.daemon_type.uses_tcp() && !config.daemon_type.uses_unix() {
            return Err(FerretError::invalid_argument("no daemon socket type given"));
        }

        let tcp = if config.daemon_type.uses_tcp() {
            let addrs = parse_socket_address(&config.socket_address)?;
            let listener = TcpListener::bind(&addrs[..])?;
            info!("listening on {}", listener.local_addr()?);
            Some(listener)
        } else {
            None
        };

        let unix = if config.daemon_type.uses_unix() {
            let path = &config.socket_file;
            match fs::remove_file(path) {
                Ok(()) => debug!("removed stale socket {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            let listener = UnixListener::bind(path)?;
            info!("listening on {}", path.display());
            Some(listener)
        } else {
            None
        };

        Ok(SearchDaemon {
            index: Arc::new(index),
            search_config: Arc::new(search_config),
            config,
            tcp,
            unix,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound TCP address, if listening on TCP.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// The Unix socket path, if listening on one.
    pub fn unix_path(&self) -> Option<&Path> {
        self.unix.as_ref().map(|_| self.config.socket_file.as_path())
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
            tcp_addr: self.tcp_addr(),
            unix_path: self.unix_path().map(Path::to_path_buf),
        }
    }

    /// Serve connections until shut down.
    pub fn run(self) -> Result<()> {
        let pool = Arc::new(ThreadPool::new(
            self.config.min_threads,
            self.config.max_threads,
            self.config.thread_timeout,
            self.config.queue_size,
        )?);
        info!(
            "serving with {}..{} threads, queue of {}",
            self.config.min_threads, self.config.max_threads, self.config.queue_size
        );

        let limits = RequestLimits {
            timeout: self.config.socket_timeout,
            max_line_len: self.config.max_line_len,
            max_args: self.config.max_args,
        };
        let ctx = AcceptContext {
            pool,
            index: self.index,
            search_config: self.search_config,
            limits,
            shutdown: self.shutdown,
        };

        let unix_thread = match self.unix {
            Some(listener) if self.tcp.is_some() => {
                let ctx = ctx.clone();
                Some(
                    thread::Builder::new()
                        .name("accept-unix".to_string())
                        .spawn(move || ctx.accept_unix(&listener))?,
                )
            }
            Some(listener) => {
                ctx.accept_unix(&listener);
                None
            }
            None => None,
        };
        if let Some(listener) = &self.tcp {
            ctx.accept_tcp(listener);
        }
        if let Some(handle) = unix_thread {
            let _ = handle.join();
        }

        if self.config.daemon_type.uses_unix() {
            let _ = fs::remove_file(&self.config.socket_file);
        }
        info!("daemon stopped");
        Ok(())
    }
}

#[derive(Clone)]
struct AcceptContext {
    pool: Arc<ThreadPool>,
    index: Arc<IndexFile>,
    search_config: Arc<SearchConfig>,
    limits: RequestLimits,
    shutdown: Arc<AtomicBool>,
}

impl AcceptContext {
    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn dispatch(&self, stream: ClientStream) {
        let index = Arc::clone(&self.index);
        let search_config = Arc::clone(&self.search_config);
        let limits = self.limits;
        let job = move || handle_connection(stream, &index, &search_config, limits);
        if let Err(e) = self.pool.execute(job) {
            warn!("dropping connection: {e}");
        }
    }

    fn accept_tcp(&self, listener: &TcpListener) {
        for stream in listener.incoming() {
            if self.stopping() {
                break;
            }
            match stream {
                Ok(stream) => self.dispatch(ClientStream::Tcp(stream)),
                Err(e) => warn!("accept failed: {e}"),
            }
        }
    }

    fn accept_unix(&self, listener: &UnixListener) {
        for stream in listener.incoming() {
            if self.stopping() {
                break;
            }
            match stream {
                Ok(stream) => self.dispatch(ClientStream::Unix(stream)),
                Err(e) => warn!("accept failed: {e}"),
            }
        }
    }
}
