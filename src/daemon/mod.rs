//! The multi-threaded search daemon.
//!
//! One accept loop per socket hands connections to a shared [`ThreadPool`].
//! Each worker reads one request line under a deadline, answers it with the
//! same code as the command line, and closes the connection. The index is
//! shared read-only by every worker.

pub mod connection;
pub mod pool;
pub mod process;
pub mod server;

pub use connection::{ClientStream, MALFORMED_QUERY_REPLY, RequestLimits, split_args};
pub use pool::ThreadPool;
pub use process::{PidFile, daemonize, drop_privileges};
pub use server::{SearchDaemon, ShutdownHandle, parse_socket_address};
