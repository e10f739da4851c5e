use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use ferret::config::{DaemonConfig, DaemonType, SearchConfig};
use ferret::daemon::{MALFORMED_QUERY_REPLY, SearchDaemon, ShutdownHandle};
use ferret::index::{IndexFile, IndexWriter, Posting};

use tempfile::TempDir;

fn index() -> IndexFile {
    let mut writer = IndexWriter::new();
    let dir = writer.add_directory("/pets");
    writer.add_file(dir, "one", 10, "One");
    writer.add_file(dir, "two", 20, "Two");
    writer.add_file(dir, "three", 30, "Three");
    writer
        .add_word("cat", vec![Posting::new(0, 1, 10), Posting::new(1, 1, 10)])
        .add_word("dog", vec![Posting::new(1, 1, 10), Posting::new(2, 1, 10)])
        .add_stop_word("the");
    IndexFile::from_bytes(writer.to_bytes().unwrap()).unwrap()
}

struct RunningDaemon {
    handle: ShutdownHandle,
    tcp_addr: Option<SocketAddr>,
    unix_path: Option<PathBuf>,
    thread: Option<thread::JoinHandle<()>>,
    _dir: TempDir,
}

impl RunningDaemon {
    fn start(daemon_type: DaemonType) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::default()
            .with_daemon_type(daemon_type)
            .with_socket_address("127.0.0.1:0")
            .with_socket_file(dir.path().join("ferret.socket"))
            .with_threads(1, 4)
            .with_socket_timeout(Duration::from_millis(300))
            .with_max_args(8)
            .with_background(false);
        let daemon = SearchDaemon::bind(index(), SearchConfig::default(), config).unwrap();
        let handle = daemon.shutdown_handle();
        let tcp_addr = daemon.tcp_addr();
        let unix_path = daemon.unix_path().map(|p| p.to_path_buf());
        let thread = thread::spawn(move || daemon.run().unwrap());
        RunningDaemon {
            handle,
            tcp_addr,
            unix_path,
            thread: Some(thread),
            _dir: dir,
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.tcp_addr.unwrap()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        stream
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        self.handle.shutdown();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Everything the server sent before closing, or the error that ended the read.
fn read_reply(stream: &mut impl Read) -> std::io::Result<String> {
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

fn assert_reset_without_reply(stream: &mut TcpStream) {
    match read_reply(stream) {
        Ok(reply) => assert!(reply.is_empty(), "unexpected reply {reply:?}"),
        Err(e) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
    }
}

#[test]
fn test_tcp_query_gets_results() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"cat and dog\n").unwrap();

    let reply = read_reply(&mut stream).unwrap();
    assert_eq!(reply, "# results: 1\n100 /pets/two 20 Two\n");
}

#[test]
fn test_request_options_apply() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"-m 1 -R , cat or dog\r\n").unwrap();

    let reply = read_reply(&mut stream).unwrap();
    assert_eq!(reply, "# results: 3\n100,/pets/two,20,Two\n");
}

#[test]
fn test_malformed_query_gets_error_line() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"(cat and\n").unwrap();

    let reply = read_reply(&mut stream).unwrap();
    assert_eq!(reply.trim_end(), MALFORMED_QUERY_REPLY);
}

#[test]
fn test_too_many_arguments_resets() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"a or b or c or d or e\n").unwrap();
    assert_reset_without_reply(&mut stream);
}

#[test]
fn test_silent_client_is_reset() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    assert_reset_without_reply(&mut stream);
}

#[test]
fn test_partial_line_times_out() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"cat and").unwrap();
    assert_reset_without_reply(&mut stream);
}

#[test]
fn test_daemon_option_in_request_resets() {
    let daemon = RunningDaemon::start(DaemonType::Tcp);
    let mut stream = daemon.connect();
    stream.write_all(b"-b tcp cat\n").unwrap();
    assert_reset_without_reply(&mut stream);
}

#[test]
fn test_unix_socket_and_concurrent_clients() {
    let daemon = RunningDaemon::start(DaemonType::Both);
    let path = daemon.unix_path.clone().unwrap();

    let mut stream = UnixStream::connect(&path).unwrap();
    stream.write_all(b"-D\n").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();
    let reply = read_reply(&mut stream).unwrap();
    assert!(reply.starts_with("cat\n  1 10 /pets/one 10 One\n"));

    let clients: Vec<_> = (0..8)
        .map(|_| {
            let mut stream = daemon.connect();
            thread::spawn(move || {
                stream.write_all(b"dog\n").unwrap();
                read_reply(&mut stream).unwrap()
            })
        })
        .collect();
    for client in clients {
        assert!(client.join().unwrap().starts_with("# results: 2\n"));
    }
}
