//! Blocking control client for the command channel.

use crate::protocol::{AuthKey, Command, Status};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot resolve {0}")]
    Resolve(String),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("connection closed by the agent (wrong key?)")]
    Closed,

    #[error("invalid status byte 0x{0:02X}")]
    InvalidResponse(u8),

    #[error("command rejected: {0}")]
    Rejected(Status),
}

/// One authenticated connection to an agent.
#[derive(Debug)]
pub struct ControlClient {
    stream: TcpStream,
    peer: SocketAddr,
}

impl ControlClient {
    /// Connects to `addr` and sends the key.
    ///
    /// The agent never acknowledges the key; a wrong key shows up as
    /// [`ClientError::Closed`] on the first command.
    pub fn connect(addr: &str, key: AuthKey, timeout: Duration) -> Result<Self, ClientError> {
        let peer = addr
            .to_socket_addrs()
            .map_err(|_| ClientError::Resolve(addr.to_string()))?
            .next()
            .ok_or_else(|| ClientError::Resolve(addr.to_string()))?;

        let mut stream =
            TcpStream::connect_timeout(&peer, timeout).map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        stream.write_all(&key.to_bytes())?;
        debug!(%peer, "connected");

        Ok(Self { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one frame and returns the agent's status, whatever it is.
    pub fn send(&mut self, command: Command) -> Result<Status, ClientError> {
        match self.stream.write_all(&command.encode()) {
            Ok(()) => {}
            Err(e) if is_closed(&e) => return Err(ClientError::Closed),
            Err(e) => return Err(e.into()),
        }

        let mut byte = [0u8; 1];
        match self.stream.read(&mut byte) {
            Ok(0) => Err(ClientError::Closed),
            Ok(_) => Status::from_byte(byte[0]).ok_or(ClientError::InvalidResponse(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Err(ClientError::Timeout)
            }
            Err(e) if is_closed(&e) => Err(ClientError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    /// Sends `command`; any status other than `Ok` becomes an error.
    pub fn run(&mut self, command: Command) -> Result<(), ClientError> {
        match self.send(command)? {
            Status::Ok => Ok(()),
            status => Err(ClientError::Rejected(status)),
        }
    }

    pub fn terminate(&mut self, pid: u32) -> Result<(), ClientError> {
        self.run(Command::TerminateProcess { pid })
    }

    pub fn set_line(&mut self, line: u8, value: bool) -> Result<(), ClientError> {
        self.run(Command::SetDigitalLine {
            line,
            value: value as u8,
        })
    }
}

fn is_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{MemoryLines, RecordingSignaller};
    use crate::channel::{ChannelConfig, CommandChannel, Dispatcher};
    use crate::config::LineSet;
    use crate::shared::SnapshotCell;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::{self, JoinHandle};

    const KEY: u32 = 0x0102_0304;

    struct Agent {
        addr: String,
        running: Arc<AtomicBool>,
        handle: Option<JoinHandle<()>>,
        lines: Arc<MemoryLines>,
        signaller: Arc<RecordingSignaller>,
    }

    impl Agent {
        fn start() -> Self {
            let lines = Arc::new(MemoryLines::new());
            let signaller = Arc::new(RecordingSignaller::new());
            let dispatcher = Arc::new(Dispatcher::new(
                lines.clone(),
                LineSet::parse("0-3").unwrap(),
                signaller.clone(),
                SnapshotCell::new(),
            ));
            let channel = CommandChannel::bind(
                ChannelConfig {
                    bind: "127.0.0.1:0".into(),
                    key: AuthKey::new(KEY),
                    read_timeout: Some(Duration::from_secs(5)),
                    max_sessions: 4,
                },
                dispatcher,
            )
            .unwrap();
            let addr = channel.local_addr().unwrap().to_string();
            let running = Arc::new(AtomicBool::new(true));
            let flag = running.clone();
            let handle = thread::spawn(move || channel.run(flag));
            Self {
                addr,
                running,
                handle: Some(handle),
                lines,
                signaller,
            }
        }

        fn client(&self, key: u32) -> ControlClient {
            ControlClient::connect(&self.addr, AuthKey::new(key), Duration::from_secs(5)).unwrap()
        }
    }

    impl Drop for Agent {
        fn drop(&mut self) {
            self.running.store(false, Ordering::SeqCst);
            if let Some(h) = self.handle.take() {
                let _ = h.join();
            }
        }
    }

    #[test]
    fn test_client_commands() {
        let agent = Agent::start();
        let mut client = agent.client(KEY);

        client.set_line(3, true).unwrap();
        client.terminate(77).unwrap();
        assert_eq!(agent.lines.writes(), vec![(3, true)]);
        assert_eq!(agent.signaller.signalled(), vec![77]);
    }

    #[test]
    fn test_client_rejected_status() {
        let agent = Agent::start();
        agent.signaller.mark_missing(500);
        let mut client = agent.client(KEY);

        assert!(matches!(
            client.set_line(9, true),
            Err(ClientError::Rejected(Status::InvalidArgument))
        ));
        assert!(matches!(
            client.terminate(500),
            Err(ClientError::Rejected(Status::NoSuchProcess))
        ));
        // session survives rejected commands
        assert_eq!(
            client.send(Command::SetDigitalLine { line: 1, value: 0 }).unwrap(),
            Status::Ok
        );
    }

    #[test]
    fn test_client_wrong_key() {
        let agent = Agent::start();
        let mut client = agent.client(0xDEAD_BEEF);

        let err = client.set_line(1, true).unwrap_err();
        assert!(matches!(err, ClientError::Closed | ClientError::Io(_)));
        assert!(agent.lines.writes().is_empty());
    }

    #[test]
    fn test_client_resolve_failure() {
        // missing port
        let err = ControlClient::connect("127.0.0.1", AuthKey::new(KEY), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ClientError::Resolve(_)));
    }
}
