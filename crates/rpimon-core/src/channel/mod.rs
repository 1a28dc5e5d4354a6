//! TCP command channel.
//!
//! The accept loop runs on its own thread and polls a shared running flag.
//! Each accepted connection gets a session thread, up to `max_sessions`;
//! connections beyond that are closed right after accept.

mod dispatch;
mod session;

pub use dispatch::Dispatcher;
pub use session::Session;

use crate::protocol::{AuthKey, ProtocolError};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pending connection queue length.
pub const LISTEN_BACKLOG: libc::c_int = 5;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub bind: String,
    pub key: AuthKey,
    /// `None` disables the per-connection read timeout.
    pub read_timeout: Option<Duration>,
    pub max_sessions: usize,
}

/// Releases a session slot when the session thread ends.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct CommandChannel {
    listener: TcpListener,
    config: ChannelConfig,
    dispatcher: Arc<Dispatcher>,
    active: Arc<AtomicUsize>,
}

impl CommandChannel {
    /// Binds the listener with a backlog of [`LISTEN_BACKLOG`].
    pub fn bind(config: ChannelConfig, dispatcher: Arc<Dispatcher>) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.bind)?;
        // std listens with its own backlog; a second listen() only resizes it
        // SAFETY: the fd is a bound socket owned by `listener`
        if unsafe { libc::listen(listener.as_raw_fd(), LISTEN_BACKLOG) } != 0 {
            return Err(io::Error::last_os_error());
        }
        listener.set_nonblocking(true)?;

        Ok(Self {
            listener,
            config,
            dispatcher,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `running` is cleared.
    pub fn run(&self, running: Arc<AtomicBool>) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, max_sessions = self.config.max_sessions, "command channel listening");
        }

        while running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer, &running),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        info!("command channel stopped");
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr, running: &Arc<AtomicBool>) {
        let slots = self.active.fetch_add(1, Ordering::SeqCst);
        let guard = SlotGuard(self.active.clone());
        if slots >= self.config.max_sessions {
            warn!(%peer, max = self.config.max_sessions, "too many sessions, closing connection");
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        if let Err(e) = self.configure(&stream) {
            warn!(%peer, error = %e, "cannot configure connection");
            return;
        }

        let key = self.config.key;
        let dispatcher = self.dispatcher.clone();
        let running = running.clone();
        let spawned = thread::Builder::new()
            .name(format!("session-{}", peer))
            .spawn(move || {
                let _guard = guard;
                serve(stream, peer, key, &dispatcher, &running);
            });
        if let Err(e) = spawned {
            warn!(%peer, error = %e, "cannot spawn session thread");
        }
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_nodelay(true)
    }
}

fn serve(
    mut stream: TcpStream,
    peer: SocketAddr,
    key: AuthKey,
    dispatcher: &Dispatcher,
    running: &AtomicBool,
) {
    debug!(%peer, "session opened");
    let mut session = Session::new(key);
    match session.run(&mut stream, dispatcher, running) {
        Ok(()) => debug!(%peer, commands = session.commands(), "session closed"),
        Err(ProtocolError::BadKey) => warn!(%peer, "authentication failed"),
        Err(e) => info!(%peer, commands = session.commands(), error = %e, "session ended"),
    }
    let _ = stream.shutdown(Shutdown::Both);
}
