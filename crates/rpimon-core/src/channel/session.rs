//! Per-connection state machine.
//!
//! ```text
//! UNAUTHENTICATED --(4-byte key == configured)--> AUTHENTICATED --+
//!        |                                             ^          | 8-byte frame
//!        +-- wrong key / short read: close             +-- status-+
//! ```

use super::dispatch::Dispatcher;
use crate::protocol::{
    AuthGate, AuthKey, Command, FRAME_LEN, KEY_LEN, ProtocolError, Status, read_full,
};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// One client connection.
#[derive(Debug)]
pub struct Session {
    gate: AuthGate,
    commands: u64,
}

impl Session {
    pub fn new(key: AuthKey) -> Self {
        Self {
            gate: AuthGate::new(key),
            commands: 0,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.gate.is_authenticated()
    }

    /// Commands handled so far.
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Runs the session until the peer closes, a protocol error occurs, or
    /// `running` is cleared at a frame boundary.
    ///
    /// A clean close at a frame boundary returns `Ok`.
    pub fn run<S: Read + Write>(
        &mut self,
        stream: &mut S,
        dispatcher: &Dispatcher,
        running: &AtomicBool,
    ) -> Result<(), ProtocolError> {
        self.authenticate(stream)?;

        let mut frame = [0u8; FRAME_LEN];
        while running.load(Ordering::SeqCst) {
            let got = read_full(stream, &mut frame)?;
            if got == 0 {
                return Ok(());
            }
            if got < FRAME_LEN {
                return Err(ProtocolError::ShortRead {
                    expected: FRAME_LEN,
                    got,
                });
            }

            let command = match Command::decode(&frame) {
                Ok(command) => command,
                Err(e) => {
                    reply(stream, Status::InvalidCommand)?;
                    return Err(e);
                }
            };

            let status = dispatcher.execute(command);
            self.commands += 1;
            debug!(%command, %status, "command handled");
            reply(stream, status)?;
        }
        Ok(())
    }

    fn authenticate<S: Read>(&mut self, stream: &mut S) -> Result<(), ProtocolError> {
        let mut key = [0u8; KEY_LEN];
        let got = read_full(stream, &mut key)?;
        if got < KEY_LEN {
            return Err(ProtocolError::ShortRead {
                expected: KEY_LEN,
                got,
            });
        }
        self.gate.authenticate(&key)
    }
}

fn reply<S: Write>(stream: &mut S, status: Status) -> Result<(), ProtocolError> {
    stream.write_all(&[status.as_byte()])?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{MemoryLines, RecordingSignaller};
    use crate::config::LineSet;
    use crate::shared::SnapshotCell;
    use std::io::{self, Cursor};
    use std::sync::Arc;

    const KEY: u32 = 0x01020304;

    /// In-memory duplex stream: reads from a script, collects writes.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (Dispatcher, Arc<MemoryLines>, Arc<RecordingSignaller>) {
        let lines = Arc::new(MemoryLines::new());
        let signaller = Arc::new(RecordingSignaller::new());
        let d = Dispatcher::new(
            lines.clone(),
            LineSet::default(),
            signaller.clone(),
            SnapshotCell::new(),
        );
        (d, lines, signaller)
    }

    fn script(key: u32, frames: &[[u8; 8]]) -> Vec<u8> {
        let mut v = key.to_le_bytes().to_vec();
        for f in frames {
            v.extend_from_slice(f);
        }
        v
    }

    #[test]
    fn test_set_line_scenario() {
        let (d, lines, _) = setup();
        let mut stream = Duplex::new(script(KEY, &[[1, 2, 1, 0, 0, 0, 0, 0]]));
        let mut session = Session::new(AuthKey::new(KEY));

        session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap();
        assert_eq!(stream.output, vec![0]);
        assert_eq!(lines.writes(), vec![(2, true)]);
        assert_eq!(session.commands(), 1);
    }

    #[test]
    fn test_terminate_scenario() {
        let (d, _, signaller) = setup();
        signaller.mark_missing(43);
        let mut stream = Duplex::new(script(
            KEY,
            &[[0, 42, 0, 0, 0, 0, 0, 0], [0, 43, 0, 0, 0, 0, 0, 0]],
        ));
        let mut session = Session::new(AuthKey::new(KEY));

        session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap();
        assert_eq!(stream.output, vec![0, 5]);
        assert_eq!(signaller.signalled(), vec![42]);
    }

    #[test]
    fn test_wrong_key_closes_without_reply() {
        let (d, lines, _) = setup();
        let mut stream = Duplex::new(script(0x04030201, &[[1, 2, 1, 0, 0, 0, 0, 0]]));
        let mut session = Session::new(AuthKey::new(KEY));

        let err = session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ProtocolError::BadKey));
        assert!(!session.is_authenticated());
        assert!(stream.output.is_empty());
        assert!(lines.writes().is_empty());
    }

    #[test]
    fn test_short_key() {
        let (d, _, _) = setup();
        let mut stream = Duplex::new(vec![4, 3]);
        let mut session = Session::new(AuthKey::new(KEY));
        assert!(matches!(
            session.run(&mut stream, &d, &AtomicBool::new(true)),
            Err(ProtocolError::ShortRead { expected: 4, got: 2 })
        ));
    }

    #[test]
    fn test_partial_frame_is_protocol_error() {
        let (d, _, _) = setup();
        let mut input = script(KEY, &[[1, 2, 1, 0, 0, 0, 0, 0]]);
        input.extend_from_slice(&[1, 3, 1]);
        let mut stream = Duplex::new(input);
        let mut session = Session::new(AuthKey::new(KEY));

        let err = session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortRead { expected: 8, got: 3 }));
        assert_eq!(stream.output, vec![0]);
    }

    #[test]
    fn test_unknown_command_replies_then_closes() {
        let (d, lines, _) = setup();
        let mut stream = Duplex::new(script(
            KEY,
            &[[7, 0, 0, 0, 0, 0, 0, 0], [1, 2, 1, 0, 0, 0, 0, 0]],
        ));
        let mut session = Session::new(AuthKey::new(KEY));

        let err = session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownCommand(7)));
        assert_eq!(stream.output, vec![Status::InvalidCommand.as_byte()]);
        assert!(lines.writes().is_empty());
    }

    #[test]
    fn test_invalid_argument_keeps_session_open() {
        let (d, lines, _) = setup();
        let mut stream = Duplex::new(script(
            KEY,
            &[[1, 12, 1, 0, 0, 0, 0, 0], [1, 3, 9, 0, 0, 0, 0, 0], [1, 3, 1, 0, 0, 0, 0, 0]],
        ));
        let mut session = Session::new(AuthKey::new(KEY));

        session.run(&mut stream, &d, &AtomicBool::new(true)).unwrap();
        assert_eq!(stream.output, vec![3, 3, 0]);
        assert_eq!(lines.writes(), vec![(3, true)]);
    }

    #[test]
    fn test_stops_at_frame_boundary_when_shutting_down() {
        let (d, lines, _) = setup();
        let mut stream = Duplex::new(script(KEY, &[[1, 2, 1, 0, 0, 0, 0, 0]]));
        let mut session = Session::new(AuthKey::new(KEY));

        session.run(&mut stream, &d, &AtomicBool::new(false)).unwrap();
        assert!(session.is_authenticated());
        assert!(lines.writes().is_empty());
    }
}
