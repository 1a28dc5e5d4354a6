//! Binary command protocol.
//!
//! A client sends its 4-byte pre-shared key once, then any number of fixed
//! 8-byte command frames. Each frame gets exactly one status byte back.
//!
//! ```text
//! key:     ┌──────────────────────┐
//!          │ u32 little-endian (4) │
//!          └──────────────────────┘
//!
//! frame:   ┌────────┬────────────────────────┬─────────┐
//!  kill    │ 0x00   │ pid u32 LE (bytes 1-4) │ 0 0 0   │
//!          ├────────┼──────┬───────┬─────────┴─────────┤
//!  line    │ 0x01   │ line │ value │ 0 0 0 0 0         │
//!          └────────┴──────┴───────┴───────────────────┘
//!
//! status:  0 Ok  1 Failure  2 InvalidCommand  3 InvalidArgument
//!          4 PermissionDenied  5 NoSuchProcess
//! ```
//!
//! Unused bytes are sent as zero and ignored on decode.

use std::fmt;
use std::io::{self, Read};
use thiserror::Error;

/// Length of the pre-shared key on the wire.
pub const KEY_LEN: usize = 4;
/// Length of one command frame.
pub const FRAME_LEN: usize = 8;

pub const CMD_TERMINATE_PROCESS: u8 = 0x00;
pub const CMD_SET_DIGITAL_LINE: u8 = 0x01;

/// Connection-scoped protocol failures. Each one ends the session.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("authentication failed")]
    BadKey,

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),

    #[error("read timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-command argument errors. The session stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("line {0} is not in the configured line set")]
    LineUnavailable(u8),

    #[error("line value {0} is not 0 or 1")]
    InvalidLineValue(u8),

    #[error("pid {0} cannot be signalled")]
    InvalidPid(u32),
}

/// A decoded command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TerminateProcess { pid: u32 },
    SetDigitalLine { line: u8, value: u8 },
}

impl Command {
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        match *self {
            Command::TerminateProcess { pid } => {
                frame[0] = CMD_TERMINATE_PROCESS;
                frame[1..5].copy_from_slice(&pid.to_le_bytes());
            }
            Command::SetDigitalLine { line, value } => {
                frame[0] = CMD_SET_DIGITAL_LINE;
                frame[1] = line;
                frame[2] = value;
            }
        }
        frame
    }

    pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<Self, ProtocolError> {
        match frame[0] {
            CMD_TERMINATE_PROCESS => Ok(Command::TerminateProcess {
                pid: u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]),
            }),
            CMD_SET_DIGITAL_LINE => Ok(Command::SetDigitalLine {
                line: frame[1],
                value: frame[2],
            }),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::TerminateProcess { pid } => write!(f, "terminate pid {}", pid),
            Command::SetDigitalLine { line, value } => write!(f, "set line {} to {}", line, value),
        }
    }
}

/// One-byte reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Failure = 1,
    InvalidCommand = 2,
    InvalidArgument = 3,
    PermissionDenied = 4,
    NoSuchProcess = 5,
}

impl Status {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Status::Ok),
            1 => Some(Status::Failure),
            2 => Some(Status::InvalidCommand),
            3 => Some(Status::InvalidArgument),
            4 => Some(Status::PermissionDenied),
            5 => Some(Status::NoSuchProcess),
            _ => None,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Failure => "failure",
            Status::InvalidCommand => "invalid command",
            Status::InvalidArgument => "invalid argument",
            Status::PermissionDenied => "permission denied",
            Status::NoSuchProcess => "no such process",
        };
        f.write_str(s)
    }
}

impl From<ValidationError> for Status {
    fn from(_: ValidationError) -> Self {
        Status::InvalidArgument
    }
}

/// The pre-shared key.
///
/// Only deters accidental use: it travels in clear text.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AuthKey(u32);

impl AuthKey {
    pub fn new(key: u32) -> Self {
        Self(key)
    }

    pub fn to_bytes(self) -> [u8; KEY_LEN] {
        self.0.to_le_bytes()
    }

    /// Compares without an early exit on the first differing byte.
    pub fn matches(&self, presented: &[u8; KEY_LEN]) -> bool {
        self.to_bytes()
            .iter()
            .zip(presented.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthKey(****)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// Per-connection authentication state.
///
/// Moves to `Authenticated` once on an exact key match and never goes back.
#[derive(Debug)]
pub struct AuthGate {
    key: AuthKey,
    state: AuthState,
}

impl AuthGate {
    pub fn new(key: AuthKey) -> Self {
        Self {
            key,
            state: AuthState::Unauthenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    pub fn authenticate(&mut self, presented: &[u8; KEY_LEN]) -> Result<(), ProtocolError> {
        if self.is_authenticated() {
            return Ok(());
        }
        if self.key.matches(presented) {
            self.state = AuthState::Authenticated;
            Ok(())
        } else {
            Err(ProtocolError::BadKey)
        }
    }
}

/// Reads until `buf` is full or the peer closes, returning the byte count.
///
/// Timeouts of a socket read deadline surface as [`ProtocolError::Timeout`].
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ProtocolError> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                return Err(ProtocolError::Timeout);
            }
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(got)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
