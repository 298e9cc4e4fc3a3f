use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};

use log::debug;
use thiserror::Error;

use crate::{
    game_state::GameState,
    protocol::{
        decode_name, truncate_name, ClientRecord, DecodeError, HostRecord, MAX_RECORD_LEN,
        RECORD_DELIMITER,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// runs the ball physics and scoring, and sends the result every tick.
    Host,
    /// only contributes its own paddle and mirrors everything else from the host.
    Client,
}

/// Anything that goes wrong talking to the peer. Every variant ends the session: without sequence
/// numbers a lost or garbled record is indistinguishable from a dead link.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("timed out waiting for the peer")]
    TimedOut,
    #[error("connection error: {0}")]
    Io(#[source] io::Error),
    #[error("malformed record {line:?}: {source}")]
    Malformed {
        line: String,
        #[source]
        source: DecodeError,
    },
}

impl From<io::Error> for SyncError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => SyncError::TimedOut,
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => SyncError::PeerClosed,
            _ => SyncError::Io(value),
        }
    }
}

/// One end of a host/client link.
///
/// The stream is expected to carry its own read/write timeouts (see
/// [`TcpStream::set_read_timeout`](std::net::TcpStream::set_read_timeout)) so that a silent peer
/// can never stall the session indefinitely.
pub struct Peer<S> {
    stream: BufReader<S>,
    role: Role,
    buffer: Vec<u8>,
    local_wins: Option<u32>,
    opponent_wins: Option<u32>,
}

impl<S: Read + Write> Peer<S> {
    /// `local_wins` is this player's cumulative online win count, sent along with every record.
    pub fn new(stream: S, role: Role, local_wins: Option<u32>) -> Self {
        Self {
            stream: BufReader::with_capacity(MAX_RECORD_LEN * 4, stream),
            role,
            buffer: Vec::with_capacity(MAX_RECORD_LEN + 1),
            local_wins,
            opponent_wins: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// the peer's cumulative online wins, as of the last record received.
    pub fn opponent_wins(&self) -> Option<u32> {
        self.opponent_wins
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Swaps display names with the peer. The host listens first, the client speaks first. Returns
    /// the peer's name.
    pub fn handshake(&mut self, local_name: &str) -> Result<String, SyncError> {
        let local_name = truncate_name(local_name).to_owned();
        let opponent_name = match self.role {
            Role::Host => {
                let line = self.receive()?;
                self.send(&local_name)?;
                line
            }
            Role::Client => {
                self.send(&local_name)?;
                self.receive()?
            }
        };
        let opponent_name = decode_name(&opponent_name);
        debug!("handshake complete, playing against {opponent_name}");
        Ok(opponent_name)
    }

    /// Runs one tick's exchange. The host publishes its state and adopts the client's paddle; the
    /// client publishes its paddle and overwrites its mirror with the host's state. On error the
    /// state is left as it was before the call.
    pub fn exchange(&mut self, state: &mut GameState) -> Result<(), SyncError> {
        match self.role {
            Role::Host => self.exchange_as_host(state),
            Role::Client => self.exchange_as_client(state),
        }
    }

    fn exchange_as_host(&mut self, state: &mut GameState) -> Result<(), SyncError> {
        let record = HostRecord::from_state(state, self.local_wins);
        self.send(&String::from(&record))?;
        let line = self.receive()?;
        let reply = ClientRecord::try_from(line.as_str())
            .and_then(|reply| reply.validate(state).map(|_| reply))
            .map_err(|source| SyncError::Malformed { line, source })?;
        state.right_paddle = reply.paddle;
        self.opponent_wins = reply.online_wins;
        Ok(())
    }

    fn exchange_as_client(&mut self, state: &mut GameState) -> Result<(), SyncError> {
        let record = ClientRecord {
            paddle: state.right_paddle,
            online_wins: self.local_wins,
        };
        self.send(&String::from(&record))?;
        let line = self.receive()?;
        let update = HostRecord::try_from(line.as_str())
            .and_then(|update| update.validate(state).map(|_| update))
            .map_err(|source| SyncError::Malformed { line, source })?;
        state.left_paddle = update.paddle;
        state.ball.x = update.ball_x;
        state.ball.y = update.ball_y;
        state.ball.vx = update.ball_vx;
        state.ball.vy = update.ball_vy;
        state.left_score = update.left_score;
        state.right_score = update.right_score;
        self.opponent_wins = update.online_wins;
        Ok(())
    }

    fn send(&mut self, line: &str) -> Result<(), SyncError> {
        debug!("sending {line:?}");
        let stream = self.stream.get_mut();
        stream.write_all(line.as_bytes())?;
        stream.write_all(&[RECORD_DELIMITER])?;
        stream.flush()?;
        Ok(())
    }

    /// reads one delimited line, without the delimiter.
    fn receive(&mut self) -> Result<String, SyncError> {
        let buffer = &mut self.buffer;
        buffer.clear();
        let n = (&mut self.stream)
            .take(MAX_RECORD_LEN as u64 + 1)
            .read_until(RECORD_DELIMITER, buffer)?;
        if n == 0 {
            return Err(SyncError::PeerClosed);
        }
        if buffer.last() != Some(&RECORD_DELIMITER) {
            return Err(if n > MAX_RECORD_LEN {
                SyncError::Malformed {
                    line: String::from_utf8_lossy(buffer).into_owned(),
                    source: DecodeError::TooLong,
                }
            } else {
                // the peer went away part way through a line.
                SyncError::PeerClosed
            });
        }
        let line = String::from_utf8_lossy(&buffer[..n - 1]).into_owned();
        debug!("received {line:?}");
        Ok(line)
    }
}
