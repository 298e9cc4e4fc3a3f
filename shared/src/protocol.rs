//! Line based wire format exchanged between a host and a client once per tick.
//!
//! Every record is a single line of comma separated decimal integers terminated by
//! [`RECORD_DELIMITER`]. The host sends
//! `paddle,ball_x,ball_y,ball_vx,ball_vy,left_score,right_score[,online_wins]` and the client
//! replies with `paddle[,online_wins]`. The trailing win counter is optional in both directions.

use std::str::FromStr;

use thiserror::Error;

use crate::game_state::GameState;

pub const RECORD_DELIMITER: u8 = b'\n';
/// longest line either side will accept before giving up on the peer.
pub const MAX_RECORD_LEN: usize = 128;
/// display names are cut to this many bytes before they are sent.
pub const MAX_NAME_LEN: usize = 12;
pub const DEFAULT_OPPONENT_NAME: &str = "Opponent";

const HOST_FIELDS: usize = 7;
const CLIENT_FIELDS: usize = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty record")]
    Empty,
    #[error("expected {expected} fields plus an optional trailing one, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("field {index} is not a valid number: {value:?}")]
    InvalidField { index: usize, value: String },
    #[error("{field} of {value} is outside the playfield")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("record longer than {max} bytes", max = MAX_RECORD_LEN)]
    TooLong,
}

/// Everything the client needs to mirror the host's game for one tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostRecord {
    pub paddle: u16,
    pub ball_x: u16,
    pub ball_y: u16,
    pub ball_vx: i8,
    pub ball_vy: i8,
    pub left_score: u32,
    pub right_score: u32,
    pub online_wins: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    pub paddle: u16,
    pub online_wins: Option<u32>,
}

impl HostRecord {
    pub fn from_state(state: &GameState, online_wins: Option<u32>) -> Self {
        Self {
            paddle: state.left_paddle,
            ball_x: state.ball.x,
            ball_y: state.ball.y,
            ball_vx: state.ball.vx,
            ball_vy: state.ball.vy,
            left_score: state.left_score,
            right_score: state.right_score,
            online_wins,
        }
    }

    /// Checks the record against the receiving side's playfield. Anything that could not have come
    /// from a host running the same playfield is rejected.
    pub fn validate(&self, state: &GameState) -> Result<(), DecodeError> {
        check_range("paddle", self.paddle.into(), state.max_paddle_y().into())?;
        check_range("ball x", self.ball_x.into(), i64::from(state.width()) - 1)?;
        check_range("ball y", self.ball_y.into(), i64::from(state.height()) - 1)?;
        check_direction("ball vx", self.ball_vx)?;
        check_direction("ball vy", self.ball_vy)
    }
}

impl ClientRecord {
    pub fn validate(&self, state: &GameState) -> Result<(), DecodeError> {
        check_range("paddle", self.paddle.into(), state.max_paddle_y().into())
    }
}

fn check_range(field: &'static str, value: i64, max: i64) -> Result<(), DecodeError> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(DecodeError::OutOfRange { field, value })
    }
}

fn check_direction(field: &'static str, value: i8) -> Result<(), DecodeError> {
    if value == 1 || value == -1 {
        Ok(())
    } else {
        Err(DecodeError::OutOfRange {
            field,
            value: value.into(),
        })
    }
}

impl From<&HostRecord> for String {
    fn from(value: &HostRecord) -> Self {
        let mut record = format!(
            "{},{},{},{},{},{},{}",
            value.paddle,
            value.ball_x,
            value.ball_y,
            value.ball_vx,
            value.ball_vy,
            value.left_score,
            value.right_score
        );
        if let Some(wins) = value.online_wins {
            record.push_str(&format!(",{wins}"));
        }
        record
    }
}

impl From<&ClientRecord> for String {
    fn from(value: &ClientRecord) -> Self {
        match value.online_wins {
            Some(wins) => format!("{},{wins}", value.paddle),
            None => value.paddle.to_string(),
        }
    }
}

impl TryFrom<&str> for HostRecord {
    type Error = DecodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let fields = split_fields(value, HOST_FIELDS)?;
        Ok(Self {
            paddle: parse_field(&fields, 0)?,
            ball_x: parse_field(&fields, 1)?,
            ball_y: parse_field(&fields, 2)?,
            ball_vx: parse_field(&fields, 3)?,
            ball_vy: parse_field(&fields, 4)?,
            left_score: parse_field(&fields, 5)?,
            right_score: parse_field(&fields, 6)?,
            online_wins: parse_trailing(&fields, HOST_FIELDS)?,
        })
    }
}

impl TryFrom<&str> for ClientRecord {
    type Error = DecodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let fields = split_fields(value, CLIENT_FIELDS)?;
        Ok(Self {
            paddle: parse_field(&fields, 0)?,
            online_wins: parse_trailing(&fields, CLIENT_FIELDS)?,
        })
    }
}

/// splits a line into fields, allowing one optional trailing field past `expected`.
fn split_fields(value: &str, expected: usize) -> Result<Vec<&str>, DecodeError> {
    let value = value.trim_end_matches(['\r', '\n']);
    if value.is_empty() {
        return Err(DecodeError::Empty);
    }
    let fields = value.split(',').collect::<Vec<_>>();
    if fields.len() != expected && fields.len() != expected + 1 {
        return Err(DecodeError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}

fn parse_field<T: FromStr>(fields: &[&str], index: usize) -> Result<T, DecodeError> {
    let value = fields[index];
    value
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidField {
            index,
            value: value.to_owned(),
        })
}

fn parse_trailing(fields: &[&str], index: usize) -> Result<Option<u32>, DecodeError> {
    if fields.len() > index {
        parse_field(fields, index).map(Some)
    } else {
        Ok(None)
    }
}

/// Cuts a display name down to [`MAX_NAME_LEN`] bytes without splitting a character.
pub fn truncate_name(name: &str) -> &str {
    let name = name.trim();
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Reads a peer's display name off the wire, falling back to [`DEFAULT_OPPONENT_NAME`].
pub fn decode_name(line: &str) -> String {
    match truncate_name(line) {
        "" => DEFAULT_OPPONENT_NAME.to_owned(),
        name => name.to_owned(),
    }
}
