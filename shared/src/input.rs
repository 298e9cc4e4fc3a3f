use std::{io, time::Duration};

use crate::{
    game_state::{Direction, Side},
    session::SessionKind,
};

/// which set of keys an event came from. player one uses w/s, player two the arrow keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Player {
    One,
    Two,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Move {
        player: Player,
        direction: Direction,
    },
}

/// A keyboard (or anything standing in for one) that can be polled without stalling the session.
pub trait InputSource {
    /// Waits at most `timeout` for one event. Keys with no meaning are swallowed and reported as
    /// `Ok(None)`.
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>>;
}

/// Which paddle each player's keys steer during a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyMap {
    player_one: Option<Side>,
    player_two: Option<Side>,
}

impl KeyMap {
    pub fn for_kind(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Single | SessionKind::OnlineHost => Self {
                player_one: Some(Side::Left),
                player_two: None,
            },
            SessionKind::Local => Self {
                player_one: Some(Side::Left),
                player_two: Some(Side::Right),
            },
            // the client only owns the right paddle, so either key set drives it.
            SessionKind::OnlineClient => Self {
                player_one: Some(Side::Right),
                player_two: Some(Side::Right),
            },
        }
    }

    pub fn paddle_for(&self, player: Player) -> Option<Side> {
        match player {
            Player::One => self.player_one,
            Player::Two => self.player_two,
        }
    }
}
