//! Game core for terminal pong: the playfield physics, the scripted opponent, the host/client
//! record exchange and the loop that ties them together once per tick.

pub mod config;
pub mod game_state;
pub mod input;
pub mod opponent;
pub mod protocol;
pub mod session;
pub mod sync;

pub use config::{ConfigError, GameConfig};
pub use game_state::{Ball, Direction, GameState, Side};
pub use input::{InputEvent, InputSource, Player};
pub use session::{
    GameOver, Mode, Outcome, ProfileStore, Renderer, Scoreboard, Session, SessionKind,
};
pub use sync::{Peer, Role, SyncError};
