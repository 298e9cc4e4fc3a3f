use crate::game_state::{Direction, GameState, Side};

/// Scripted paddle that chases the ball's row one cell per tick. It has no lookahead, so it only
/// reacts once the ball has already left the rows it covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Opponent {
    side: Side,
}

impl Opponent {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    /// The move the paddle should make for a ball on `ball_y`, given the paddle's top row and size.
    pub fn decide(ball_y: u16, paddle_y: u16, paddle_size: u16) -> Option<Direction> {
        if ball_y < paddle_y {
            Some(Direction::Up)
        } else if ball_y >= paddle_y + paddle_size {
            Some(Direction::Down)
        } else {
            None
        }
    }

    pub fn act(&self, state: &mut GameState) {
        if let Some(direction) =
            Self::decide(state.ball.y, state.paddle(self.side), state.paddle_size())
        {
            state.move_paddle(self.side, direction);
        }
    }
}
