use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::GameConfig;

/// column the left paddle's hit test happens on. the right paddle mirrors it at `width - 3`.
pub const LEFT_PADDLE_X: u16 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ball {
    pub x: u16,
    pub y: u16,
    /// always -1 or 1.
    pub vx: i8,
    /// always -1 or 1.
    pub vy: i8,
}

impl Ball {
    fn centred<R: Rng + ?Sized>(width: u16, height: u16, rng: &mut R) -> Self {
        let (vx, vy) = serve(rng);
        Self {
            x: width / 2,
            y: height / 2,
            vx,
            vy,
        }
    }
}

/// picks one of the four diagonals uniformly.
pub fn serve<R: Rng + ?Sized>(rng: &mut R) -> (i8, i8) {
    let vx = if rng.gen::<bool>() { 1 } else { -1 };
    let vy = if rng.gen::<bool>() { 1 } else { -1 };
    (vx, vy)
}

/// Positions, velocities and scores for one session, plus the physics that advances them.
///
/// Paddle positions are the top row of the paddle and are kept within `0..=height - paddle_size` by
/// every mutation. The ball never leaves `0..width` x `0..height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    width: u16,
    height: u16,
    paddle_size: u16,
    win_score: u32,
    tick_interval: Duration,
    last_advance: Instant,
    pub left_paddle: u16,
    pub right_paddle: u16,
    pub ball: Ball,
    pub left_score: u32,
    pub right_score: u32,
}

impl GameState {
    /// Centres both paddles and the ball and serves in a random diagonal direction. `config` is
    /// expected to have been validated.
    pub fn new<R: Rng + ?Sized>(config: &GameConfig, now: Instant, rng: &mut R) -> Self {
        let paddle_start = (config.height - config.paddle_size) / 2;
        Self {
            width: config.width,
            height: config.height,
            paddle_size: config.paddle_size,
            win_score: config.win_score,
            tick_interval: config.tick_interval,
            last_advance: now,
            left_paddle: paddle_start,
            right_paddle: paddle_start,
            ball: Ball::centred(config.width, config.height, rng),
            left_score: 0,
            right_score: 0,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn paddle_size(&self) -> u16 {
        self.paddle_size
    }

    pub fn max_paddle_y(&self) -> u16 {
        self.height - self.paddle_size
    }

    pub fn right_paddle_x(&self) -> u16 {
        self.width - 3
    }

    pub fn paddle(&self, side: Side) -> u16 {
        match side {
            Side::Left => self.left_paddle,
            Side::Right => self.right_paddle,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_score,
            Side::Right => self.right_score,
        }
    }

    /// Moves a paddle one cell. Moves past either edge are clamped away.
    pub fn move_paddle(&mut self, side: Side, direction: Direction) {
        let current = self.paddle(side);
        let target = match direction {
            Direction::Up => current.saturating_sub(1),
            Direction::Down => current.saturating_add(1),
        };
        self.set_paddle(side, target);
    }

    pub fn set_paddle(&mut self, side: Side, y: u16) {
        let y = y.min(self.max_paddle_y());
        match side {
            Side::Left => self.left_paddle = y,
            Side::Right => self.right_paddle = y,
        }
    }

    /// whether a ball on row `y` would be returned by the paddle on `side`.
    pub fn paddle_covers(&self, side: Side, y: u16) -> bool {
        let top = self.paddle(side);
        top <= y && y < top + self.paddle_size
    }

    /// Steps the ball one cell if at least one tick interval has passed since the last step.
    /// Returns the side that scored, if the step ended a rally.
    pub fn advance_ball<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> Option<Side> {
        if now.saturating_duration_since(self.last_advance) < self.tick_interval {
            return None;
        }
        self.last_advance = now;
        self.step_ball(rng)
    }

    fn step_ball<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Side> {
        let max_x = i32::from(self.width) - 1;
        let max_y = i32::from(self.height) - 1;
        let ball = &mut self.ball;

        let next_y = i32::from(ball.y) + i32::from(ball.vy);
        if !(0..=max_y).contains(&next_y) {
            ball.vy = -ball.vy;
        }
        ball.x = (i32::from(ball.x) + i32::from(ball.vx)).clamp(0, max_x) as u16;
        ball.y = (i32::from(ball.y) + i32::from(ball.vy)).clamp(0, max_y) as u16;

        // walls first, so a ball hitting a corner bounces off both.
        if (ball.y == 0 && ball.vy < 0) || (i32::from(ball.y) == max_y && ball.vy > 0) {
            ball.vy = -ball.vy;
        }

        let (x, y, vx) = (ball.x, ball.y, ball.vx);
        if vx < 0 && x <= LEFT_PADDLE_X {
            self.resolve_paddle(Side::Left, y, rng)
        } else if vx > 0 && x >= self.right_paddle_x() {
            self.resolve_paddle(Side::Right, y, rng)
        } else {
            None
        }
    }

    fn resolve_paddle<R: Rng + ?Sized>(&mut self, side: Side, y: u16, rng: &mut R) -> Option<Side> {
        if self.paddle_covers(side, y) {
            self.ball.vx = -self.ball.vx;
            return None;
        }
        let scorer = side.opponent();
        match scorer {
            Side::Left => self.left_score += 1,
            Side::Right => self.right_score += 1,
        }
        self.ball = Ball::centred(self.width, self.height, rng);
        Some(scorer)
    }

    /// the side that has reached the win score, if any.
    pub fn winner(&self) -> Option<Side> {
        if self.left_score >= self.win_score {
            Some(Side::Left)
        } else if self.right_score >= self.win_score {
            Some(Side::Right)
        } else {
            None
        }
    }
}
