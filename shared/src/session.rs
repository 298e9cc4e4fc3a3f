use std::{
    io::{self, Read, Write},
    net::TcpStream,
    thread::sleep,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use rand::rngs::StdRng;

use crate::{
    config::{ConfigError, GameConfig},
    game_state::{GameState, Side},
    input::{InputEvent, InputSource, KeyMap},
    opponent::Opponent,
    sync::{Peer, Role},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionKind {
    /// against the scripted opponent.
    Single,
    /// two players on one keyboard.
    Local,
    OnlineHost,
    OnlineClient,
}

impl SessionKind {
    /// the paddle the person at this terminal plays.
    pub fn local_side(self) -> Side {
        match self {
            SessionKind::OnlineClient => Side::Right,
            SessionKind::Single | SessionKind::Local | SessionKind::OnlineHost => Side::Left,
        }
    }

    pub fn is_online(self) -> bool {
        matches!(self, SessionKind::OnlineHost | SessionKind::OnlineClient)
    }

    /// whether this side steps the ball. a client only ever mirrors the host.
    pub fn runs_physics(self) -> bool {
        self != SessionKind::OnlineClient
    }
}

/// How a session is played. The peer for online play must already be connected and past the name
/// handshake.
pub enum Mode<S = TcpStream> {
    Single,
    Local,
    Online(Peer<S>),
}

pub trait Renderer {
    fn render(&mut self, state: &GameState, scoreboard: &Scoreboard) -> io::Result<()>;
}

/// Keeps the player's name and results between sessions.
pub trait ProfileStore {
    fn display_name(&self) -> String;
    fn online_wins(&self) -> u32;
    /// called once when a session ends, however it ended.
    fn record_outcome(&mut self, kind: SessionKind, won: bool);
}

/// Names shown above the playfield, already placed on the side each player controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scoreboard {
    pub left_name: String,
    pub right_name: String,
    /// the remote player's cumulative online wins, once they have been received.
    pub opponent_wins: Option<u32>,
    pub online: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOver {
    Won(Side),
    Quit,
    ConnectionLost,
    InputFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub reason: GameOver,
    pub left_score: u32,
    pub right_score: u32,
    pub local_side: Side,
    /// a tie (e.g. quitting at 0-0) counts as a loss.
    pub local_won: bool,
}

impl Outcome {
    fn new(reason: GameOver, state: &GameState, local_side: Side) -> Self {
        Self {
            reason,
            left_score: state.left_score,
            right_score: state.right_score,
            local_side,
            local_won: state.score(local_side) > state.score(local_side.opponent()),
        }
    }
}

/// One play-through, from serve to game over.
///
/// Every tick runs, in order: one input poll, the scripted opponent, one ball step (when the tick
/// interval has elapsed), the network exchange, the win check and finally a redraw. Nothing else
/// touches the state.
pub struct Session<I, R, S = TcpStream> {
    kind: SessionKind,
    config: GameConfig,
    state: GameState,
    rng: StdRng,
    input: I,
    renderer: R,
    keymap: KeyMap,
    opponent: Option<Opponent>,
    peer: Option<Peer<S>>,
    scoreboard: Scoreboard,
}

impl<I, R, S> Session<I, R, S>
where
    I: InputSource,
    R: Renderer,
    S: Read + Write,
{
    pub fn new(
        config: GameConfig,
        mode: Mode<S>,
        input: I,
        renderer: R,
        local_name: &str,
        opponent_name: &str,
        mut rng: StdRng,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (kind, opponent, peer) = match mode {
            Mode::Single => (SessionKind::Single, Some(Opponent::new(Side::Right)), None),
            Mode::Local => (SessionKind::Local, None, None),
            Mode::Online(peer) => {
                let kind = match peer.role() {
                    Role::Host => SessionKind::OnlineHost,
                    Role::Client => SessionKind::OnlineClient,
                };
                (kind, None, Some(peer))
            }
        };
        let (left_name, right_name) = match kind.local_side() {
            Side::Left => (local_name, opponent_name),
            Side::Right => (opponent_name, local_name),
        };
        let scoreboard = Scoreboard {
            left_name: left_name.to_owned(),
            right_name: right_name.to_owned(),
            opponent_wins: None,
            online: kind.is_online(),
        };
        let state = GameState::new(&config, Instant::now(), &mut rng);
        Ok(Self {
            kind,
            config,
            state,
            rng,
            input,
            renderer,
            keymap: KeyMap::for_kind(kind),
            opponent,
            peer,
            scoreboard,
        })
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Plays until the session ends, records the result in `profile` and returns it. The peer
    /// connection, if any, is dropped on return.
    pub fn run<P: ProfileStore + ?Sized>(self, profile: &mut P) -> Outcome {
        self.run_with(profile, Instant::now, sleep)
    }

    fn run_with<P, C, W>(mut self, profile: &mut P, mut clock: C, mut wait: W) -> Outcome
    where
        P: ProfileStore + ?Sized,
        C: FnMut() -> Instant,
        W: FnMut(Duration),
    {
        info!("starting {:?} session", self.kind);
        self.render();
        let reason = loop {
            let tick_start = clock();
            if let Some(reason) = self.tick(tick_start) {
                break reason;
            }
            let elapsed = clock().saturating_duration_since(tick_start);
            if let Some(remaining) = self.config.frame_interval.checked_sub(elapsed) {
                wait(remaining);
            }
        };
        let outcome = Outcome::new(reason, &self.state, self.kind.local_side());
        info!(
            "{:?} session over: {:?} at {}-{}",
            self.kind, outcome.reason, outcome.left_score, outcome.right_score
        );
        profile.record_outcome(self.kind, outcome.local_won);
        outcome
    }

    /// Runs a single tick at `now`. Returns why the session ended, if it did.
    pub fn tick(&mut self, now: Instant) -> Option<GameOver> {
        match self.input.poll(self.config.input_timeout) {
            Ok(Some(InputEvent::Quit)) => return Some(GameOver::Quit),
            Ok(Some(InputEvent::Move { player, direction })) => {
                if let Some(side) = self.keymap.paddle_for(player) {
                    self.state.move_paddle(side, direction);
                }
            }
            Ok(None) => {}
            Err(err) => {
                error!("failed to read input: {err}");
                return Some(GameOver::InputFailed);
            }
        }

        if let Some(opponent) = &self.opponent {
            opponent.act(&mut self.state);
        }

        if self.kind.runs_physics() {
            if let Some(scorer) = self.state.advance_ball(now, &mut self.rng) {
                debug!(
                    "{scorer:?} scored, {}-{}",
                    self.state.left_score, self.state.right_score
                );
            }
        }

        if let Some(peer) = &mut self.peer {
            if let Err(err) = peer.exchange(&mut self.state) {
                warn!("lost connection to peer: {err}");
                return Some(GameOver::ConnectionLost);
            }
            self.scoreboard.opponent_wins = peer.opponent_wins();
        }

        if let Some(winner) = self.state.winner() {
            return Some(GameOver::Won(winner));
        }

        self.render();
        None
    }

    fn render(&mut self) {
        if let Err(err) = self.renderer.render(&self.state, &self.scoreboard) {
            warn!("failed to render: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io::{self, ErrorKind},
        time::{Duration, Instant},
    };

    use rand::{rngs::StdRng, SeedableRng};

    use crate::{
        config::GameConfig,
        game_state::{Ball, Direction, GameState, Side},
        input::{InputEvent, InputSource, Player},
        session::{GameOver, Mode, ProfileStore, Renderer, Scoreboard, Session, SessionKind},
        sync::{tests::Duplex, Peer, Role},
    };

    #[derive(Default)]
    struct ScriptedInput {
        events: VecDeque<Option<InputEvent>>,
        polls: usize,
        broken: bool,
    }

    impl ScriptedInput {
        fn new(events: impl IntoIterator<Item = Option<InputEvent>>) -> Self {
            Self {
                events: events.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn poll(&mut self, _: Duration) -> io::Result<Option<InputEvent>> {
            self.polls += 1;
            if self.broken {
                return Err(io::Error::new(ErrorKind::Other, "terminal gone"));
            }
            Ok(self.events.pop_front().flatten())
        }
    }

    #[derive(Default)]
    struct Frames {
        count: usize,
        broken: bool,
        last: Option<Scoreboard>,
    }

    impl Renderer for Frames {
        fn render(&mut self, _: &GameState, scoreboard: &Scoreboard) -> io::Result<()> {
            self.count += 1;
            self.last = Some(scoreboard.clone());
            if self.broken {
                Err(io::Error::new(ErrorKind::Other, "stdout closed"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct MemoryProfile {
        outcomes: Vec<(SessionKind, bool)>,
    }

    impl ProfileStore for MemoryProfile {
        fn display_name(&self) -> String {
            "tester".to_owned()
        }

        fn online_wins(&self) -> u32 {
            0
        }

        fn record_outcome(&mut self, kind: SessionKind, won: bool) {
            self.outcomes.push((kind, won));
        }
    }

    type TestSession = Session<ScriptedInput, Frames, Duplex>;

    fn session(mode: Mode<Duplex>, input: ScriptedInput, seed: u64) -> TestSession {
        Session::new(
            GameConfig::default(),
            mode,
            input,
            Frames::default(),
            "alice",
            "bob",
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    /// a clock that moves on by one tick interval every time the session reads it twice, so the
    /// ball steps on every tick.
    fn stepping_clock() -> impl FnMut() -> Instant {
        let start = Instant::now();
        let interval = GameConfig::default().tick_interval;
        let mut reads = 0u32;
        move || {
            reads += 1;
            start + interval * (reads / 2 + 1)
        }
    }

    fn tick_interval() -> Duration {
        GameConfig::default().tick_interval
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Session::new(
            GameConfig {
                win_score: 0,
                ..GameConfig::default()
            },
            Mode::<Duplex>::Local,
            ScriptedInput::default(),
            Frames::default(),
            "alice",
            "bob",
            StdRng::seed_from_u64(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn quit_ends_before_the_ball_moves() {
        let mut session = session(Mode::Local, ScriptedInput::new([Some(InputEvent::Quit)]), 0);
        let ball = session.state.ball.clone();
        let now = Instant::now() + tick_interval();
        assert_eq!(session.tick(now), Some(GameOver::Quit));
        assert_eq!(session.state.ball, ball);
    }

    #[test]
    fn quit_at_a_tie_is_a_loss() {
        let session = session(Mode::Local, ScriptedInput::new([Some(InputEvent::Quit)]), 0);
        let mut profile = MemoryProfile::default();
        let outcome = session.run_with(&mut profile, stepping_clock(), |_| {});
        assert_eq!(outcome.reason, GameOver::Quit);
        assert!(!outcome.local_won);
        assert_eq!(profile.outcomes, vec![(SessionKind::Local, false)]);
    }

    #[test]
    fn local_mode_moves_both_paddles() {
        let input = ScriptedInput::new([
            Some(InputEvent::Move {
                player: Player::One,
                direction: Direction::Up,
            }),
            Some(InputEvent::Move {
                player: Player::Two,
                direction: Direction::Down,
            }),
        ]);
        let mut session = session(Mode::Local, input, 0);
        let now = Instant::now();
        session.tick(now);
        session.tick(now);
        assert_eq!(
            (session.state.left_paddle, session.state.right_paddle),
            (7, 9)
        );
    }

    #[test]
    fn single_mode_ignores_player_two_keys() {
        let input = ScriptedInput::new([Some(InputEvent::Move {
            player: Player::Two,
            direction: Direction::Down,
        })]);
        let mut session = session(Mode::Single, input, 0);
        session.state.ball.y = 10;
        session.tick(Instant::now());
        assert_eq!(
            (session.state.left_paddle, session.state.right_paddle),
            (8, 8)
        );
    }

    #[test]
    fn win_ends_the_session_on_the_same_tick() {
        let mut session = session(Mode::Local, ScriptedInput::default(), 0);
        session.state.left_score = 4;
        session.state.right_paddle = 0;
        // about to slip past the right paddle.
        session.state.ball = Ball {
            x: 56,
            y: 10,
            vx: 1,
            vy: 1,
        };
        let frames = session.renderer.count;
        let now = Instant::now() + tick_interval();
        assert_eq!(session.tick(now), Some(GameOver::Won(Side::Left)));
        assert_eq!(session.state.left_score, 5);
        assert_eq!(session.renderer.count, frames);
        assert_eq!(session.input.polls, 1);
    }

    #[test]
    fn run_stops_after_the_winning_tick() {
        let mut session = session(Mode::Local, ScriptedInput::default(), 0);
        session.state.left_score = 4;
        session.state.right_paddle = 0;
        session.state.ball = Ball {
            x: 54,
            y: 10,
            vx: 1,
            vy: 1,
        };
        let mut profile = MemoryProfile::default();
        let outcome = session.run_with(&mut profile, stepping_clock(), |_| {});
        assert_eq!(outcome.reason, GameOver::Won(Side::Left));
        assert_eq!((outcome.left_score, outcome.right_score), (5, 0));
        assert!(outcome.local_won);
        assert_eq!(profile.outcomes, vec![(SessionKind::Local, true)]);
    }

    #[test]
    fn scripted_opponent_first_rally() {
        // with no lookahead the opponent trails the ball by a row, so its first return depends on
        // the serve direction.
        for (vx, vy, scorer, ticks) in [
            (1, 1, Side::Left, 27),
            (1, -1, Side::Left, 27),
            (-1, 1, Side::Right, 28),
            (-1, -1, Side::Right, 28),
        ] {
            let mut session = session(Mode::Single, ScriptedInput::default(), 0);
            session.state.ball = Ball {
                x: 30,
                y: 10,
                vx,
                vy,
            };
            let mut now = Instant::now();
            let mut played = 0;
            while session.state.left_score + session.state.right_score == 0 {
                now += tick_interval();
                assert_eq!(session.tick(now), None);
                played += 1;
                // the human paddle never moves.
                assert_eq!(session.state.left_paddle, 8);
            }
            assert_eq!(played, ticks, "serve ({vx}, {vy})");
            assert_eq!(session.state.score(scorer), 1, "serve ({vx}, {vy})");
        }
    }

    #[test]
    fn scripted_opponent_matches_always_finish() {
        // from the centre the ball always reaches the far paddle first, and the trailing opponent
        // cannot return it, so every point goes to the side the serve travels away from.
        for seed in 0..16 {
            let mut session = session(Mode::Single, ScriptedInput::default(), seed);
            let mut now = Instant::now();
            let mut serve = session.state.ball.vx;
            let mut rally = 0;
            let reason = loop {
                now += tick_interval();
                let scores = (session.state.left_score, session.state.right_score);
                let result = session.tick(now);
                rally += 1;
                let state = &session.state;
                if (state.left_score, state.right_score) != scores {
                    let expected = if serve > 0 {
                        (scores.0 + 1, scores.1)
                    } else {
                        (scores.0, scores.1 + 1)
                    };
                    assert_eq!(
                        (state.left_score, state.right_score),
                        expected,
                        "seed {seed}"
                    );
                    assert!(rally == 27 || rally == 28, "seed {seed}: rally of {rally}");
                    serve = state.ball.vx;
                    rally = 0;
                }
                if let Some(reason) = result {
                    break reason;
                }
                assert!(rally < 28, "seed {seed}: rally never ended");
            };
            let GameOver::Won(winner) = reason else {
                panic!("seed {seed}: unexpected {reason:?}");
            };
            let state = &session.state;
            // one point per step, so both sides can never reach the win score together.
            assert_eq!(state.score(winner), 5, "seed {seed}");
            assert!(state.score(winner.opponent()) < 5, "seed {seed}");
            assert_eq!(state.left_paddle, 8, "seed {seed}");
        }
    }

    #[test]
    fn scripted_opponent_at_frame_cadence() {
        // at 30 ms frames the opponent gets about three moves per ball step, but it stops as soon
        // as the ball row is covered, so a ball on its edge row still slips past. it loses matches
        // even to a paddle that never moves.
        let frame = GameConfig::default().frame_interval;
        let mut winners = Vec::new();
        for seed in 0..16 {
            let mut session = session(Mode::Single, ScriptedInput::default(), seed);
            let mut now = Instant::now();
            let mut ticks = 0;
            let reason = loop {
                now += frame;
                if let Some(reason) = session.tick(now) {
                    break reason;
                }
                ticks += 1;
                assert!(ticks < 100_000, "seed {seed}: match never ended");
            };
            let GameOver::Won(winner) = reason else {
                panic!("seed {seed}: unexpected {reason:?}");
            };
            let state = &session.state;
            assert_eq!(state.score(winner), 5, "seed {seed}");
            assert!(state.score(winner.opponent()) < 5, "seed {seed}");
            assert_eq!(state.left_paddle, 8, "seed {seed}");
            winners.push(winner);
        }
        assert!(winners.contains(&Side::Left), "{winners:?}");
        assert!(winners.contains(&Side::Right), "{winners:?}");
    }

    #[test]
    fn broken_renderer_does_not_end_the_session() {
        let mut session = session(Mode::Local, ScriptedInput::default(), 0);
        session.renderer.broken = true;
        let mut now = Instant::now();
        for _ in 0..10 {
            now += tick_interval();
            assert_eq!(session.tick(now), None);
        }
        assert_eq!(session.renderer.count, 10);
    }

    #[test]
    fn broken_input_ends_the_session() {
        let mut input = ScriptedInput::default();
        input.broken = true;
        let session = session(Mode::Single, input, 0);
        let mut profile = MemoryProfile::default();
        let outcome = session.run_with(&mut profile, stepping_clock(), |_| {});
        assert_eq!(outcome.reason, GameOver::InputFailed);
        assert_eq!(profile.outcomes, vec![(SessionKind::Single, false)]);
    }

    #[test]
    fn host_session_ends_when_the_client_goes_quiet() {
        let peer = Peer::new(Duplex::new("9,2\n9,2\n"), Role::Host, Some(4));
        let session = session(Mode::Online(peer), ScriptedInput::default(), 0);
        assert_eq!(session.kind(), SessionKind::OnlineHost);
        let mut profile = MemoryProfile::default();
        let outcome = session.run_with(&mut profile, stepping_clock(), |_| {});
        assert_eq!(outcome.reason, GameOver::ConnectionLost);
        assert_eq!(outcome.local_side, Side::Left);
        assert_eq!(profile.outcomes, vec![(SessionKind::OnlineHost, false)]);
    }

    #[test]
    fn host_session_adopts_client_paddle() {
        let peer = Peer::new(Duplex::new("9,2\n"), Role::Host, Some(4));
        let mut session = session(Mode::Online(peer), ScriptedInput::default(), 0);
        assert_eq!(session.tick(Instant::now() + tick_interval()), None);
        assert_eq!(session.state.right_paddle, 9);
        assert_eq!(session.scoreboard.opponent_wins, Some(2));
        let frame = session.renderer.last.clone().unwrap();
        assert_eq!(frame.left_name, "alice");
        assert_eq!(frame.right_name, "bob");
        assert!(frame.online);
        // one record went out, carrying the host's stepped state and win count.
        let written = session.peer.as_ref().unwrap().get_ref().written().to_owned();
        assert_eq!(written.lines().count(), 1);
        assert!(written.ends_with(",0,0,4\n"));
    }

    #[test]
    fn client_session_mirrors_the_host() {
        let input = ScriptedInput::new([Some(InputEvent::Move {
            player: Player::One,
            direction: Direction::Down,
        })]);
        let peer = Peer::new(
            Duplex::new("3,40,5,-1,1,4,4\n3,39,6,-1,1,4,5\n"),
            Role::Client,
            None,
        );
        let mut session = session(Mode::Online(peer), input, 0);
        assert_eq!(session.kind(), SessionKind::OnlineClient);
        let now = Instant::now() + tick_interval();
        assert_eq!(session.tick(now), None);
        assert_eq!(session.state.left_paddle, 3);
        assert_eq!(
            session.state.ball,
            Ball {
                x: 40,
                y: 5,
                vx: -1,
                vy: 1,
            }
        );
        // the client's own keys drive the right paddle.
        assert_eq!(session.state.right_paddle, 9);
        // scoreboard has the host on the left.
        assert_eq!(session.scoreboard.left_name, "bob");
        assert_eq!(session.scoreboard.right_name, "alice");

        let mut profile = MemoryProfile::default();
        let outcome = session.run_with(&mut profile, stepping_clock(), |_| {});
        assert_eq!(outcome.reason, GameOver::Won(Side::Right));
        assert_eq!((outcome.left_score, outcome.right_score), (4, 5));
        assert!(outcome.local_won);
        assert_eq!(profile.outcomes, vec![(SessionKind::OnlineClient, true)]);
    }

    #[test]
    fn client_never_steps_the_ball() {
        // the host's record arrives unchanged every tick.
        let records = "8,30,10,1,1,0,0\n".repeat(5);
        let peer = Peer::new(Duplex::new(&records), Role::Client, None);
        let mut session = session(Mode::Online(peer), ScriptedInput::default(), 0);
        let mut now = Instant::now();
        for _ in 0..5 {
            now += tick_interval();
            assert_eq!(session.tick(now), None);
            assert_eq!((session.state.ball.x, session.state.ball.y), (30, 10));
        }
    }

    #[test]
    fn malformed_record_ends_the_session() {
        let peer = Peer::new(Duplex::new("5,10\n"), Role::Client, None);
        let mut session = session(Mode::Online(peer), ScriptedInput::default(), 0);
        let now = Instant::now() + tick_interval();
        assert_eq!(session.tick(now), Some(GameOver::ConnectionLost));
    }
}
