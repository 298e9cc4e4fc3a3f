use std::{
    io::{self, stdout, Stdout, Write},
    time::Duration,
};

use crossterm::{
    cursor::{self, MoveTo},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use log::warn;
use termpong_shared::{
    Direction, GameState, InputEvent, InputSource, Player, Renderer, Scoreboard, Side,
};

/// Puts the terminal into raw mode on an alternate screen for as long as it lives.
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            cursor::Hide,
            MoveTo(0, 0)
        )?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(err) = execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show) {
            warn!("failed to leave alternate screen: {err}");
        }
        if let Err(err) = disable_raw_mode() {
            warn!("failed to disable raw mode: {err}");
        }
    }
}

pub struct Keyboard;

impl InputSource for Keyboard {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<InputEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key_event) => Ok(map_key(key_event)),
            _ => Ok(None),
        }
    }
}

fn map_key(key_event: KeyEvent) -> Option<InputEvent> {
    if key_event.kind != KeyEventKind::Press {
        return None;
    }
    let movement = |player, direction| Some(InputEvent::Move { player, direction });
    match key_event.code {
        KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(InputEvent::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(InputEvent::Quit),
        KeyCode::Char('w') => movement(Player::One, Direction::Up),
        KeyCode::Char('s') => movement(Player::One, Direction::Down),
        KeyCode::Up => movement(Player::Two, Direction::Up),
        KeyCode::Down => movement(Player::Two, Direction::Down),
        _ => None,
    }
}

/// Redraws the whole playfield in place every frame.
pub struct Screen {
    stdout: Stdout,
}

impl Screen {
    pub fn new() -> Self {
        Self { stdout: stdout() }
    }
}

impl Renderer for Screen {
    fn render(&mut self, state: &GameState, scoreboard: &Scoreboard) -> io::Result<()> {
        let mut w = self.stdout.lock();
        for (row, line) in frame_lines(state, scoreboard).iter().enumerate() {
            queue!(
                w,
                MoveTo(0, row as u16),
                Print(line),
                Clear(ClearType::UntilNewLine)
            )?;
        }
        w.flush()
    }
}

fn score_line(state: &GameState, scoreboard: &Scoreboard) -> String {
    let mut line = format!(
        "{}: {}  |  {}: {}",
        scoreboard.left_name, state.left_score, scoreboard.right_name, state.right_score
    );
    if scoreboard.online {
        match scoreboard.opponent_wins {
            Some(wins) => line.push_str(&format!("  (Wins: {wins})")),
            None => line.push_str("  (Wins: ?)"),
        }
    }
    line
}

fn frame_lines(state: &GameState, scoreboard: &Scoreboard) -> Vec<String> {
    let width = usize::from(state.width());
    let border = "-".repeat(width);
    let right_column = state.width() - 2;
    let mut lines = Vec::with_capacity(usize::from(state.height()) + 4);
    lines.push(score_line(state, scoreboard));
    lines.push(border.clone());
    for y in 0..state.height() {
        let line = (0..state.width())
            .map(|x| {
                if x == 1 && state.paddle_covers(Side::Left, y) {
                    '|'
                } else if x == right_column && state.paddle_covers(Side::Right, y) {
                    '|'
                } else if x == state.ball.x && y == state.ball.y {
                    'O'
                } else {
                    ' '
                }
            })
            .collect();
        lines.push(line);
    }
    lines.push(border);
    lines.push("Press 'q' to quit".to_owned());
    lines
}
