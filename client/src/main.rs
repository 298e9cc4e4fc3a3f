use std::{fs::File, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use connection::{Connection, DEFAULT_PORT};
use crossterm::terminal::size as terminal_size;
use env_logger::{Env, Target};
use log::warn;
use profile::{Profile, DEFAULT_DATA_FILE};
use rand::{rngs::StdRng, SeedableRng};
use terminal::{Keyboard, Screen, TerminalGuard};
use termpong_shared::{
    protocol::DEFAULT_OPPONENT_NAME, GameConfig, GameOver, Mode, Outcome, ProfileStore, Session,
    Side,
};

mod connection;
mod profile;
mod terminal;

#[derive(Parser)]
#[command(version, about = "Pong in the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Size the playfield to the terminal (offline games only)
    #[arg(long, global = true)]
    fit_terminal: bool,
    /// Profile file holding the username and stats
    #[arg(long, global = true, default_value = DEFAULT_DATA_FILE)]
    data_file: PathBuf,
    /// Write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Points needed to win (both players must agree when online)
    #[arg(long, global = true)]
    win_score: Option<u32>,
    /// Milliseconds between ball steps
    #[arg(long, global = true)]
    tick_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Play against the computer
    Single,
    /// Two players on one keyboard
    Local,
    /// Host an online game and wait for someone to join
    Host {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Join an online game
    Join {
        host: String,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Change your username (max 12 bytes, no commas)
    Name { name: String },
    /// Show your wins and losses
    Stats,
}

impl Command {
    fn is_online(&self) -> bool {
        matches!(self, Command::Host { .. } | Command::Join { .. })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    let mut profile = Profile::load(&cli.data_file);
    let config = game_config(&cli)?;

    let outcome = match &cli.command {
        Command::Name { name } => {
            if !profile.set_username(name) {
                bail!("invalid username (1 to 12 bytes, no commas or control characters)");
            }
            println!("Username set to {}", profile.display_name());
            return Ok(());
        }
        Command::Stats => {
            println!("{}", profile.summary());
            return Ok(());
        }
        Command::Single => play(Mode::Single, config, &mut profile, DEFAULT_OPPONENT_NAME)?,
        Command::Local => play(Mode::Local, config, &mut profile, DEFAULT_OPPONENT_NAME)?,
        Command::Host { port } => {
            let Connection {
                peer,
                opponent_name,
            } = connection::host(
                *port,
                &config,
                &profile.display_name(),
                profile.online_wins(),
            )?;
            play(Mode::Online(peer), config, &mut profile, &opponent_name)?
        }
        Command::Join { host, port } => {
            let Connection {
                peer,
                opponent_name,
            } = connection::join(
                host,
                *port,
                &config,
                &profile.display_name(),
                profile.online_wins(),
            )?;
            play(Mode::Online(peer), config, &mut profile, &opponent_name)?
        }
    };
    report(&outcome);
    Ok(())
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let Some(path) = log_file else {
        env_logger::Builder::from_env(Env::default().default_filter_or("off"))
            .init();
        return Ok(());
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn game_config(cli: &Cli) -> anyhow::Result<GameConfig> {
    let mut config = GameConfig::default();
    if let Some(win_score) = cli.win_score {
        config.win_score = win_score;
    }
    if let Some(tick_ms) = cli.tick_ms {
        config.tick_interval = Duration::from_millis(tick_ms);
    }
    if cli.fit_terminal {
        if cli.command.is_online() {
            warn!("ignoring --fit-terminal, online games use the default playfield");
        } else {
            let (columns, rows) = terminal_size().context("failed to read the terminal size")?;
            config = config.fit_to(columns, rows);
        }
    }
    Ok(config)
}

fn play(
    mode: Mode,
    config: GameConfig,
    profile: &mut Profile,
    opponent_name: &str,
) -> anyhow::Result<Outcome> {
    let session = Session::new(
        config,
        mode,
        Keyboard,
        Screen::new(),
        &profile.display_name(),
        opponent_name,
        StdRng::from_entropy(),
    )
    .context("invalid game settings")?;
    let _guard = TerminalGuard::enter().context("failed to set up the terminal")?;
    Ok(session.run(profile))
}

fn report(outcome: &Outcome) {
    println!("Game Over");
    let (local, opponent) = match outcome.local_side {
        Side::Left => (outcome.left_score, outcome.right_score),
        Side::Right => (outcome.right_score, outcome.left_score),
    };
    println!("Score: {local} - {opponent}");
    match outcome.reason {
        GameOver::Won(_) if outcome.local_won => println!("You won!"),
        GameOver::Won(_) => println!("You lost."),
        GameOver::Quit => println!("You quit."),
        GameOver::ConnectionLost => println!("Connection lost."),
        GameOver::InputFailed => println!("Keyboard input failed."),
    }
}
