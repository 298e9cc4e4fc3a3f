use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use termpong_shared::{protocol::MAX_NAME_LEN, ProfileStore, SessionKind};

pub const DEFAULT_DATA_FILE: &str = "pong_userdata.json";
const DEFAULT_USERNAME: &str = "Player";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub wins: u32,
    pub losses: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub vs_ai: Record,
    pub vs_local: Record,
    pub vs_online: Record,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub username: String,
    #[serde(default)]
    pub stats: Stats,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_owned(),
            stats: Stats::default(),
        }
    }
}

/// The player's name and win/loss counters, kept in a JSON file next to the game.
///
/// Nothing here ever fails loudly: an unreadable file starts a fresh profile and a failed save is
/// logged and forgotten.
pub struct Profile {
    path: PathBuf,
    data: ProfileData,
}

impl Profile {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(data) => data,
                Err(err) => {
                    warn!(
                        "profile {} is corrupt, starting fresh: {err}",
                        path.display()
                    );
                    ProfileData::default()
                }
            },
            Err(err) => {
                info!("no profile at {} ({err}), starting fresh", path.display());
                ProfileData::default()
            }
        };
        Self { path, data }
    }

    #[cfg(test)]
    pub fn data(&self) -> &ProfileData {
        &self.data
    }

    pub fn save(&self) {
        let result = serde_json::to_string_pretty(&self.data)
            .map_err(std::io::Error::from)
            .and_then(|json| fs::write(&self.path, json));
        if let Err(err) = result {
            warn!("failed to save profile to {}: {err}", self.path.display());
        }
    }

    /// Renames the player. Names are trimmed and must be 1 to 12 bytes long, so they are never cut
    /// short on the wire. Commas and control characters would break the record framing.
    pub fn set_username(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty()
            || name.len() > MAX_NAME_LEN
            || name.chars().any(|c| c == ',' || c.is_control())
        {
            return false;
        }
        self.data.username = name.to_owned();
        self.save();
        true
    }

    pub fn summary(&self) -> String {
        let stats = &self.data.stats;
        let mut out = format!("Username: {}\nStats:", self.data.username);
        for (label, record) in [
            ("vs_ai", stats.vs_ai),
            ("vs_local", stats.vs_local),
            ("vs_online", stats.vs_online),
        ] {
            let _ = write!(
                out,
                "\n  {label}: Wins: {}  Losses: {}",
                record.wins, record.losses
            );
        }
        out
    }

    fn record_for(&mut self, kind: SessionKind) -> &mut Record {
        let stats = &mut self.data.stats;
        match kind {
            SessionKind::Single => &mut stats.vs_ai,
            SessionKind::Local => &mut stats.vs_local,
            SessionKind::OnlineHost | SessionKind::OnlineClient => &mut stats.vs_online,
        }
    }
}

impl ProfileStore for Profile {
    fn display_name(&self) -> String {
        self.data.username.clone()
    }

    fn online_wins(&self) -> u32 {
        self.data.stats.vs_online.wins
    }

    fn record_outcome(&mut self, kind: SessionKind, won: bool) {
        let record = self.record_for(kind);
        if won {
            record.wins += 1;
        } else {
            record.losses += 1;
        }
        self.save();
    }
}
