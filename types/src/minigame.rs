use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinigameKind {
    Pairs,
    Wheel,
    Roulette,
    HiLo,
}

impl MinigameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinigameKind::Pairs => "pairs",
            MinigameKind::Wheel => "wheel",
            MinigameKind::Roulette => "roulette",
            MinigameKind::HiLo => "hilo",
        }
    }
}

impl fmt::Display for MinigameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinigameKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pairs" => Ok(MinigameKind::Pairs),
            "wheel" => Ok(MinigameKind::Wheel),
            "roulette" => Ok(MinigameKind::Roulette),
            "hilo" | "high-low" => Ok(MinigameKind::HiLo),
            other => Err(format!("unknown minigame: {other}")),
        }
    }
}

/// Transient outcome of one minigame, reported back to whoever started it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinigameResult {
    pub kind: MinigameKind,
    pub won: bool,
    pub slurks_gained: u64,
    pub slurks_lost: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl MinigameResult {
    pub fn won(kind: MinigameKind, gained: u64) -> Self {
        Self {
            kind,
            won: true,
            slurks_gained: gained,
            slurks_lost: 0,
            player: None,
            team: None,
        }
    }

    pub fn lost(kind: MinigameKind, lost: u64) -> Self {
        Self {
            kind,
            won: false,
            slurks_gained: 0,
            slurks_lost: lost,
            player: None,
            team: None,
        }
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Signed slurk change.
    pub fn net(&self) -> i64 {
        self.slurks_gained as i64 - self.slurks_lost as i64
    }
}
