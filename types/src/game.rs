use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Opaque game identifier.
pub type GameId = Uuid;

/// Characters used for join codes (no 0/O or 1/I look-alikes).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a join code.
pub const CODE_LENGTH: usize = 4;

/// Outcome token for a team-vs-itself challenge the team completed.
pub const OUTCOME_SUCCESS: &str = "success";

/// Outcome token for a team-vs-itself challenge the team failed.
pub const OUTCOME_FAILURE: &str = "failure";

/// Normalize a human-entered join code (trimmed, upper case).
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TeamInvariantError {
    #[error("team name must not be empty")]
    EmptyTeamName,
    #[error("duplicate team name: {0}")]
    DuplicateTeamName(String),
    #[error("player name must not be empty")]
    EmptyPlayerName,
    #[error("duplicate player name: {0}")]
    DuplicatePlayerName(String),
    #[error("at least {needed} teams are required (got {got})")]
    NotEnoughTeams { needed: usize, got: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A team is identified by its name; balances live on [`Game::balances`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            players: Vec::new(),
        }
    }

    /// The first player on the roster. Captains never move during a reshuffle.
    pub fn captain(&self) -> Option<&Player> {
        self.players.first()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchupType {
    OneVsOne,
    TeamVsTeam,
    TeamVsItself,
}

impl MatchupType {
    /// Number of teams drawn for a challenge of this type.
    pub fn team_count(&self) -> usize {
        match self {
            MatchupType::OneVsOne | MatchupType::TeamVsTeam => 2,
            MatchupType::TeamVsItself => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchupType::OneVsOne => "one-vs-one",
            MatchupType::TeamVsTeam => "team-vs-team",
            MatchupType::TeamVsItself => "team-vs-itself",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub title: String,
    pub description: String,
    pub category: String,
    pub matchup: MatchupType,
    pub odds: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    #[default]
    Waiting,
    Betting,
    Playing,
    Finished,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Betting => "betting",
            RoundPhase::Playing => "playing",
            RoundPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundPhase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(RoundPhase::Waiting),
            "betting" => Ok(RoundPhase::Betting),
            "playing" => Ok(RoundPhase::Playing),
            "finished" => Ok(RoundPhase::Finished),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// The shared game row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub code: String,
    pub host_name: String,
    pub teams: Vec<Team>,
    pub balances: BTreeMap<String, u64>,
    pub challenges: Vec<Challenge>,
    pub current_challenge_index: u32,
    pub phase: RoundPhase,
    pub created_at_ms: u64,
}

impl Game {
    pub fn team(&self, name: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.name == name)
    }

    pub fn balance(&self, team_name: &str) -> Option<u64> {
        self.balances.get(team_name).copied()
    }

    pub fn challenge(&self, index: u32) -> Option<&Challenge> {
        self.challenges.get(index as usize)
    }

    /// True once the current index has run past the last drawn challenge.
    pub fn is_exhausted(&self) -> bool {
        self.current_challenge_index as usize >= self.challenges.len()
    }

    pub fn total_balance(&self) -> u64 {
        self.balances.values().sum()
    }

    /// Check roster invariants: non-empty unique team names and unique player names.
    pub fn validate_teams(teams: &[Team]) -> Result<(), TeamInvariantError> {
        let mut team_names = HashSet::new();
        let mut player_names = HashSet::new();
        for team in teams {
            if team.name.trim().is_empty() {
                return Err(TeamInvariantError::EmptyTeamName);
            }
            if !team_names.insert(team.name.as_str()) {
                return Err(TeamInvariantError::DuplicateTeamName(team.name.clone()));
            }
            for player in &team.players {
                if player.name.trim().is_empty() {
                    return Err(TeamInvariantError::EmptyPlayerName);
                }
                if !player_names.insert(player.name.to_lowercase()) {
                    return Err(TeamInvariantError::DuplicatePlayerName(player.name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn has_player_named(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.teams
            .iter()
            .flat_map(|team| team.players.iter())
            .any(|player| player.name.to_lowercase() == wanted)
    }
}

/// Per-(game, challenge index) row holding the drawn teams and declared winner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub game_id: GameId,
    pub challenge_index: u32,
    #[serde(default)]
    pub selected_teams: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default)]
    pub settled: bool,
}

impl RoundRecord {
    pub fn new(game_id: GameId, challenge_index: u32) -> Self {
        Self {
            game_id,
            challenge_index,
            selected_teams: Vec::new(),
            winner: None,
            settled: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub game_id: GameId,
    pub team_name: String,
    pub challenge_index: u32,
    pub amount: u64,
    pub bet_on: String,
    pub created_at_ms: u64,
}

/// Settlement view of a single bet. `delta` is informational; the stake was
/// already debited when the bet was placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingResult {
    pub team_name: String,
    pub bet_on: String,
    pub amount: u64,
    pub is_correct: bool,
    pub delta: i64,
}

/// Everything a client needs to render one challenge index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub game: Game,
    pub challenge_index: u32,
    pub challenge: Challenge,
    pub phase: RoundPhase,
    pub selected_teams: Vec<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<String>,
    #[serde(default)]
    pub results: Vec<BettingResult>,
}
