//! JSON bodies exchanged between the server and its clients.

use crate::{Bet, BettingResult, Game, GameId, RoundPhase, RoundRecord, Team};
use serde::{Deserialize, Serialize};

/// Header carrying the host credential on privileged requests.
pub const HOST_TOKEN_HEADER: &str = "x-host-token";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub host_name: String,
    pub teams: Vec<Team>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGameResponse {
    pub game: Game,
    pub host_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub player_name: String,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRequest {
    pub phase: RoundPhase,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRequest {
    pub team_name: String,
    pub challenge_index: u32,
    pub amount: u64,
    pub bet_on: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRequest {
    pub winner: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub selected_teams: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub results: Vec<BettingResult>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub games: usize,
    pub bets: usize,
}

/// Error envelope returned with every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
}

/// Change notification pushed to subscribers of a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    Game { game: Game },
    Round { round: RoundRecord },
    Bet { bet: Bet },
    Deleted { game_id: GameId },
}

impl Update {
    pub fn game_id(&self) -> GameId {
        match self {
            Update::Game { game } => game.id,
            Update::Round { round } => round.game_id,
            Update::Bet { bet } => bet.game_id,
            Update::Deleted { game_id } => *game_id,
        }
    }
}

/// Which game a change-feed subscriber is interested in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdatesFilter {
    Id(GameId),
    Code(String),
}
