//! Game creation, joining, reshuffles and teardown.

use rand::{seq::SliceRandom, Rng};
use slurk_types::{
    api::DeleteReport, normalize_code, Game, GameId, Player, RoundPhase, Team,
    TeamInvariantError, CODE_ALPHABET, CODE_LENGTH,
};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::error::{Error, Result};
use crate::round::load_game;
use crate::state::Store;

/// Balance every team starts with unless configured otherwise.
pub const DEFAULT_STARTING_BALANCE: u64 = 50;

/// Challenges drawn for a new game unless configured otherwise.
pub const DEFAULT_CHALLENGE_COUNT: usize = 10;

/// Games older than this are reaped by [`sweep_expired`].
pub const DEFAULT_RETENTION_MS: u64 = 12 * 60 * 60 * 1000;

/// Fewest teams a game can be created with.
pub const MIN_TEAMS: usize = 2;

/// Attempts at drawing an unused join code before giving up.
const MAX_CODE_ATTEMPTS: usize = 64;

/// Parameters for [`create_game`].
#[derive(Clone, Debug)]
pub struct NewGame {
    pub host_name: String,
    pub teams: Vec<Team>,
    pub starting_balance: u64,
    pub challenge_count: usize,
}

impl NewGame {
    pub fn new(host_name: impl Into<String>, teams: Vec<Team>) -> Self {
        Self {
            host_name: host_name.into(),
            teams,
            starting_balance: DEFAULT_STARTING_BALANCE,
            challenge_count: DEFAULT_CHALLENGE_COUNT,
        }
    }
}

fn random_code(rng: &mut impl Rng) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

async fn unused_code<S: Store>(store: &S, rng: &mut impl Rng) -> Result<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = random_code(rng);
        if store.game_by_code(&code).await?.is_none() {
            return Ok(code);
        }
    }
    Err(Error::CodeSpaceExhausted)
}

fn trimmed_player(player: &Player) -> Player {
    let id = if player.id.trim().is_empty() {
        Uuid::new_v4().to_string()
    } else {
        player.id.clone()
    };
    Player::new(id, player.name.trim())
}

/// Validate the roster, allocate a join code and persist a fresh game.
pub async fn create_game<S: Store>(
    store: &mut S,
    rng: &mut impl Rng,
    params: NewGame,
    now_ms: u64,
) -> Result<Game> {
    if params.host_name.trim().is_empty() {
        return Err(TeamInvariantError::EmptyPlayerName.into());
    }
    let teams: Vec<Team> = params
        .teams
        .iter()
        .map(|team| Team {
            name: team.name.trim().to_string(),
            players: team.players.iter().map(trimmed_player).collect(),
        })
        .collect();
    Game::validate_teams(&teams)?;
    if teams.len() < MIN_TEAMS {
        return Err(TeamInvariantError::NotEnoughTeams {
            needed: MIN_TEAMS,
            got: teams.len(),
        }
        .into());
    }

    let code = unused_code(store, rng).await?;
    let balances: BTreeMap<String, u64> = teams
        .iter()
        .map(|team| (team.name.clone(), params.starting_balance))
        .collect();
    let game = Game {
        id: Uuid::new_v4(),
        code,
        host_name: params.host_name.trim().to_string(),
        teams,
        balances,
        challenges: catalog::draw(params.challenge_count.max(1), rng),
        current_challenge_index: 0,
        phase: RoundPhase::Waiting,
        created_at_ms: now_ms,
    };
    store.put_game(game.clone()).await?;
    info!(game_id = %game.id, code = %game.code, teams = game.teams.len(), "game created");
    Ok(game)
}

/// Add a player to `team_name` in the game with join code `code`.
///
/// A team that does not exist yet is created with `starting_balance`.
pub async fn join_game<S: Store>(
    store: &mut S,
    code: &str,
    player: Player,
    team_name: &str,
    starting_balance: u64,
) -> Result<Game> {
    let code = normalize_code(code);
    let mut game = store
        .game_by_code(&code)
        .await?
        .ok_or_else(|| Error::CodeNotFound(code.clone()))?;

    let player = trimmed_player(&player);
    let team_name = team_name.trim();
    if player.name.is_empty() {
        return Err(TeamInvariantError::EmptyPlayerName.into());
    }
    if team_name.is_empty() {
        return Err(TeamInvariantError::EmptyTeamName.into());
    }
    if game.has_player_named(&player.name) {
        return Err(TeamInvariantError::DuplicatePlayerName(player.name).into());
    }

    match game.teams.iter_mut().find(|team| team.name == team_name) {
        Some(team) => team.players.push(player.clone()),
        None => {
            game.teams.push(Team {
                name: team_name.to_string(),
                players: vec![player.clone()],
            });
            game.balances.insert(team_name.to_string(), starting_balance);
        }
    }
    store.put_game(game.clone()).await?;
    info!(game_id = %game.id, player = %player.name, team = team_name, "player joined");
    Ok(game)
}

/// Redistribute every non-captain player at random, keeping team sizes.
pub async fn shuffle_players<S: Store>(
    store: &mut S,
    rng: &mut impl Rng,
    game_id: &GameId,
) -> Result<Game> {
    let mut game = load_game(store, game_id).await?;
    let sizes: Vec<usize> = game.teams.iter().map(|team| team.players.len()).collect();
    let mut pool: Vec<Player> = game
        .teams
        .iter_mut()
        .flat_map(|team| team.players.drain(1.min(team.players.len())..).collect::<Vec<_>>())
        .collect();
    pool.shuffle(rng);

    let mut pool = pool.into_iter();
    for (team, size) in game.teams.iter_mut().zip(sizes) {
        while team.players.len() < size {
            match pool.next() {
                Some(player) => team.players.push(player),
                None => break,
            }
        }
    }
    store.put_game(game.clone()).await?;
    info!(%game_id, "players reshuffled");
    Ok(game)
}

/// Delete a game and everything hanging off it.
pub async fn end_game<S: Store>(store: &mut S, game_id: &GameId) -> Result<DeleteReport> {
    load_game(store, game_id).await?;
    let report = store.delete_game(game_id).await?;
    info!(%game_id, bets = report.bets, "game ended");
    Ok(report)
}

/// Delete every game created at least `retention_ms` before `now_ms`.
pub async fn sweep_expired<S: Store>(
    store: &mut S,
    now_ms: u64,
    retention_ms: u64,
) -> Result<DeleteReport> {
    let Some(cutoff) = now_ms.checked_sub(retention_ms) else {
        return Ok(DeleteReport::default());
    };
    let expired: Vec<GameId> = store
        .games()
        .await?
        .into_iter()
        .filter(|game| game.created_at_ms <= cutoff)
        .map(|game| game.id)
        .collect();

    let mut total = DeleteReport::default();
    for id in expired {
        match store.delete_game(&id).await {
            Ok(report) => {
                total.games += report.games;
                total.bets += report.bets;
            }
            Err(err) => {
                warn!(game_id = %id, ?err, "failed to delete expired game");
                return Err(err.into());
            }
        }
    }
    if total.games > 0 {
        info!(games = total.games, bets = total.bets, "swept expired games");
    }
    Ok(total)
}
