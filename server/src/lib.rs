//! Authoritative slurk game server.
//!
//! [`Server`] owns the only copy of every game. Clients never write rows
//! directly: each command runs to completion under one lock, is checked against
//! the round rules and host credential, and then fans an [`Update`] out to every
//! subscriber of the affected game.

use rand::{rngs::StdRng, SeedableRng};
use slurk_execution::{
    ledger, lifecycle, round, selection, Error, Memory, PhaseController, Result, Store,
};
use slurk_types::{
    api::{BetRequest, CreateGameRequest, CreateGameResponse, DeleteReport, JoinRequest, Update, UpdatesFilter},
    normalize_code, Bet, BettingResult, Game, GameId, Player, Round, RoundPhase, RoundRecord,
};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

pub mod api;
pub mod config;
pub mod sweeper;

pub use api::Api;
pub use config::{ConfigError, ServerConfig, ValidatedConfig};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

struct Inner {
    store: Memory,
    rng: StdRng,
    host_tokens: HashMap<GameId, String>,
}

impl Inner {
    /// Load the game and check the caller holds its host token.
    async fn authorize(&self, game_id: &GameId, token: Option<&str>) -> Result<Game> {
        let game = round::load_game(&self.store, game_id).await?;
        match (self.host_tokens.get(game_id), token) {
            (Some(expected), Some(token)) if expected == token => Ok(game),
            _ => Err(Error::Unauthorized),
        }
    }

    async fn record(&self, game_id: &GameId, index: u32) -> Result<RoundRecord> {
        Ok(self
            .store
            .round(game_id, index)
            .await?
            .unwrap_or_else(|| RoundRecord::new(*game_id, index)))
    }
}

pub struct Server {
    pub config: ValidatedConfig,
    inner: Mutex<Inner>,
    updates: broadcast::Sender<Update>,
}

impl Server {
    pub fn new(config: ValidatedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (updates, _) = broadcast::channel(config.broadcast_capacity);
        Self {
            inner: Mutex::new(Inner {
                store: Memory::default(),
                rng,
                host_tokens: HashMap::new(),
            }),
            updates,
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    fn publish(&self, update: Update) {
        let game_id = update.game_id();
        if self.updates.send(update).is_err() {
            debug!(%game_id, "no update subscribers");
        }
    }

    pub async fn create_game(&self, request: CreateGameRequest) -> Result<CreateGameResponse> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let mut params = lifecycle::NewGame::new(request.host_name, request.teams);
        params.starting_balance = request
            .starting_balance
            .unwrap_or(self.config.starting_balance);
        params.challenge_count = request
            .challenge_count
            .unwrap_or(self.config.challenges_per_game);

        let game = lifecycle::create_game(&mut inner.store, &mut inner.rng, params, now_ms()).await?;
        let host_token = Uuid::new_v4().to_string();
        inner.host_tokens.insert(game.id, host_token.clone());
        self.publish(Update::Game { game: game.clone() });
        Ok(CreateGameResponse { game, host_token })
    }

    pub async fn game(&self, game_id: &GameId) -> Result<Game> {
        let inner = self.inner.lock().await;
        round::load_game(&inner.store, game_id).await
    }

    pub async fn game_by_code(&self, code: &str) -> Result<Game> {
        let code = normalize_code(code);
        let inner = self.inner.lock().await;
        inner
            .store
            .game_by_code(&code)
            .await?
            .ok_or(Error::CodeNotFound(code))
    }

    /// Map a subscription filter to the game it follows.
    pub async fn resolve(&self, filter: &UpdatesFilter) -> Result<GameId> {
        match filter {
            UpdatesFilter::Id(game_id) => self.game(game_id).await.map(|game| game.id),
            UpdatesFilter::Code(code) => self.game_by_code(code).await.map(|game| game.id),
        }
    }

    pub async fn join(&self, code: &str, request: JoinRequest) -> Result<Game> {
        let mut inner = self.inner.lock().await;
        let player = Player::new(request.player_id.unwrap_or_default(), request.player_name);
        let game = lifecycle::join_game(
            &mut inner.store,
            code,
            player,
            &request.team_name,
            self.config.starting_balance,
        )
        .await?;
        self.publish(Update::Game { game: game.clone() });
        Ok(game)
    }

    pub async fn shuffle(&self, game_id: &GameId, token: Option<&str>) -> Result<Game> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.authorize(game_id, token).await?;
        let game = lifecycle::shuffle_players(&mut inner.store, &mut inner.rng, game_id).await?;
        self.publish(Update::Game { game: game.clone() });
        Ok(game)
    }

    pub async fn round(&self, game_id: &GameId, index: u32) -> Result<Round> {
        let inner = self.inner.lock().await;
        round::fetch_round(&inner.store, game_id, index).await
    }

    /// Move the current round to `phase`. Entering betting draws the teams.
    pub async fn set_phase(
        &self,
        game_id: &GameId,
        token: Option<&str>,
        phase: RoundPhase,
    ) -> Result<Game> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let game = inner.authorize(game_id, token).await?;
        let (from, index) = (game.phase, game.current_challenge_index);
        let record = inner.store.round(game_id, index).await?;
        PhaseController::check_transition(from, phase, record.as_ref())?;

        if phase == RoundPhase::Betting {
            let record =
                selection::select_teams(&mut inner.store, &mut inner.rng, game_id, index).await?;
            self.publish(Update::Round { round: record });
        }
        let game = round::update_phase(&mut inner.store, game_id, phase).await?;
        info!(%game_id, index, %from, to = %phase, "phase changed");
        self.publish(Update::Game { game: game.clone() });
        Ok(game)
    }

    /// Move from a finished round to betting on the next challenge.
    pub async fn advance(&self, game_id: &GameId, token: Option<&str>) -> Result<Game> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let game = inner.authorize(game_id, token).await?;
        PhaseController::check_advance(&game)?;

        let game = round::advance_round(&mut inner.store, game_id).await?;
        let record = selection::select_teams(
            &mut inner.store,
            &mut inner.rng,
            game_id,
            game.current_challenge_index,
        )
        .await?;
        info!(%game_id, index = game.current_challenge_index, "advanced to next challenge");
        self.publish(Update::Round { round: record });
        self.publish(Update::Game { game: game.clone() });
        Ok(game)
    }

    pub async fn select(&self, game_id: &GameId, token: Option<&str>, index: u32) -> Result<RoundRecord> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.authorize(game_id, token).await?;
        let record = selection::select_teams(&mut inner.store, &mut inner.rng, game_id, index).await?;
        self.publish(Update::Round {
            round: record.clone(),
        });
        Ok(record)
    }

    /// Place a bet on the current challenge while betting is open.
    pub async fn place_bet(&self, game_id: &GameId, request: BetRequest) -> Result<Bet> {
        let mut inner = self.inner.lock().await;
        let game = round::load_game(&inner.store, game_id).await?;
        if game.phase != RoundPhase::Betting {
            return Err(Error::BettingClosed { phase: game.phase });
        }
        if request.challenge_index != game.current_challenge_index {
            return Err(Error::StaleChallenge {
                current: game.current_challenge_index,
                got: request.challenge_index,
            });
        }
        let index = request.challenge_index;
        let challenge = game
            .challenge(index)
            .ok_or(Error::ChallengeNotFound { index })?;
        let record = inner.record(game_id, index).await?;
        selection::check_outcome(challenge, &record.selected_teams, &request.bet_on)?;

        let bet = ledger::submit_bet(
            &mut inner.store,
            game_id,
            &request.team_name,
            index,
            request.amount,
            &request.bet_on,
            now_ms(),
        )
        .await?;
        let game = round::load_game(&inner.store, game_id).await?;
        self.publish(Update::Bet { bet: bet.clone() });
        self.publish(Update::Game { game });
        Ok(bet)
    }

    /// Score the bets on `index` against `winner`, or the recorded winner.
    ///
    /// Empty until a winner is known.
    pub async fn results(
        &self,
        game_id: &GameId,
        index: u32,
        winner: Option<String>,
    ) -> Result<Vec<BettingResult>> {
        let inner = self.inner.lock().await;
        round::load_game(&inner.store, game_id).await?;
        let winner = match winner {
            Some(winner) => Some(winner),
            None => inner.record(game_id, index).await?.winner,
        };
        match winner {
            Some(winner) => ledger::betting_results(&inner.store, game_id, index, &winner).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn declare_winner(
        &self,
        game_id: &GameId,
        token: Option<&str>,
        index: u32,
        winner: &str,
    ) -> Result<RoundRecord> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let game = inner.authorize(game_id, token).await?;
        let challenge = game
            .challenge(index)
            .ok_or(Error::ChallengeNotFound { index })?;
        PhaseController::check_winner(&game, index)?;
        let record = inner.record(game_id, index).await?;
        if record.settled {
            return Err(Error::AlreadySettled { index });
        }
        selection::check_outcome(challenge, &record.selected_teams, winner)?;

        let record = round::declare_winner(&mut inner.store, game_id, index, winner).await?;
        info!(%game_id, index, winner, "winner declared");
        self.publish(Update::Round {
            round: record.clone(),
        });
        Ok(record)
    }

    /// Pay out winning bets. Only available when payouts are enabled.
    pub async fn settle(
        &self,
        game_id: &GameId,
        token: Option<&str>,
        index: u32,
    ) -> Result<Vec<BettingResult>> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.authorize(game_id, token).await?;
        if !self.config.apply_payouts {
            return Err(Error::PayoutsDisabled);
        }
        let results = ledger::settle_round(&mut inner.store, game_id, index).await?;
        let record = inner.record(game_id, index).await?;
        let game = round::load_game(&inner.store, game_id).await?;
        self.publish(Update::Round { round: record });
        self.publish(Update::Game { game });
        Ok(results)
    }

    pub async fn end_game(&self, game_id: &GameId, token: Option<&str>) -> Result<DeleteReport> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.authorize(game_id, token).await?;
        let report = lifecycle::end_game(&mut inner.store, game_id).await?;
        inner.host_tokens.remove(game_id);
        self.publish(Update::Deleted { game_id: *game_id });
        Ok(report)
    }

    /// Delete games past the retention window.
    pub async fn sweep(&self, now_ms: u64) -> Result<DeleteReport> {
        let retention_ms = self.config.retention.as_millis() as u64;
        let Some(cutoff) = now_ms.checked_sub(retention_ms) else {
            return Ok(DeleteReport::default());
        };
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let expired: Vec<GameId> = inner
            .store
            .games()
            .await?
            .into_iter()
            .filter(|game| game.created_at_ms <= cutoff)
            .map(|game| game.id)
            .collect();

        let report = lifecycle::sweep_expired(&mut inner.store, now_ms, retention_ms).await?;
        for game_id in expired {
            inner.host_tokens.remove(&game_id);
            self.publish(Update::Deleted { game_id });
        }
        Ok(report)
    }
}
