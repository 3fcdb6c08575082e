//! Client-side projection of a game.
//!
//! [`RoundMirror`] keeps the current [`Round`] in sync by re-fetching the whole
//! projection whenever an update for its game arrives. [`HostControls`] wraps
//! the host's phase commands with a local "is transitioning" flag so a
//! double-tap sends one command instead of two.

use crate::{Client, Error, Result, Stream};
use slurk_execution::{round::is_round_ready, PhaseController};
use slurk_types::{api::Update, Game, GameId, Round, RoundPhase};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub struct RoundMirror {
    client: Client,
    game_id: GameId,
    game: Option<Game>,
    round: Option<Round>,
    deleted: bool,
}

impl RoundMirror {
    pub fn new(client: Client, game_id: GameId) -> Self {
        Self {
            client,
            game_id,
            game: None,
            round: None,
            deleted: false,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    /// True once the index has run past the last challenge.
    pub fn is_exhausted(&self) -> bool {
        self.game.as_ref().is_some_and(Game::is_exhausted)
    }

    /// True once the last challenge is finished or the index ran out.
    pub fn is_game_over(&self) -> bool {
        self.game.as_ref().is_some_and(PhaseController::is_game_over)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn is_ready(&self, is_transitioning: bool) -> bool {
        is_round_ready(self.round.as_ref(), is_transitioning)
    }

    /// Re-fetch the game and the projection for its current index.
    pub async fn refresh(&mut self) -> Result<()> {
        let game = self.client.game(&self.game_id).await?;
        self.round = if game.is_exhausted() {
            None
        } else {
            Some(
                self.client
                    .round(&self.game_id, game.current_challenge_index)
                    .await?,
            )
        };
        debug!(game_id = %self.game_id, index = game.current_challenge_index, phase = %game.phase, "mirror refreshed");
        self.game = Some(game);
        Ok(())
    }

    /// Apply one update. Returns whether it concerned this game.
    pub async fn apply(&mut self, update: &Update) -> Result<bool> {
        if update.game_id() != self.game_id {
            return Ok(false);
        }
        if let Update::Deleted { .. } = update {
            self.mark_deleted();
            return Ok(true);
        }
        match self.refresh().await {
            Ok(()) => Ok(true),
            // Updates queued before a delete can arrive after the game is gone.
            Err(err) if err.code() == Some("GAME_NOT_FOUND") => {
                self.mark_deleted();
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    fn mark_deleted(&mut self) {
        self.deleted = true;
        self.game = None;
        self.round = None;
    }

    /// Wait for the next update on `stream` and apply it.
    ///
    /// Returns `false` when the stream has ended or the game was deleted.
    pub async fn follow(&mut self, stream: &mut Stream) -> Result<bool> {
        match stream.next().await {
            Some(Ok(update)) => {
                self.apply(&update).await?;
                Ok(!self.deleted)
            }
            Some(Err(Error::ConnectionClosed)) | None => Ok(false),
            Some(Err(err)) => Err(err),
        }
    }
}

/// Host phase commands guarded against overlapping calls.
pub struct HostControls {
    client: Client,
    game_id: GameId,
    transitioning: AtomicBool,
}

struct TransitionGuard<'a>(&'a AtomicBool);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl HostControls {
    pub fn new(client: Client, game_id: GameId) -> Result<Self> {
        if client.host_token().is_none() {
            return Err(Error::MissingHostToken);
        }
        Ok(Self {
            client,
            game_id,
            transitioning: AtomicBool::new(false),
        })
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<TransitionGuard<'_>> {
        self.transitioning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::Transitioning)?;
        Ok(TransitionGuard(&self.transitioning))
    }

    pub async fn set_phase(&self, phase: RoundPhase) -> Result<Game> {
        let _guard = self.begin()?;
        self.client.set_phase(&self.game_id, phase).await
    }

    pub async fn advance(&self) -> Result<Game> {
        let _guard = self.begin()?;
        self.client.advance(&self.game_id).await
    }

    /// Take the next step from `phase`: the next phase, or the next challenge.
    pub async fn step(&self, phase: RoundPhase) -> Result<Game> {
        match PhaseController::next_phase(phase) {
            Some(next) => self.set_phase(next).await,
            None => self.advance().await,
        }
    }
}
