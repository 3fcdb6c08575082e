//! Test doubles for the [`Store`] contract.

use crate::state::{Change, Store};
use anyhow::{bail, Result};
use slurk_types::{api::DeleteReport, Bet, Game, GameId, RoundRecord};

/// Wraps a store and fails selected writes, for exercising partial-failure paths.
#[derive(Default, Debug)]
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_bet_inserts: bool,
    pub fail_increment: bool,
}

impl<S: Store> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_bet_inserts: false,
            fail_increment: false,
        }
    }
}

impl<S: Store> Store for FlakyStore<S> {
    async fn game(&self, id: &GameId) -> Result<Option<Game>> {
        self.inner.game(id).await
    }

    async fn game_by_code(&self, code: &str) -> Result<Option<Game>> {
        self.inner.game_by_code(code).await
    }

    async fn games(&self) -> Result<Vec<Game>> {
        self.inner.games().await
    }

    async fn round(&self, id: &GameId, index: u32) -> Result<Option<RoundRecord>> {
        self.inner.round(id, index).await
    }

    async fn bets(&self, id: &GameId, index: u32) -> Result<Vec<Bet>> {
        self.inner.bets(id, index).await
    }

    async fn bet_for(&self, id: &GameId, team: &str, index: u32) -> Result<Option<Bet>> {
        self.inner.bet_for(id, team, index).await
    }

    async fn put_game(&mut self, game: Game) -> Result<()> {
        self.inner.put_game(game).await
    }

    async fn put_round(&mut self, round: RoundRecord) -> Result<()> {
        self.inner.put_round(round).await
    }

    async fn insert_bet(&mut self, bet: Bet) -> Result<()> {
        if self.fail_bet_inserts {
            bail!("injected bet insert failure");
        }
        self.inner.insert_bet(bet).await
    }

    async fn delete_game(&mut self, id: &GameId) -> Result<DeleteReport> {
        self.inner.delete_game(id).await
    }

    async fn increment_index(&mut self, id: &GameId) -> Result<u32> {
        if self.fail_increment {
            bail!("injected increment failure");
        }
        self.inner.increment_index(id).await
    }

    async fn apply(&mut self, changes: Vec<Change>) -> Result<()> {
        if self.fail_bet_inserts
            && changes
                .iter()
                .any(|change| matches!(change, Change::InsertBet(_)))
        {
            bail!("injected bet insert failure");
        }
        self.inner.apply(changes).await
    }
}
