use anyhow::{anyhow, bail, Result};
use slurk_types::{api::DeleteReport, Bet, Game, GameId, RoundRecord};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;

/// A single write against the store.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Change {
    PutGame(Game),
    PutRound(RoundRecord),
    InsertBet(Bet),
}

/// Row-oriented backing store for games, per-round records and bets.
pub trait Store {
    fn game(&self, id: &GameId) -> impl Future<Output = Result<Option<Game>>>;
    fn game_by_code(&self, code: &str) -> impl Future<Output = Result<Option<Game>>>;
    fn games(&self) -> impl Future<Output = Result<Vec<Game>>>;
    fn round(&self, id: &GameId, index: u32) -> impl Future<Output = Result<Option<RoundRecord>>>;
    fn bets(&self, id: &GameId, index: u32) -> impl Future<Output = Result<Vec<Bet>>>;
    fn bet_for(
        &self,
        id: &GameId,
        team: &str,
        index: u32,
    ) -> impl Future<Output = Result<Option<Bet>>>;

    fn put_game(&mut self, game: Game) -> impl Future<Output = Result<()>>;
    fn put_round(&mut self, round: RoundRecord) -> impl Future<Output = Result<()>>;
    fn insert_bet(&mut self, bet: Bet) -> impl Future<Output = Result<()>>;

    /// Delete a game together with its rounds and bets.
    fn delete_game(&mut self, id: &GameId) -> impl Future<Output = Result<DeleteReport>>;

    /// Atomically bump the current challenge index and return the new value.
    fn increment_index(&mut self, id: &GameId) -> impl Future<Output = Result<u32>>;

    /// Apply changes in order. Stores that can do better should make this atomic.
    fn apply(&mut self, changes: Vec<Change>) -> impl Future<Output = Result<()>> {
        async {
            for change in changes {
                match change {
                    Change::PutGame(game) => self.put_game(game).await?,
                    Change::PutRound(round) => self.put_round(round).await?,
                    Change::InsertBet(bet) => self.insert_bet(bet).await?,
                }
            }
            Ok(())
        }
    }
}

type BetKey = (GameId, u32, String);

/// In-process store. Bets are unique per (game, index, team) at the storage level.
#[derive(Default, Debug)]
pub struct Memory {
    games: HashMap<GameId, Game>,
    codes: HashMap<String, GameId>,
    rounds: BTreeMap<(GameId, u32), RoundRecord>,
    bets: BTreeMap<BetKey, Bet>,
}

impl Memory {
    fn bet_key(bet: &Bet) -> BetKey {
        (bet.game_id, bet.challenge_index, bet.team_name.clone())
    }

    fn check(&self, change: &Change, staged_bets: &mut Vec<BetKey>) -> Result<()> {
        match change {
            Change::PutGame(game) => {
                if let Some(existing) = self.codes.get(&game.code) {
                    if *existing != game.id {
                        bail!("join code {} already in use", game.code);
                    }
                }
            }
            Change::PutRound(_) => {}
            Change::InsertBet(bet) => {
                if !self.games.contains_key(&bet.game_id) {
                    bail!("game {} does not exist", bet.game_id);
                }
                let key = Self::bet_key(bet);
                if self.bets.contains_key(&key) || staged_bets.contains(&key) {
                    bail!(
                        "bet for team {} on challenge {} already exists",
                        bet.team_name,
                        bet.challenge_index
                    );
                }
                staged_bets.push(key);
            }
        }
        Ok(())
    }

    fn write(&mut self, change: Change) {
        match change {
            Change::PutGame(game) => {
                self.codes.insert(game.code.clone(), game.id);
                self.games.insert(game.id, game);
            }
            Change::PutRound(round) => {
                self.rounds
                    .insert((round.game_id, round.challenge_index), round);
            }
            Change::InsertBet(bet) => {
                self.bets.insert(Self::bet_key(&bet), bet);
            }
        }
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    pub fn bet_count(&self) -> usize {
        self.bets.len()
    }
}

impl Store for Memory {
    async fn game(&self, id: &GameId) -> Result<Option<Game>> {
        Ok(self.games.get(id).cloned())
    }

    async fn game_by_code(&self, code: &str) -> Result<Option<Game>> {
        Ok(self
            .codes
            .get(code)
            .and_then(|id| self.games.get(id))
            .cloned())
    }

    async fn games(&self) -> Result<Vec<Game>> {
        Ok(self.games.values().cloned().collect())
    }

    async fn round(&self, id: &GameId, index: u32) -> Result<Option<RoundRecord>> {
        Ok(self.rounds.get(&(*id, index)).cloned())
    }

    async fn bets(&self, id: &GameId, index: u32) -> Result<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .values()
            .filter(|bet| bet.game_id == *id && bet.challenge_index == index)
            .cloned()
            .collect();
        bets.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then_with(|| a.team_name.cmp(&b.team_name))
        });
        Ok(bets)
    }

    async fn bet_for(&self, id: &GameId, team: &str, index: u32) -> Result<Option<Bet>> {
        Ok(self.bets.get(&(*id, index, team.to_string())).cloned())
    }

    async fn put_game(&mut self, game: Game) -> Result<()> {
        self.apply(vec![Change::PutGame(game)]).await
    }

    async fn put_round(&mut self, round: RoundRecord) -> Result<()> {
        self.apply(vec![Change::PutRound(round)]).await
    }

    async fn insert_bet(&mut self, bet: Bet) -> Result<()> {
        self.apply(vec![Change::InsertBet(bet)]).await
    }

    async fn delete_game(&mut self, id: &GameId) -> Result<DeleteReport> {
        let Some(game) = self.games.remove(id) else {
            return Ok(DeleteReport::default());
        };
        self.codes.remove(&game.code);
        self.rounds.retain(|(game_id, _), _| game_id != id);
        let before = self.bets.len();
        self.bets.retain(|(game_id, _, _), _| game_id != id);
        Ok(DeleteReport {
            games: 1,
            bets: before - self.bets.len(),
        })
    }

    async fn increment_index(&mut self, id: &GameId) -> Result<u32> {
        let game = self
            .games
            .get_mut(id)
            .ok_or_else(|| anyhow!("game {id} does not exist"))?;
        game.current_challenge_index = game
            .current_challenge_index
            .checked_add(1)
            .ok_or_else(|| anyhow!("challenge index overflow"))?;
        Ok(game.current_challenge_index)
    }

    /// Validates every change before writing any of them.
    async fn apply(&mut self, changes: Vec<Change>) -> Result<()> {
        let mut staged_bets = Vec::new();
        for change in &changes {
            self.check(change, &mut staged_bets)?;
        }
        for change in changes {
            self.write(change);
        }
        Ok(())
    }
}
