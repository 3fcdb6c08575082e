//! Betting ledger.
//!
//! A bet debits its team's balance and inserts the bet row in a single
//! [`Store::apply`], so a failed insert never leaves a debit behind.
//! Settlement deltas are informational unless [`settle_round`] is called.

use slurk_types::{Bet, BettingResult, Game, GameId};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::round::load_game;
use crate::state::{Change, Store};

/// Place a wager for `team_name` on challenge `index`.
pub async fn submit_bet<S: Store>(
    store: &mut S,
    game_id: &GameId,
    team_name: &str,
    index: u32,
    amount: u64,
    bet_on: &str,
    now_ms: u64,
) -> Result<Bet> {
    if amount == 0 {
        return Err(Error::InvalidAmount);
    }
    if bet_on.trim().is_empty() {
        return Err(Error::EmptyPrediction);
    }

    let mut game = load_game(store, game_id).await?;
    let balance = game
        .balance(team_name)
        .ok_or_else(|| Error::TeamNotFound(team_name.to_string()))?;

    if store.bet_for(game_id, team_name, index).await?.is_some() {
        return Err(Error::DuplicateBet {
            team: team_name.to_string(),
            index,
        });
    }
    if amount > balance {
        return Err(Error::InsufficientBalance {
            team: team_name.to_string(),
            balance,
            amount,
        });
    }

    game.balances.insert(team_name.to_string(), balance - amount);
    let bet = Bet {
        id: Uuid::new_v4(),
        game_id: *game_id,
        team_name: team_name.to_string(),
        challenge_index: index,
        amount,
        bet_on: bet_on.to_string(),
        created_at_ms: now_ms,
    };
    store
        .apply(vec![Change::PutGame(game), Change::InsertBet(bet.clone())])
        .await?;
    info!(%game_id, team = team_name, index, amount, bet_on, "bet placed");
    Ok(bet)
}

fn signed(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Score `bets` against `winner`.
pub fn results_for(bets: &[Bet], winner: &str) -> Vec<BettingResult> {
    bets.iter()
        .map(|bet| {
            let is_correct = bet.bet_on == winner;
            BettingResult {
                team_name: bet.team_name.clone(),
                bet_on: bet.bet_on.clone(),
                amount: bet.amount,
                is_correct,
                delta: if is_correct {
                    signed(bet.amount)
                } else {
                    -signed(bet.amount)
                },
            }
        })
        .collect()
}

/// Read every bet on `index` and score it against `winner`.
pub async fn betting_results<S: Store>(
    store: &S,
    game_id: &GameId,
    index: u32,
    winner: &str,
) -> Result<Vec<BettingResult>> {
    load_game(store, game_id).await?;
    let bets = store.bets(game_id, index).await?;
    Ok(results_for(&bets, winner))
}

/// Pay out correct bets on `index`: each gets its stake back plus an equal win.
///
/// Runs at most once per round.
pub async fn settle_round<S: Store>(
    store: &mut S,
    game_id: &GameId,
    index: u32,
) -> Result<Vec<BettingResult>> {
    let mut game = load_game(store, game_id).await?;
    let mut record = store
        .round(game_id, index)
        .await?
        .ok_or(Error::WinnerMissing { index })?;
    let Some(winner) = record.winner.clone() else {
        return Err(Error::WinnerMissing { index });
    };
    if record.settled {
        return Err(Error::AlreadySettled { index });
    }

    let bets = store.bets(game_id, index).await?;
    let results = results_for(&bets, &winner);
    for result in results.iter().filter(|result| result.is_correct) {
        let balance = game.balances.entry(result.team_name.clone()).or_default();
        *balance = balance.saturating_add(result.amount.saturating_mul(2));
    }
    record.settled = true;
    store
        .apply(vec![Change::PutGame(game), Change::PutRound(record)])
        .await?;
    info!(%game_id, index, %winner, bets = results.len(), "round settled");
    Ok(results)
}

/// Stakes that have been debited but not yet paid out.
pub async fn in_flight<S: Store>(store: &S, game: &Game) -> Result<u64> {
    let mut total = 0u64;
    for index in 0..game.challenges.len() as u32 {
        let settled = store
            .round(&game.id, index)
            .await?
            .map(|record| record.settled)
            .unwrap_or(false);
        if settled {
            continue;
        }
        let staked: u64 = store
            .bets(&game.id, index)
            .await?
            .iter()
            .map(|bet| bet.amount)
            .sum();
        total += staked;
    }
    debug!(game_id = %game.id, total, "in-flight stakes");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::FlakyStore;
    use crate::round::declare_winner;
    use crate::state::Memory;
    use crate::test_helpers::seed_game;
    use futures::executor::block_on;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_submit_bet_debits_balance() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 50).await;
        let bet = submit_bet(&mut store, &game.id, "A", 0, 20, "A", 5)
            .await
            .unwrap();
        assert_eq!(bet.created_at_ms, 5);

        let after = load_game(&store, &game.id).await.unwrap();
        assert_eq!(after.balance("A"), Some(30));
        assert_eq!(after.balance("B"), Some(50));
        assert_eq!(store.bet_for(&game.id, "A", 0).await.unwrap(), Some(bet));
    }

    #[tokio::test]
    async fn test_duplicate_bet_rejected() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 50).await;
        submit_bet(&mut store, &game.id, "A", 0, 10, "A", 1)
            .await
            .unwrap();

        let result = submit_bet(&mut store, &game.id, "A", 0, 5, "B", 2).await;
        assert!(matches!(result, Err(Error::DuplicateBet { index: 0, .. })));
        let after = load_game(&store, &game.id).await.unwrap();
        assert_eq!(after.balance("A"), Some(40));
        assert_eq!(store.bets(&game.id, 0).await.unwrap().len(), 1);

        submit_bet(&mut store, &game.id, "A", 1, 5, "B", 3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 30).await;
        let result = submit_bet(&mut store, &game.id, "A", 0, 50, "A", 1).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance {
                balance: 30,
                amount: 50,
                ..
            })
        ));
        let after = load_game(&store, &game.id).await.unwrap();
        assert_eq!(after.balance("A"), Some(30));
        assert_eq!(store.bet_count(), 0);

        submit_bet(&mut store, &game.id, "A", 0, 30, "A", 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_bets_rejected() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 30).await;
        assert!(matches!(
            submit_bet(&mut store, &game.id, "A", 0, 0, "A", 1).await,
            Err(Error::InvalidAmount)
        ));
        assert!(matches!(
            submit_bet(&mut store, &game.id, "A", 0, 1, "  ", 1).await,
            Err(Error::EmptyPrediction)
        ));
        assert!(matches!(
            submit_bet(&mut store, &game.id, "Z", 0, 1, "A", 1).await,
            Err(Error::TeamNotFound(_))
        ));
        assert!(matches!(
            submit_bet(&mut store, &Uuid::new_v4(), "A", 0, 1, "A", 1).await,
            Err(Error::GameNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_balance() {
        let mut store = FlakyStore::new(Memory::default());
        let game = seed_game(&mut store, &["A", "B"], 50).await;
        store.fail_bet_inserts = true;

        let result = submit_bet(&mut store, &game.id, "A", 0, 20, "A", 1).await;
        assert!(matches!(result, Err(Error::Store(_))));
        let after = load_game(&store, &game.id).await.unwrap();
        assert_eq!(after.balance("A"), Some(50));
        assert_eq!(store.inner.bet_count(), 0);
    }

    #[tokio::test]
    async fn test_betting_results() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B", "C"], 50).await;
        submit_bet(&mut store, &game.id, "A", 0, 20, "A", 1)
            .await
            .unwrap();
        submit_bet(&mut store, &game.id, "B", 0, 15, "C", 2)
            .await
            .unwrap();

        let results = betting_results(&store, &game.id, 0, "A").await.unwrap();
        assert_eq!(
            results,
            vec![
                BettingResult {
                    team_name: "A".into(),
                    bet_on: "A".into(),
                    amount: 20,
                    is_correct: true,
                    delta: 20,
                },
                BettingResult {
                    team_name: "B".into(),
                    bet_on: "C".into(),
                    amount: 15,
                    is_correct: false,
                    delta: -15,
                },
            ]
        );
        assert!(betting_results(&store, &game.id, 1, "A")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_settle_round_pays_once() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 50).await;
        submit_bet(&mut store, &game.id, "A", 0, 20, "A", 1)
            .await
            .unwrap();
        submit_bet(&mut store, &game.id, "B", 0, 10, "B", 2)
            .await
            .unwrap();

        assert!(matches!(
            settle_round(&mut store, &game.id, 0).await,
            Err(Error::WinnerMissing { index: 0 })
        ));

        declare_winner(&mut store, &game.id, 0, "A").await.unwrap();
        let results = settle_round(&mut store, &game.id, 0).await.unwrap();
        assert_eq!(results.len(), 2);
        let after = load_game(&store, &game.id).await.unwrap();
        assert_eq!(after.balance("A"), Some(70));
        assert_eq!(after.balance("B"), Some(40));
        assert!(store.round(&game.id, 0).await.unwrap().unwrap().settled);

        assert!(matches!(
            settle_round(&mut store, &game.id, 0).await,
            Err(Error::AlreadySettled { index: 0 })
        ));
        assert_eq!(load_game(&store, &game.id).await.unwrap(), after);
    }

    #[tokio::test]
    async fn test_in_flight_excludes_settled_rounds() {
        let mut store = Memory::default();
        let game = seed_game(&mut store, &["A", "B"], 50).await;
        submit_bet(&mut store, &game.id, "A", 0, 20, "B", 1)
            .await
            .unwrap();
        submit_bet(&mut store, &game.id, "B", 1, 5, "A", 2)
            .await
            .unwrap();
        assert_eq!(in_flight(&store, &game).await.unwrap(), 25);

        declare_winner(&mut store, &game.id, 0, "A").await.unwrap();
        settle_round(&mut store, &game.id, 0).await.unwrap();
        assert_eq!(in_flight(&store, &game).await.unwrap(), 5);
    }

    proptest! {
        #[test]
        fn test_balances_plus_stakes_are_conserved(
            bets in proptest::collection::vec((0usize..3, 0u32..3, 0u64..40), 1..30)
        ) {
            block_on(async {
                let teams = ["A", "B", "C"];
                let mut store = Memory::default();
                let game = seed_game(&mut store, &teams, 50).await;
                let total = game.total_balance();

                for (team, index, amount) in bets {
                    let _ = submit_bet(&mut store, &game.id, teams[team], index, amount, "A", 0).await;
                    let now = load_game(&store, &game.id).await.unwrap();
                    let staked = in_flight(&store, &now).await.unwrap();
                    prop_assert_eq!(now.total_balance() + staked, total);
                }
                Ok(())
            })?;
        }
    }
}
