use crate::catalog;
use crate::state::Store;
use rand::{rngs::StdRng, SeedableRng};
use slurk_types::{Game, Player, RoundPhase, Team};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A waiting game with one player per team and three challenges.
pub fn sample_game(teams: &[&str], balance: u64) -> Game {
    let mut rng = StdRng::seed_from_u64(7);
    let teams: Vec<Team> = teams
        .iter()
        .map(|name| Team {
            name: name.to_string(),
            players: vec![Player::new(format!("{name}-0"), format!("{name} captain"))],
        })
        .collect();
    let balances: BTreeMap<String, u64> = teams
        .iter()
        .map(|team| (team.name.clone(), balance))
        .collect();
    Game {
        id: Uuid::new_v4(),
        code: "TEST".to_string(),
        host_name: "host".to_string(),
        teams,
        balances,
        challenges: catalog::draw(3, &mut rng),
        current_challenge_index: 0,
        phase: RoundPhase::Waiting,
        created_at_ms: 0,
    }
}

pub async fn seed_game<S: Store>(store: &mut S, teams: &[&str], balance: u64) -> Game {
    let game = sample_game(teams, balance);
    store.put_game(game.clone()).await.unwrap();
    game
}
