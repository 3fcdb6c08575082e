//! slurk command-line client.
//!
//! Usage:
//!   slurk host --name Ola --team Red --team Blue
//!   slurk join --code ABCD --name Kari --team Red
//!   slurk bet --amount 10 --on Red
//!   slurk next
//!   slurk watch
//!   slurk play roulette --stake 5 --bet red
//!
//! The current session (join code, player, team, host token) is kept in a JSON
//! file so later commands know which game they refer to.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use slurk_client::{Client, HostControls, RoundMirror};
use slurk_execution::minigames::{
    cards,
    hilo::{Guess, HiLo, Verdict},
    pairs::{Flip, Pairs, PairsConfig},
    roulette, wheel, MinigameRng,
};
use slurk_types::{
    api::{BetRequest, CreateGameRequest, JoinRequest},
    GameId, MinigameResult, Player, RoundPhase, Team,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play slurk from the terminal")]
struct Args {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// File holding the current session.
    #[arg(short, long, default_value = "slurk-session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a game and become its host.
    Host {
        #[arg(short, long)]
        name: String,
        /// Team names (at least two).
        #[arg(short, long = "team", required = true)]
        teams: Vec<String>,
        #[arg(long)]
        balance: Option<u64>,
        #[arg(long)]
        challenges: Option<usize>,
    },
    /// Join a game by code.
    Join {
        #[arg(short, long)]
        code: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        team: String,
    },
    /// Print the current round.
    Status,
    /// Move to the next phase, or the next challenge once finished.
    Next,
    /// Set the phase directly (host).
    Phase { phase: RoundPhase },
    /// Start betting on the next challenge (host).
    Advance,
    /// Reshuffle non-captain players across teams (host).
    Shuffle,
    /// Bet on the current challenge.
    Bet {
        #[arg(short, long)]
        amount: u64,
        /// Predicted winner: a team name, or success/failure.
        #[arg(long = "on")]
        bet_on: String,
        /// Bet for another team than the session's own.
        #[arg(short, long)]
        team: Option<String>,
    },
    /// Declare the winner of the current challenge (host).
    Winner {
        outcome: String,
        #[arg(short, long)]
        index: Option<u32>,
    },
    /// Show betting results.
    Results {
        #[arg(short, long)]
        index: Option<u32>,
        /// Score against this outcome instead of the declared winner.
        #[arg(short, long)]
        winner: Option<String>,
    },
    /// Pay out winning bets (host, when the server allows it).
    Settle {
        #[arg(short, long)]
        index: Option<u32>,
    },
    /// Follow the game and print every change.
    Watch,
    /// End the game and delete it (host).
    End,
    /// Play a local minigame.
    Play {
        game: Minigame,
        /// Slurks staked on roulette and high-low.
        #[arg(long, default_value_t = 1)]
        stake: u64,
        /// Roulette bet: red, black, even, odd, low, high, 0-36, dozen:N, column:N.
        #[arg(long, default_value = "red")]
        bet: String,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Minigame {
    Pairs,
    Wheel,
    Roulette,
    Hilo,
}

/// What this terminal remembers about the game it is in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Session {
    game_id: GameId,
    code: String,
    player_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    team_name: Option<String>,
    is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host_token: Option<String>,
}

impl Session {
    fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("no session at {} (host or join a game first)", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("invalid session file {}", path.display()))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    fn client(&self, url: &str) -> Result<Client> {
        let client = Client::new(url)?;
        Ok(match &self.host_token {
            Some(token) => client.with_host_token(token.clone()),
            None => client,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn current_index(client: &Client, session: &Session, index: Option<u32>) -> Result<u32> {
    match index {
        Some(index) => Ok(index),
        None => Ok(client.game(&session.game_id).await?.current_challenge_index),
    }
}

fn parse_flip(line: &str) -> Option<usize> {
    line.trim().parse().ok()
}

fn parse_guess(line: &str) -> Option<Option<Guess>> {
    match line.trim().to_ascii_lowercase().as_str() {
        "h" | "higher" => Some(Some(Guess::Higher)),
        "l" | "lower" => Some(Some(Guess::Lower)),
        "s" | "same" => Some(Some(Guess::Same)),
        "c" | "cash" => Some(None),
        _ => None,
    }
}

fn prompt(input: &mut impl BufRead, message: &str) -> Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line)
}

fn play_pairs(rng: &mut MinigameRng, input: &mut impl BufRead) -> Result<MinigameResult> {
    let mut game = Pairs::new(rng, PairsConfig::default())?;
    loop {
        if let Some(result) = game.result() {
            return Ok(result);
        }
        let board: Vec<String> = (0..game.len())
            .map(|i| match game.face_up(i) {
                Some(card) => cards::label(card),
                None => format!("[{i}]"),
            })
            .collect();
        println!("{}  lives: {}", board.join(" "), game.lives());
        let line = prompt(input, "flip> ")?;
        let Some(index) = parse_flip(&line) else {
            println!("enter a card number");
            continue;
        };
        match game.flip(index) {
            Ok(Flip::First { card }) => println!("{}", cards::label(card)),
            Ok(Flip::Match { card }) => println!("match: {}", cards::label(card)),
            Ok(Flip::Miss { first, second, lives }) => println!(
                "miss: {} / {} ({lives} lives left)",
                cards::label(first),
                cards::label(second)
            ),
            Err(err) => println!("{err}"),
        }
    }
}

fn play_hilo(rng: &mut MinigameRng, stake: u64, input: &mut impl BufRead) -> Result<MinigameResult> {
    let mut game = HiLo::new(rng, stake)?;
    loop {
        if let Some(result) = game.result() {
            return Ok(result.clone());
        }
        println!(
            "card: {}  streak: {}  pot: {}",
            cards::label(game.current()),
            game.streak(),
            game.pot()
        );
        let line = prompt(input, "(h)igher, (l)ower, (s)ame or (c)ash out> ")?;
        match parse_guess(&line) {
            Some(Some(guess)) => match game.guess(rng, guess) {
                Ok(draw) => {
                    let verdict = match draw.verdict {
                        Verdict::Correct => "correct",
                        Verdict::Push => "push",
                        Verdict::Wrong => "wrong",
                    };
                    println!("drew {}: {verdict}", cards::label(draw.card));
                }
                Err(err) => println!("{err}"),
            },
            Some(None) => return Ok(game.cash_out()?),
            None => println!("unknown choice"),
        }
    }
}

fn play(game: Minigame, stake: u64, bet: &str, seed: Option<u64>) -> Result<MinigameResult> {
    let mut rng = match seed {
        Some(seed) => MinigameRng::seeded(seed),
        None => MinigameRng::from_entropy(),
    };
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let result = match game {
        Minigame::Pairs => play_pairs(&mut rng, &mut input)?,
        Minigame::Wheel => {
            let landed = wheel::spin(&mut rng, wheel::DEFAULT_SEGMENTS)?;
            println!("the wheel stops on {}", landed.segment.label);
            landed.result
        }
        Minigame::Roulette => {
            let bet: roulette::Bet = bet.parse()?;
            let outcome = roulette::spin(&mut rng, bet, stake)?;
            println!("ball lands on {} ({bet})", outcome.number);
            outcome.result
        }
        Minigame::Hilo => play_hilo(&mut rng, stake, &mut input)?,
    };
    Ok(result)
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Host {
            name,
            teams,
            balance,
            challenges,
        } => {
            let client = Client::new(&args.url)?;
            let created = client
                .create_game(&CreateGameRequest {
                    host_name: name.clone(),
                    teams: teams.into_iter().map(Team::new).collect(),
                    starting_balance: balance,
                    challenge_count: challenges,
                })
                .await?;
            let session = Session {
                game_id: created.game.id,
                code: created.game.code.clone(),
                player_name: name,
                team_name: None,
                is_host: true,
                host_token: Some(created.host_token),
            };
            session.save(&args.session)?;
            info!(code = %session.code, game_id = %session.game_id, "game created");
            println!("join code: {}", session.code);
        }
        Command::Join { code, name, team } => {
            let client = Client::new(&args.url)?;
            let request = JoinRequest {
                player_name: name.clone(),
                team_name: team.clone(),
                player_id: None,
            };
            let game = client.join(&code, &request).await?;
            let player: Option<&Player> = game
                .team(&team)
                .and_then(|t| t.players.iter().find(|p| p.name == name));
            let session = Session {
                game_id: game.id,
                code: game.code.clone(),
                player_name: name,
                team_name: Some(team),
                is_host: false,
                host_token: None,
            };
            session.save(&args.session)?;
            println!(
                "joined {} as {}",
                session.code,
                player.map(|p| p.id.as_str()).unwrap_or("unknown player")
            );
        }
        Command::Play {
            game,
            stake,
            bet,
            seed,
        } => {
            let mut result = play(game, stake, &bet, seed)?;
            if let Ok(session) = Session::load(&args.session) {
                result = result.with_player(session.player_name);
                if let Some(team) = session.team_name {
                    result = result.with_team(team);
                }
            }
            print_json(&result)?;
        }
        command => {
            let session = Session::load(&args.session)?;
            let client = session.client(&args.url)?;
            run_session(command, &session, &client, &args.session).await?;
        }
    }
    Ok(())
}

async fn run_session(command: Command, session: &Session, client: &Client, path: &Path) -> Result<()> {
    let id = session.game_id;
    match command {
        Command::Status => {
            let mut mirror = RoundMirror::new(client.clone(), id);
            mirror.refresh().await?;
            match mirror.round() {
                Some(round) => print_json(round)?,
                None => println!("all challenges have been played"),
            }
        }
        Command::Next => {
            let game = client.game(&id).await?;
            let controls = HostControls::new(client.clone(), id)?;
            let game = controls.step(game.phase).await?;
            println!("challenge {}: {}", game.current_challenge_index, game.phase);
        }
        Command::Phase { phase } => {
            let game = HostControls::new(client.clone(), id)?.set_phase(phase).await?;
            println!("challenge {}: {}", game.current_challenge_index, game.phase);
        }
        Command::Advance => {
            let game = HostControls::new(client.clone(), id)?.advance().await?;
            println!("challenge {}: {}", game.current_challenge_index, game.phase);
        }
        Command::Shuffle => print_json(&client.shuffle(&id).await?.teams)?,
        Command::Bet {
            amount,
            bet_on,
            team,
        } => {
            let team_name = team
                .or_else(|| session.team_name.clone())
                .ok_or_else(|| anyhow!("no team in session; pass --team"))?;
            let game = client.game(&id).await?;
            let bet = client
                .place_bet(
                    &id,
                    &BetRequest {
                        team_name,
                        challenge_index: game.current_challenge_index,
                        amount,
                        bet_on,
                    },
                )
                .await?;
            print_json(&bet)?;
        }
        Command::Winner { outcome, index } => {
            let index = current_index(client, session, index).await?;
            print_json(&client.declare_winner(&id, index, &outcome).await?)?;
        }
        Command::Results { index, winner } => {
            let index = current_index(client, session, index).await?;
            print_json(&client.results(&id, index, winner.as_deref()).await?)?;
        }
        Command::Settle { index } => {
            let index = current_index(client, session, index).await?;
            print_json(&client.settle(&id, index).await?)?;
        }
        Command::Watch => {
            let mut stream = client.connect_game(&id).await?;
            let mut mirror = RoundMirror::new(client.clone(), id);
            mirror.refresh().await?;
            loop {
                if let Some(round) = mirror.round() {
                    println!(
                        "challenge {} ({}): {} [{}]",
                        round.challenge_index,
                        round.challenge.title,
                        round.phase,
                        round
                            .selected_teams
                            .iter()
                            .map(|t| t.name.as_str())
                            .collect::<Vec<_>>()
                            .join(" vs ")
                    );
                }
                if mirror.is_game_over() {
                    println!("game over");
                }
                match mirror.follow(&mut stream).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => warn!(?err, "failed to refresh round"),
                }
            }
            println!("game closed");
        }
        Command::End => {
            let report = client.end_game(&id).await?;
            if let Err(err) = std::fs::remove_file(path) {
                warn!(?err, "failed to remove session file");
            }
            println!("deleted {} games and {} bets", report.games, report.bets);
        }
        other => bail!("{other:?} does not run against a session"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .init();
    run(Args::parse()).await
}
