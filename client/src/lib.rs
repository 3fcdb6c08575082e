pub mod client;
pub mod events;
pub mod mirror;

pub use client::Client;
pub use client::RetryPolicy;
pub use events::Stream;
pub use mirror::{HostControls, RoundMirror};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    /// The server rejected the request with a structured `{code, error}` body.
    #[error("{status} {code}: {message}")]
    Rejected {
        status: reqwest::StatusCode,
        code: String,
        message: String,
    },
    #[error("invalid data: {0}")]
    InvalidData(#[from] serde_json::Error),
    #[error("host token required")]
    MissingHostToken,
    #[error("a phase change is already in flight")]
    Transitioning,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("dial timeout")]
    DialTimeout,
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    /// Machine-readable code when the server rejected the request.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State as AxumState,
        http::StatusCode as AxumStatusCode,
        routing::{get, post},
        Router,
    };
    use slurk_server::{Api, Server, ServerConfig};
    use slurk_types::{
        api::{BetRequest, CreateGameRequest, CreateGameResponse, JoinRequest, Update},
        MatchupType, Round, RoundPhase, Team, OUTCOME_SUCCESS,
    };
    use std::{
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };
    use tokio::time::{timeout, Duration};

    struct TestContext {
        base_url: String,
        server_handle: tokio::task::JoinHandle<()>,
    }

    impl TestContext {
        async fn new(apply_payouts: bool) -> Self {
            let config = ServerConfig {
                seed: Some(11),
                apply_payouts,
                ..ServerConfig::default()
            };
            let server = Arc::new(Server::new(config.validate().unwrap()));
            let (base_url, server_handle) = serve_router(Api::new(server).router()).await;
            Self {
                base_url,
                server_handle,
            }
        }

        fn create_client(&self) -> Client {
            Client::new(&self.base_url).unwrap()
        }
    }

    impl Drop for TestContext {
        fn drop(&mut self) {
            self.server_handle.abort();
        }
    }

    async fn serve_router(router: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let actual_addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{actual_addr}"), handle)
    }

    async fn host_game(client: &Client) -> CreateGameResponse {
        client
            .create_game(&CreateGameRequest {
                host_name: "Ola".into(),
                teams: vec![Team::new("A"), Team::new("B")],
                starting_balance: None,
                challenge_count: Some(3),
            })
            .await
            .unwrap()
    }

    fn winning_token(round: &Round) -> String {
        match round.challenge.matchup {
            MatchupType::TeamVsItself => OUTCOME_SUCCESS.to_string(),
            _ => round.selected_teams[0].name.clone(),
        }
    }

    #[test]
    fn test_rejects_non_http_urls() {
        assert!(matches!(
            Client::new("ftp://localhost:8080"),
            Err(Error::InvalidScheme(_))
        ));
        assert!(matches!(Client::new("not a url"), Err(Error::Url(_))));
    }

    #[tokio::test]
    async fn test_client_round_flow() {
        let ctx = TestContext::new(false).await;
        let player = ctx.create_client();
        let created = host_game(&player).await;
        let host = ctx
            .create_client()
            .with_host_token(created.host_token.clone());
        let id = created.game.id;

        assert!(player.healthz().await.unwrap());
        let joined = player
            .join(
                &created.game.code,
                &JoinRequest {
                    player_name: "Kari".into(),
                    team_name: "A".into(),
                    player_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(joined.team("A").unwrap().players.len(), 1);

        let err = player.set_phase(&id, RoundPhase::Betting).await.unwrap_err();
        assert!(matches!(err, Error::MissingHostToken));

        host.set_phase(&id, RoundPhase::Betting).await.unwrap();
        let round = player.round(&id, 0).await.unwrap();
        let selected = host.select_teams(&id, 0).await.unwrap();
        assert_eq!(selected.len(), round.challenge.matchup.team_count());

        let winner = winning_token(&round);
        let bet = player
            .place_bet(
                &id,
                &BetRequest {
                    team_name: "A".into(),
                    challenge_index: 0,
                    amount: 20,
                    bet_on: winner.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(bet.amount, 20);
        let err = player
            .place_bet(
                &id,
                &BetRequest {
                    team_name: "A".into(),
                    challenge_index: 0,
                    amount: 5,
                    bet_on: winner.clone(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("DUPLICATE_BET"));

        host.set_phase(&id, RoundPhase::Playing).await.unwrap();
        host.declare_winner(&id, 0, &winner).await.unwrap();
        host.set_phase(&id, RoundPhase::Finished).await.unwrap();

        let results = player.results(&id, 0, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_correct);
        assert_eq!(results[0].delta, 20);
        assert_eq!(player.game(&id).await.unwrap().balance("A"), Some(30));

        let err = host.settle(&id, 0).await.unwrap_err();
        assert_eq!(err.code(), Some("PAYOUTS_DISABLED"));

        let game = host.advance(&id).await.unwrap();
        assert_eq!(game.current_challenge_index, 1);
        assert_eq!(game.phase, RoundPhase::Betting);

        let report = host.end_game(&id).await.unwrap();
        assert_eq!(report.games, 1);
        assert_eq!(report.bets, 1);
        let err = player.game(&id).await.unwrap_err();
        assert_eq!(err.code(), Some("GAME_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_settle_when_enabled() {
        let ctx = TestContext::new(true).await;
        let client = ctx.create_client();
        let created = host_game(&client).await;
        let host = client.clone().with_host_token(created.host_token);
        let id = created.game.id;

        host.set_phase(&id, RoundPhase::Betting).await.unwrap();
        let winner = winning_token(&host.round(&id, 0).await.unwrap());
        host.place_bet(
            &id,
            &BetRequest {
                team_name: "B".into(),
                challenge_index: 0,
                amount: 10,
                bet_on: winner.clone(),
            },
        )
        .await
        .unwrap();
        host.set_phase(&id, RoundPhase::Playing).await.unwrap();
        host.declare_winner(&id, 0, &winner).await.unwrap();

        let results = host.settle(&id, 0).await.unwrap();
        assert!(results[0].is_correct);
        assert_eq!(host.game(&id).await.unwrap().balance("B"), Some(60));
    }

    #[tokio::test]
    async fn test_updates_stream() {
        let ctx = TestContext::new(false).await;
        let client = ctx.create_client();
        let created = host_game(&client).await;
        let host = client.clone().with_host_token(created.host_token);
        let id = created.game.id;

        let mut stream = client.connect_code(&created.game.code).await.unwrap();
        host.set_phase(&id, RoundPhase::Betting).await.unwrap();

        let mut saw_round = false;
        let mut saw_game = false;
        while !(saw_round && saw_game) {
            let update = timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("update should arrive")
                .expect("stream open")
                .unwrap();
            assert_eq!(update.game_id(), id);
            match update {
                Update::Round { round } => {
                    assert!(!round.selected_teams.is_empty());
                    saw_round = true;
                }
                Update::Game { game } => {
                    assert_eq!(game.phase, RoundPhase::Betting);
                    saw_game = true;
                }
                other => panic!("unexpected update {other:?}"),
            }
        }

        host.end_game(&id).await.unwrap();
        let update = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("update should arrive")
            .expect("stream open")
            .unwrap();
        assert_eq!(update, Update::Deleted { game_id: id });
    }

    #[tokio::test]
    async fn test_connect_unknown_code_fails() {
        let ctx = TestContext::new(false).await;
        let client = ctx.create_client();
        assert!(client.connect_code("ZZZZ").await.is_err());
    }

    #[tokio::test]
    async fn test_get_with_retry_retries_retryable_statuses() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky",
                get(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>| async move {
                        let attempt = counter.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 {
                            AxumStatusCode::SERVICE_UNAVAILABLE
                        } else {
                            AxumStatusCode::OK
                        }
                    },
                ),
            )
            .with_state(counter.clone());

        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::ZERO,
                max_backoff: Duration::ZERO,
                retry_non_idempotent: false,
            });

        let url = client.base_url.join("flaky").unwrap();
        let response = client.get_with_retry(url).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_post_is_not_retried_by_default() {
        let counter = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/flaky-post",
                post(
                    |AxumState(counter): AxumState<Arc<AtomicUsize>>| async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        AxumStatusCode::SERVICE_UNAVAILABLE
                    },
                ),
            )
            .with_state(counter.clone());

        let (base_url, handle) = serve_router(router).await;
        let client = Client::new(&base_url)
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::ZERO,
                max_backoff: Duration::ZERO,
                retry_non_idempotent: false,
            });

        let url = client.base_url.join("flaky-post").unwrap();
        let err = client
            .post_json_with_retry(url, &serde_json::json!({}))
            .await
            .expect_err("POST should not be retried by default");
        let Error::FailedWithBody { status, .. } = err else {
            panic!("expected FailedWithBody, got {err:?}");
        };
        assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
