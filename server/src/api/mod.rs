use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use slurk_execution::{Error, ErrorKind};
use slurk_types::api::{ErrorBody, HOST_TOKEN_HEADER};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Server;

mod http;
mod ws;

pub struct Api {
    server: Arc<Server>,
}

impl Api {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = &self.server.config.allowed_origins;
        let cors = if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            let origins = allowed_origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "ignoring invalid allowed origin");
                        None
                    }
                })
                .collect::<Vec<_>>();
            CorsLayer::new().allow_origin(AllowOrigin::list(origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(HOST_TOKEN_HEADER),
        ]);

        Router::new()
            .route("/healthz", get(http::healthz))
            .route("/games", post(http::create_game))
            .route("/games/:id", get(http::get_game).delete(http::end_game))
            .route("/games/:id/shuffle", post(http::shuffle))
            .route("/games/:id/phase", post(http::set_phase))
            .route("/games/:id/advance", post(http::advance))
            .route("/games/:id/bets", post(http::place_bet))
            .route("/games/:id/rounds/:index", get(http::get_round))
            .route("/games/:id/rounds/:index/selection", post(http::select))
            .route("/games/:id/rounds/:index/results", get(http::results))
            .route("/games/:id/rounds/:index/winner", post(http::declare_winner))
            .route("/games/:id/rounds/:index/settle", post(http::settle))
            .route("/codes/:code", get(http::get_game_by_code))
            .route("/codes/:code/players", post(http::join))
            .route("/ws/games/:id", get(ws::game_updates))
            .route("/ws/codes/:code", get(ws::code_updates))
            .fallback(http::not_found)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.server.clone())
    }
}

/// An execution error rendered as `{code, error}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Validation => match self.0 {
                Error::DuplicateBet { .. }
                | Error::IllegalTransition { .. }
                | Error::BettingClosed { .. }
                | Error::StaleChallenge { .. }
                | Error::WinnerTooEarly { .. }
                | Error::AlreadySettled { .. }
                | Error::ChallengesExhausted => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }
        let body = ErrorBody {
            code: self.0.code().to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ServerConfig, Server};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use slurk_types::{
        api::{CreateGameResponse, ResultsResponse, SelectionResponse},
        Bet, Game, MatchupType, Round, RoundPhase, OUTCOME_SUCCESS,
    };
    use tower::ServiceExt;

    fn router(apply_payouts: bool) -> Router {
        let config = ServerConfig {
            seed: Some(3),
            apply_payouts,
            ..ServerConfig::default()
        };
        let server = Arc::new(Server::new(config.validate().unwrap()));
        Api::new(server).router()
    }

    async fn call(
        router: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(HOST_TOKEN_HEADER, token);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        router.clone().oneshot(request).await.unwrap()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(router: &Router) -> CreateGameResponse {
        let response = call(
            router,
            Method::POST,
            "/games",
            None,
            Some(json!({
                "host_name": "Ola",
                "teams": [{"name": "Red"}, {"name": "Blue"}],
                "challenge_count": 2
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await
    }

    #[tokio::test]
    async fn test_healthz_responds() {
        let router = router(false);
        let response = call(&router, Method::GET, "/healthz", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_game_round_trip_over_http() {
        let router = router(false);
        let created = create(&router).await;
        let id = created.game.id;
        let token = Some(created.host_token.as_str());

        let response = call(&router, Method::GET, &format!("/codes/{}", created.game.code.to_lowercase()), None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let game: Game = json(response).await;
        assert_eq!(game.id, id);

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/phase"),
            token,
            Some(json!({"phase": "betting"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&router, Method::GET, &format!("/games/{id}/rounds/0"), None, None).await;
        let round: Round = json(response).await;
        assert_eq!(round.phase, RoundPhase::Betting);
        let winner = match round.challenge.matchup {
            MatchupType::TeamVsItself => OUTCOME_SUCCESS.to_string(),
            _ => round.selected_teams[0].name.clone(),
        };

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/rounds/0/selection"),
            token,
            None,
        )
        .await;
        let selection: SelectionResponse = json(response).await;
        let names: Vec<String> = round.selected_teams.iter().map(|t| t.name.clone()).collect();
        assert_eq!(selection.selected_teams, names);

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/bets"),
            None,
            Some(json!({"team_name": "Red", "challenge_index": 0, "amount": 15, "bet_on": winner})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bet: Bet = json(response).await;
        assert_eq!(bet.amount, 15);

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/rounds/0/winner"),
            token,
            Some(json!({"winner": winner})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "WINNER_TOO_EARLY");

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/phase"),
            token,
            Some(json!({"phase": "playing"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/rounds/0/winner"),
            token,
            Some(json!({"winner": winner})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(&router, Method::GET, &format!("/games/{id}/rounds/0/results"), None, None).await;
        let results: ResultsResponse = json(response).await;
        assert_eq!(results.results.len(), 1);
        assert!(results.results[0].is_correct);

        let response = call(
            &router,
            Method::GET,
            &format!("/games/{id}/rounds/0/results?winner=nobody"),
            None,
            None,
        )
        .await;
        let results: ResultsResponse = json(response).await;
        assert!(!results.results[0].is_correct);

        let response = call(&router, Method::DELETE, &format!("/games/{id}"), token, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = call(&router, Method::GET, &format!("/games/{id}"), None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_errors_map_to_status_and_code() {
        let router = router(false);
        let created = create(&router).await;
        let id = created.game.id;

        let response = call(&router, Method::POST, &format!("/games/{id}/advance"), None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "UNAUTHORIZED");

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/phase"),
            Some(&created.host_token),
            Some(json!({"phase": "finished"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "ILLEGAL_TRANSITION");

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/bets"),
            None,
            Some(json!({"team_name": "Red", "challenge_index": 0, "amount": 5, "bet_on": "Blue"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "BETTING_CLOSED");

        let response = call(
            &router,
            Method::POST,
            &format!("/games/{id}/rounds/0/settle"),
            Some(&created.host_token),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "PAYOUTS_DISABLED");

        let response = call(&router, Method::GET, "/codes/QQQQ", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json(response).await;
        assert_eq!(body.code, "CODE_NOT_FOUND");

        let response = call(&router, Method::GET, "/games/not-a-uuid", None, None).await;
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_join_adds_player() {
        let router = router(false);
        let created = create(&router).await;
        let response = call(
            &router,
            Method::POST,
            &format!("/codes/{}/players", created.game.code),
            None,
            Some(json!({"player_name": "Kari", "team_name": "Green"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let game: Game = json(response).await;
        assert_eq!(game.team("Green").unwrap().players[0].name, "Kari");
        assert_eq!(game.balance("Green"), Some(50));

        let response = call(
            &router,
            Method::POST,
            &format!("/codes/{}/players", created.game.code),
            None,
            Some(json!({"player_name": "kari", "team_name": "Red"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
