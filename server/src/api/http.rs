use axum::{
    extract::{Path, Query, State as AxumState},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use slurk_types::{
    api::{
        BetRequest, CreateGameRequest, ErrorBody, JoinRequest, PhaseRequest, ResultsResponse,
        SelectionResponse, WinnerRequest, HOST_TOKEN_HEADER,
    },
    GameId,
};
use std::sync::Arc;

use super::ApiError;
use crate::Server;

type State = AxumState<Arc<Server>>;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Deserialize)]
pub(super) struct ResultsQuery {
    winner: Option<String>,
}

fn host_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn not_found() -> Response {
    let body = ErrorBody {
        code: "ROUTE_NOT_FOUND".to_string(),
        error: "no such route".to_string(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub(super) async fn create_game(
    AxumState(server): State,
    Json(request): Json<CreateGameRequest>,
) -> Result<Response, ApiError> {
    let created = server.create_game(request).await?;
    Ok(Json(created).into_response())
}

pub(super) async fn get_game(
    AxumState(server): State,
    Path(id): Path<GameId>,
) -> Result<Response, ApiError> {
    Ok(Json(server.game(&id).await?).into_response())
}

pub(super) async fn get_game_by_code(
    AxumState(server): State,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    Ok(Json(server.game_by_code(&code).await?).into_response())
}

pub(super) async fn join(
    AxumState(server): State,
    Path(code): Path<String>,
    Json(request): Json<JoinRequest>,
) -> Result<Response, ApiError> {
    Ok(Json(server.join(&code, request).await?).into_response())
}

pub(super) async fn shuffle(
    AxumState(server): State,
    Path(id): Path<GameId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let game = server.shuffle(&id, host_token(&headers)).await?;
    Ok(Json(game).into_response())
}

pub(super) async fn get_round(
    AxumState(server): State,
    Path((id, index)): Path<(GameId, u32)>,
) -> Result<Response, ApiError> {
    Ok(Json(server.round(&id, index).await?).into_response())
}

pub(super) async fn set_phase(
    AxumState(server): State,
    Path(id): Path<GameId>,
    headers: HeaderMap,
    Json(request): Json<PhaseRequest>,
) -> Result<Response, ApiError> {
    let game = server
        .set_phase(&id, host_token(&headers), request.phase)
        .await?;
    Ok(Json(game).into_response())
}

pub(super) async fn advance(
    AxumState(server): State,
    Path(id): Path<GameId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let game = server.advance(&id, host_token(&headers)).await?;
    Ok(Json(game).into_response())
}

pub(super) async fn select(
    AxumState(server): State,
    Path((id, index)): Path<(GameId, u32)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let record = server.select(&id, host_token(&headers), index).await?;
    Ok(Json(SelectionResponse {
        selected_teams: record.selected_teams,
    })
    .into_response())
}

pub(super) async fn place_bet(
    AxumState(server): State,
    Path(id): Path<GameId>,
    Json(request): Json<BetRequest>,
) -> Result<Response, ApiError> {
    Ok(Json(server.place_bet(&id, request).await?).into_response())
}

pub(super) async fn results(
    AxumState(server): State,
    Path((id, index)): Path<(GameId, u32)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ApiError> {
    let results = server.results(&id, index, query.winner).await?;
    Ok(Json(ResultsResponse { results }).into_response())
}

pub(super) async fn declare_winner(
    AxumState(server): State,
    Path((id, index)): Path<(GameId, u32)>,
    headers: HeaderMap,
    Json(request): Json<WinnerRequest>,
) -> Result<Response, ApiError> {
    let record = server
        .declare_winner(&id, host_token(&headers), index, &request.winner)
        .await?;
    Ok(Json(record).into_response())
}

pub(super) async fn settle(
    AxumState(server): State,
    Path((id, index)): Path<(GameId, u32)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let results = server.settle(&id, host_token(&headers), index).await?;
    Ok(Json(ResultsResponse { results }).into_response())
}

pub(super) async fn end_game(
    AxumState(server): State,
    Path(id): Path<GameId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let report = server.end_game(&id, host_token(&headers)).await?;
    Ok(Json(report).into_response())
}
