use crate::{Error, Result, Stream};
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use slurk_types::{
    api::{
        BetRequest, CreateGameRequest, CreateGameResponse, DeleteReport, ErrorBody, JoinRequest,
        PhaseRequest, ResultsResponse, SelectionResponse, WinnerRequest, HOST_TOKEN_HEADER,
    },
    Bet, BettingResult, Game, GameId, Round, RoundPhase, RoundRecord,
};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// When and how often failed requests are retried.
///
/// Only server-side failures (5xx, 429) and transport errors are retried.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Also retry POST and DELETE requests.
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// HTTP and WebSocket client for a slurk server.
#[derive(Clone)]
pub struct Client {
    pub base_url: Url,
    ws_url: Url,
    http_client: reqwest::Client,
    retry_policy: RetryPolicy,
    host_token: Option<String>,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let ws_scheme = match base_url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(Error::InvalidScheme(other.to_string())),
        };
        let mut ws_url = base_url.clone();
        ws_url
            .set_scheme(ws_scheme)
            .map_err(|_| Error::InvalidScheme(base_url.scheme().to_string()))?;
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url,
            ws_url,
            http_client,
            retry_policy: RetryPolicy::default(),
            host_token: None,
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Attach the host credential returned by [`Client::create_game`].
    pub fn with_host_token(mut self, token: impl Into<String>) -> Self {
        self.host_token = Some(token.into());
        self
    }

    pub fn host_token(&self) -> Option<&str> {
        self.host_token.as_deref()
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        host: bool,
    ) -> Result<Response> {
        let token = if host {
            Some(self.host_token.as_deref().ok_or(Error::MissingHostToken)?)
        } else {
            None
        };
        let idempotent = matches!(method, Method::GET | Method::HEAD);
        let attempts = if idempotent || self.retry_policy.retry_non_idempotent {
            self.retry_policy.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(token) = token {
                request = request.header(HOST_TOKEN_HEADER, token);
            }
            if let Some(body) = &body {
                request = request.json(body);
            }
            attempt += 1;
            match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if attempt < attempts && is_retryable(response.status()) => {
                    debug!(%method, %url, status = %response.status(), attempt, "retrying request");
                }
                Ok(response) => return Err(rejection(&method, &url, response).await),
                Err(err) if attempt < attempts && (err.is_connect() || err.is_timeout()) => {
                    debug!(%method, %url, ?err, attempt, "retrying request");
                }
                Err(err) => return Err(err.into()),
            }
            sleep(self.retry_policy.backoff(attempt - 1)).await;
        }
    }

    pub async fn get_with_retry(&self, url: Url) -> Result<Response> {
        self.send_with_retry(Method::GET, url, None, false).await
    }

    pub async fn post_json_with_retry<B: Serialize>(&self, url: Url, body: &B) -> Result<Response> {
        let body = serde_json::to_value(body)?;
        self.send_with_retry(Method::POST, url, Some(body), false)
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        host: bool,
    ) -> Result<T> {
        let url = self.url(path)?;
        let response = self.send_with_retry(method, url, body, host).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.call(Method::GET, path, None, false).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
        host: bool,
    ) -> Result<T> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.call(Method::POST, path, body, host).await
    }

    pub async fn healthz(&self) -> Result<bool> {
        let response = self.get_with_retry(self.url("healthz")?).await?;
        Ok(response.status() == StatusCode::OK)
    }

    pub async fn create_game(&self, request: &CreateGameRequest) -> Result<CreateGameResponse> {
        self.post("games", Some(request), false).await
    }

    pub async fn game(&self, id: &GameId) -> Result<Game> {
        self.get(&format!("games/{id}")).await
    }

    pub async fn game_by_code(&self, code: &str) -> Result<Game> {
        self.get(&format!("codes/{}", code.trim())).await
    }

    pub async fn join(&self, code: &str, request: &JoinRequest) -> Result<Game> {
        self.post(&format!("codes/{}/players", code.trim()), Some(request), false)
            .await
    }

    pub async fn shuffle(&self, id: &GameId) -> Result<Game> {
        self.post::<(), _>(&format!("games/{id}/shuffle"), None, true)
            .await
    }

    pub async fn round(&self, id: &GameId, index: u32) -> Result<Round> {
        self.get(&format!("games/{id}/rounds/{index}")).await
    }

    pub async fn set_phase(&self, id: &GameId, phase: RoundPhase) -> Result<Game> {
        self.post(&format!("games/{id}/phase"), Some(&PhaseRequest { phase }), true)
            .await
    }

    pub async fn advance(&self, id: &GameId) -> Result<Game> {
        self.post::<(), _>(&format!("games/{id}/advance"), None, true)
            .await
    }

    pub async fn select_teams(&self, id: &GameId, index: u32) -> Result<Vec<String>> {
        let response: SelectionResponse = self
            .post::<(), _>(&format!("games/{id}/rounds/{index}/selection"), None, true)
            .await?;
        Ok(response.selected_teams)
    }

    pub async fn place_bet(&self, id: &GameId, request: &BetRequest) -> Result<Bet> {
        self.post(&format!("games/{id}/bets"), Some(request), false)
            .await
    }

    /// Results for `index`, scored against `winner` or the declared winner.
    pub async fn results(
        &self,
        id: &GameId,
        index: u32,
        winner: Option<&str>,
    ) -> Result<Vec<BettingResult>> {
        let mut url = self.url(&format!("games/{id}/rounds/{index}/results"))?;
        if let Some(winner) = winner {
            url.query_pairs_mut().append_pair("winner", winner);
        }
        let response = self.get_with_retry(url).await?;
        let bytes = response.bytes().await?;
        let response: ResultsResponse = serde_json::from_slice(&bytes)?;
        Ok(response.results)
    }

    pub async fn declare_winner(&self, id: &GameId, index: u32, winner: &str) -> Result<RoundRecord> {
        let request = WinnerRequest {
            winner: winner.to_string(),
        };
        self.post(&format!("games/{id}/rounds/{index}/winner"), Some(&request), true)
            .await
    }

    pub async fn settle(&self, id: &GameId, index: u32) -> Result<Vec<BettingResult>> {
        let response: ResultsResponse = self
            .post::<(), _>(&format!("games/{id}/rounds/{index}/settle"), None, true)
            .await?;
        Ok(response.results)
    }

    pub async fn end_game(&self, id: &GameId) -> Result<DeleteReport> {
        self.call(Method::DELETE, &format!("games/{id}"), None, true)
            .await
    }

    async fn connect(&self, path: &str) -> Result<Stream> {
        let url = self.ws_url.join(path)?;
        let (ws, _) = timeout(DIAL_TIMEOUT, tokio_tungstenite::connect_async(url.as_str()))
            .await
            .map_err(|_| Error::DialTimeout)??;
        debug!(%url, "connected to updates");
        Ok(Stream::new(ws))
    }

    /// Subscribe to changes of the game with `id`.
    pub async fn connect_game(&self, id: &GameId) -> Result<Stream> {
        self.connect(&format!("ws/games/{id}")).await
    }

    /// Subscribe to changes of the game with join code `code`.
    pub async fn connect_code(&self, code: &str) -> Result<Stream> {
        self.connect(&format!("ws/codes/{}", code.trim())).await
    }
}

async fn rejection(method: &Method, url: &Url, response: Response) -> Error {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            warn!(%method, %url, ?err, "failed to read error body");
            return Error::Failed(status);
        }
    };
    match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody { code, error }) => Error::Rejected {
            status,
            code,
            message: error,
        },
        Err(_) => Error::FailedWithBody {
            status,
            body: format!("{method} {url}: {body}"),
        },
    }
}
