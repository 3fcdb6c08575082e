//! Periodic cleanup of expired games.
//!
//! Every run deletes games older than the retention window (their rounds and
//! bets go with them) and, when a webhook is configured, posts a one-line
//! status message to it.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;
use slurk_types::api::DeleteReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use url::Url;

use crate::{now_ms, Server};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Chat webhook that accepts `{"content": "..."}` bodies.
#[derive(Clone, Debug)]
pub struct Webhook {
    client: Client,
    url: Url,
}

impl Webhook {
    pub fn new(url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("failed to build webhook client")?;
        Ok(Self { client, url })
    }

    pub async fn post(&self, content: &str) -> Result<()> {
        self.client
            .post(self.url.clone())
            .json(&json!({ "content": content }))
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected message")?;
        Ok(())
    }
}

pub fn status_line(report: &DeleteReport) -> String {
    if report.games == 0 {
        "slurk cleanup: no expired games".to_string()
    } else {
        format!(
            "slurk cleanup: deleted {} games and {} bets",
            report.games, report.bets
        )
    }
}

/// Run one sweep and report it. A webhook failure is logged, not returned.
pub async fn sweep_once(server: &Server, webhook: Option<&Webhook>) -> Result<DeleteReport> {
    let report = server.sweep(now_ms()).await?;
    info!(games = report.games, bets = report.bets, "cleanup finished");
    if let Some(webhook) = webhook {
        if let Err(err) = webhook.post(&status_line(&report)).await {
            warn!(?err, "failed to post cleanup status");
        }
    }
    Ok(report)
}

/// Sweep every `period` until the runtime shuts down.
pub fn spawn(server: Arc<Server>, period: Duration, webhook: Option<Webhook>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is not a sweep.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&server, webhook.as_ref()).await {
                warn!(?err, "cleanup failed");
            }
        }
    })
}
