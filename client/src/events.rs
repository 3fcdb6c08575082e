use crate::{Error, Result};
use futures_util::{Stream as FutStream, StreamExt};
use slurk_types::api::Update;
use tokio::sync::mpsc;
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::{debug, error, trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Stream of change notifications from the WebSocket connection
pub struct Stream {
    receiver: mpsc::Receiver<Result<Update>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Drop for Stream {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

fn decode(data: &[u8]) -> Result<Update> {
    serde_json::from_slice(data).map_err(Error::InvalidData)
}

impl Stream {
    fn capacity_or_default(capacity: usize) -> usize {
        if capacity == 0 {
            DEFAULT_CHANNEL_CAPACITY
        } else {
            capacity
        }
    }

    fn spawn_reader<S>(ws: WebSocketStream<S>, tx: mpsc::Sender<Result<Update>>) -> tokio::task::JoinHandle<()>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ws = ws;
            while let Some(msg) = ws.next().await {
                let decoded = match msg {
                    Ok(Message::Text(text)) => {
                        trace!(len = text.len(), "received websocket message");
                        decode(text.as_bytes())
                    }
                    Ok(Message::Binary(data)) => {
                        trace!(len = data.len(), "received binary websocket message");
                        decode(&data)
                    }
                    Ok(Message::Close(_)) => {
                        debug!("WebSocket closed");
                        let _ = tx.send(Err(Error::ConnectionClosed)).await;
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        let _ = tx.send(Err(e.into())).await;
                        break;
                    }
                };
                if let Err(err) = &decoded {
                    warn!(error = %err, "failed to decode update");
                }
                if tx.send(decoded).await.is_err() {
                    break; // Receiver dropped
                }
            }
        })
    }

    pub(crate) fn new<S>(ws: WebSocketStream<S>) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        Self::new_with_capacity(ws, DEFAULT_CHANNEL_CAPACITY)
    }

    pub(crate) fn new_with_capacity<S>(ws: WebSocketStream<S>, capacity: usize) -> Self
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(Self::capacity_or_default(capacity));
        let handle = Self::spawn_reader(ws, tx);
        Self {
            receiver: rx,
            _handle: handle,
        }
    }

    /// Receive the next update from the stream
    pub async fn next(&mut self) -> Option<Result<Update>> {
        self.receiver.recv().await
    }
}

impl FutStream for Stream {
    type Item = Result<Update>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_decodes_tagged_updates() {
        let id = Uuid::new_v4();
        let text = format!(r#"{{"type":"deleted","game_id":"{id}"}}"#);
        assert_eq!(decode(text.as_bytes()).unwrap(), Update::Deleted { game_id: id });
        assert!(matches!(decode(b"{}"), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        assert_eq!(Stream::capacity_or_default(0), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(Stream::capacity_or_default(8), 8);
    }
}
