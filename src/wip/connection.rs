//! WIP WebSocket transport
//!
//! The stream is split once at connect time so the reader can wait on the
//! next frame without blocking writers.

use super::traits::Transport;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to one inspectable tab
pub struct WebSocketTransport {
    /// WebSocket URL
    url: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    is_active: AtomicBool,
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("url", &self.url)
            .field("is_active", &self.is_active())
            .finish()
    }
}

impl WebSocketTransport {
    /// Connect to a tab's debugger URL
    ///
    /// # Arguments
    /// * `url` - WebSocket URL (e.g., "ws://localhost:9222/devtools/page/3")
    /// * `timeout` - Time allowed for the WebSocket handshake
    pub async fn connect<S: Into<String>>(url: S, timeout: Duration) -> Result<Arc<Self>> {
        let url = url.into();
        info!("Connecting to WebSocket: {}", url);

        let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::transport(format!("Timed out connecting to {}", url)))?
            .map_err(|e| Error::transport(format!("Failed to connect: {}", e)))?;

        info!("WebSocket connection established");

        let (sink, stream) = ws_stream.split();
        Ok(Arc::new(Self {
            url,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            is_active: AtomicBool::new(true),
        }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_message(&self, message: Message) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(message)
            .await
            .map_err(|e| Error::transport(format!("Failed to send message: {}", e)))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_frame(&self, frame: String) -> Result<()> {
        if !self.is_active() {
            return Err(Error::transport("Connection is not active"));
        }
        debug!("WebSocket: sending {} bytes", frame.len());
        self.send_message(Message::Text(frame)).await
    }

    async fn recv_frame(&self) -> Option<Result<String>> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text)),
                Some(Ok(Message::Binary(data))) => {
                    return Some(String::from_utf8(data).map_err(|e| {
                        Error::transport(format!("Binary frame is not UTF-8: {}", e))
                    }));
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.send_message(Message::Pong(data)).await {
                        warn!("Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("WebSocket close frame received");
                    self.is_active.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    self.is_active.store(false, Ordering::SeqCst);
                    return Some(Err(Error::transport(format!("WebSocket error: {}", e))));
                }
                None => {
                    warn!("WebSocket stream closed");
                    self.is_active.store(false, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing WebSocket connection to {}", self.url);

        let mut sink = self.sink.lock().await;
        sink.close()
            .await
            .map_err(|e| Error::transport(format!("Failed to close WebSocket: {}", e)))
    }

    fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }
}
