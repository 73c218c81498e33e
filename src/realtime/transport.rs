use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::config::RealtimeConfig;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// One live bidirectional channel - all we care about is send/receive
#[async_trait]
pub trait Channel: Send {
    /// Send a text frame to the server
    async fn send_message(&mut self, message: String) -> Result<(), ChannelError>;

    /// Receive the next text frame
    ///
    /// `Ok(None)` means the remote end closed the channel deliberately;
    /// an `Err` means the transport was lost.
    async fn receive_message(&mut self) -> Result<Option<String>, ChannelError>;

    /// Close the channel
    async fn close(&mut self) -> Result<(), ChannelError>;
}

/// Factory for channels bound to a user identity
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, user_id: &str) -> Result<Box<dyn Channel>, ChannelError>;
}

/// Build the endpoint URL for a user, carrying the identity as `userId`
pub fn endpoint_url(base_url: &str, user_id: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ChannelError::ConnectFailed(format!("invalid endpoint {base_url}: {e}")))?;
    url.query_pairs_mut().append_pair("userId", user_id);
    Ok(url)
}

/// WebSocket transport over tokio-tungstenite
pub struct WebSocketTransport {
    base_url: String,
    auth_token: Option<String>,
}

impl WebSocketTransport {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, user_id: &str) -> Result<Box<dyn Channel>, ChannelError> {
        let url = endpoint_url(&self.base_url, user_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        debug!(endpoint = %self.base_url, user_id = %user_id, "Opening WebSocket channel");

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| ChannelError::ConnectFailed(e.to_string()))?;

        Ok(Box::new(WebSocketChannel { stream }))
    }
}

pub struct WebSocketChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn send_message(&mut self, message: String) -> Result<(), ChannelError> {
        self.stream
            .send(Message::Text(message))
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, ChannelError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue, // binary/ping/pong
                Some(Err(e)) => return Err(ChannelError::ReceiveFailed(e.to_string())),
                None => return Err(ChannelError::ConnectionClosed),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}
