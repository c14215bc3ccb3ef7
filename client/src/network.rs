use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use shared::{decode, encode, ClientMessage, ServerMessage};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("server sent a text frame")]
    UnexpectedText,
    #[error("no message within {0:?}")]
    Timeout(Duration),
}

/// One WebSocket connection to the game server.
///
/// Each binary frame carries exactly one bincode-encoded message.
pub struct GameClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GameClient {
    /// Opens a connection, e.g. to `ws://127.0.0.1:8080`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        info!("Connected to {}", url);
        Ok(GameClient { stream })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        debug!("-> {:?}", message);
        let frame = encode(message)?;
        self.send_raw(frame).await
    }

    /// Sends an arbitrary binary frame, bypassing the encoder.
    pub async fn send_raw(&mut self, frame: Vec<u8>) -> Result<(), ClientError> {
        self.stream.send(Message::Binary(frame)).await?;
        Ok(())
    }

    pub async fn create(
        &mut self,
        name: &str,
        player_name: &str,
        password: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::Create {
            name: name.to_string(),
            player_name: player_name.to_string(),
            password: password.map(str::to_string),
        })
        .await
    }

    pub async fn join(
        &mut self,
        name: &str,
        player_name: &str,
        password: Option<&str>,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::Join {
            name: name.to_string(),
            player_name: player_name.to_string(),
            password: password.map(str::to_string),
        })
        .await
    }

    pub async fn matchmake(&mut self, player_name: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Matchmake {
            player_name: player_name.to_string(),
        })
        .await
    }

    pub async fn play(&mut self, position: u32) -> Result<(), ClientError> {
        self.send(&ClientMessage::Move { position }).await
    }

    /// Waits for the next server message. Returns `None` once the server
    /// has closed the connection.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None)
                }
                Err(e) => return Err(e.into()),
            };

            match frame {
                Message::Binary(bytes) => {
                    let message: ServerMessage = decode(&bytes)?;
                    debug!("<- {:?}", message);
                    return Ok(Some(message));
                }
                Message::Text(_) => return Err(ClientError::UnexpectedText),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Ok(None)
    }

    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ServerMessage>, ClientError> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        }
    }

    /// Closes the connection without a Leave, as a dropped network would.
    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
