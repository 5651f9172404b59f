//! Discord gateway connection
//!
//! Connects, identifies, heartbeats and forwards `MESSAGE_CREATE` dispatches
//! to a channel. There is no resume logic: when the gateway drops us, asks us
//! to reconnect or invalidates the session, `run` returns an error and the
//! process ends.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::header::{HeaderValue, USER_AGENT};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::discord::models::{intents, opcode, GatewayPayload, Hello, Message, Ready, User};
use crate::errors::BotError;

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";

/// Gateway options
#[derive(Debug, Clone)]
pub struct Options {
    /// Gateway websocket URL, without query parameters
    pub url: String,

    /// Gateway intents requested at identify
    pub intents: u64,

    /// Time allowed for Hello and READY after connecting
    pub handshake_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: DEFAULT_GATEWAY_URL.to_string(),
            intents: intents::GUILDS
                | intents::GUILD_MEMBERS
                | intents::GUILD_MESSAGES
                | intents::MESSAGE_CONTENT,
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

/// An identified gateway session
pub struct GatewayConnection {
    stream: WsConnection,
    heartbeat_interval: Duration,
    sequence: Option<u64>,
    user: User,
}

impl GatewayConnection {
    /// Connect and identify, returning once READY has been received
    pub async fn connect(options: &Options, token: &str) -> Result<Self, BotError> {
        let url = build_gateway_url(&options.url)?;
        info!("Connecting to Discord gateway: {}", url);

        let mut request = url.as_str().into_client_request()?;
        request.headers_mut().insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("deploybot/", env!("CARGO_PKG_VERSION"))),
        );

        let (stream, _) = connect_async(request).await?;

        tokio::time::timeout(options.handshake_timeout, Self::handshake(stream, options, token))
            .await
            .map_err(|_| {
                BotError::GatewayError(format!(
                    "No READY within {:?} of connecting",
                    options.handshake_timeout
                ))
            })?
    }

    async fn handshake(mut stream: WsConnection, options: &Options, token: &str) -> Result<Self, BotError> {
        let hello = next_payload(&mut stream).await?;
        if hello.op != opcode::HELLO {
            return Err(BotError::GatewayError(format!("Expected Hello, got op {}", hello.op)));
        }
        let hello: Hello = serde_json::from_value(hello.d.unwrap_or_default())?;
        let heartbeat_interval = Duration::from_millis(hello.heartbeat_interval);
        debug!("Gateway heartbeat interval: {:?}", heartbeat_interval);

        let identify = json!({
            "op": opcode::IDENTIFY,
            "d": {
                "token": token,
                "intents": options.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "deploybot",
                    "device": "deploybot",
                },
            },
        });
        stream.send(WsMessage::Text(identify.to_string().into())).await?;

        let mut sequence = None;
        loop {
            let payload = next_payload(&mut stream).await?;
            if payload.s.is_some() {
                sequence = payload.s;
            }
            match (payload.op, payload.t.as_deref()) {
                (opcode::DISPATCH, Some("READY")) => {
                    let ready: Ready = serde_json::from_value(payload.d.unwrap_or_default())?;
                    info!("{} is ready! (session {})", ready.user.tag(), ready.session_id);
                    return Ok(Self {
                        stream,
                        heartbeat_interval,
                        sequence,
                        user: ready.user,
                    });
                }
                (opcode::INVALID_SESSION, _) => {
                    return Err(BotError::GatewayError(
                        "Identify rejected: invalid session".to_string(),
                    ));
                }
                (op, t) => trace!("Ignoring gateway frame before READY: op {} {:?}", op, t),
            }
        }
    }

    /// The bot's own user
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Pump the gateway until shutdown or disconnect.
    ///
    /// Returns `Ok` only on shutdown. Events are dropped rather than queued
    /// when the receiver has gone away.
    pub async fn run(
        mut self,
        events: mpsc::Sender<Message>,
        mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<(), BotError> {
        let mut heartbeat_tick = interval_at(Instant::now() + self.heartbeat_interval, self.heartbeat_interval);
        let mut awaiting_ack = false;

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Closing gateway connection...");
                    if let Err(e) = self.stream.close(None).await {
                        warn!("Failed to close gateway cleanly: {}", e);
                    }
                    return Ok(());
                }
                _ = heartbeat_tick.tick() => {
                    if awaiting_ack {
                        return Err(BotError::GatewayError("Heartbeat not acknowledged".to_string()));
                    }
                    self.send_heartbeat().await?;
                    awaiting_ack = true;
                }
                msg = self.stream.next() => {
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            return Err(BotError::GatewayError(format!("Gateway closed connection: {:?}", frame)));
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(BotError::GatewayError("Gateway stream ended".to_string())),
                    };

                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Unparseable gateway frame: {}", e);
                            continue;
                        }
                    };
                    if payload.s.is_some() {
                        self.sequence = payload.s;
                    }

                    match payload.op {
                        opcode::DISPATCH => self.dispatch(payload, &events).await,
                        opcode::HEARTBEAT => self.send_heartbeat().await?,
                        opcode::HEARTBEAT_ACK => awaiting_ack = false,
                        opcode::RECONNECT => {
                            return Err(BotError::GatewayError("Gateway requested reconnect".to_string()));
                        }
                        opcode::INVALID_SESSION => {
                            return Err(BotError::GatewayError("Gateway session invalidated".to_string()));
                        }
                        op => debug!("Unhandled gateway opcode: {}", op),
                    }
                }
            }
        }
    }

    async fn send_heartbeat(&mut self) -> Result<(), BotError> {
        let heartbeat = json!({ "op": opcode::HEARTBEAT, "d": self.sequence });
        trace!("Sending heartbeat (seq {:?})", self.sequence);
        self.stream.send(WsMessage::Text(heartbeat.to_string().into())).await?;
        Ok(())
    }

    async fn dispatch(&self, payload: GatewayPayload, events: &mpsc::Sender<Message>) {
        if payload.t.as_deref() != Some("MESSAGE_CREATE") {
            return;
        }

        let message: Message = match serde_json::from_value(payload.d.unwrap_or_default()) {
            Ok(message) => message,
            Err(e) => {
                warn!("Malformed MESSAGE_CREATE: {}", e);
                return;
            }
        };

        if events.send(message).await.is_err() {
            error!("Event receiver dropped, discarding message");
        }
    }
}

async fn next_payload(stream: &mut WsConnection) -> Result<GatewayPayload, BotError> {
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => return Ok(serde_json::from_str(&text)?),
            Some(Ok(WsMessage::Close(frame))) => {
                return Err(BotError::GatewayError(format!("Gateway closed connection: {:?}", frame)));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(BotError::GatewayError("Gateway stream ended".to_string())),
        }
    }
}

fn build_gateway_url(base: &str) -> Result<Url, BotError> {
    let mut url = Url::parse(base).map_err(|e| BotError::ConfigError(e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        _ => return Err(BotError::ConfigError("Invalid gateway URL scheme".to_string())),
    }

    url.query_pairs_mut()
        .clear()
        .append_pair("v", "10")
        .append_pair("encoding", "json");

    Ok(url)
}
