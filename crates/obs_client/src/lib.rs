//! [`SceneController`] over the obs-websocket 4.x JSON protocol.
//!
//! One socket per connection. Requests are correlated with their responses by
//! `message-id`; unsolicited update frames are decoded into [`SceneEvent`]s.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{KeyModifiers, Scene},
    error::ControllerError,
    protocol::{
        AuthChallenge, ObsRequest, RequestFrame, ResponseFrame, ResponseStatus, SceneListResponse,
        TextSourceProperties,
    },
};
use sync_core::{SceneController, SceneEvent};
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

mod auth;
mod session;

pub use auth::auth_response;

use session::{spawn_reader, Session, Shared};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ObsWebsocket {
    shared: Arc<Shared>,
    next_session: AtomicU64,
    request_timeout: Duration,
}

impl ObsWebsocket {
    pub fn new() -> Arc<Self> {
        Self::with_request_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_request_timeout(request_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            shared: Shared::new(),
            next_session: AtomicU64::new(1),
            request_timeout,
        })
    }

    /// True once the handshake of the current socket has completed.
    pub async fn is_connected(&self) -> bool {
        self.shared
            .session
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.announced)
    }

    async fn request(&self, request: ObsRequest) -> Result<ResponseFrame> {
        let name = request.name();
        let message_id = Uuid::new_v4().to_string();
        let text = serde_json::to_string(&RequestFrame {
            message_id: message_id.clone(),
            request,
        })?;
        let (tx, rx) = oneshot::channel();

        {
            let mut slot = self.shared.session.lock().await;
            let session = slot.as_mut().ok_or(ControllerError::NotConnected)?;
            self.shared
                .pending
                .lock()
                .await
                .insert(message_id.clone(), tx);
            if let Err(err) = session.writer.send(Message::Text(text)).await {
                self.shared.pending.lock().await.remove(&message_id);
                return Err(ControllerError::Transport(err.to_string()).into());
            }
        }
        debug!(request = name, %message_id, "obs request sent");

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(ControllerError::Transport(format!(
                    "connection closed before {name} completed"
                ))
                .into())
            }
            Err(_) => {
                self.shared.pending.lock().await.remove(&message_id);
                return Err(ControllerError::Timeout {
                    request: name.to_string(),
                }
                .into());
            }
        };

        match response.status {
            ResponseStatus::Ok => Ok(response),
            ResponseStatus::Error => Err(ControllerError::request_failed(
                name,
                response.error.unwrap_or_default(),
            )
            .into()),
        }
    }

    async fn request_as<T: DeserializeOwned>(&self, request: ObsRequest) -> Result<T> {
        let name = request.name();
        let response = self.request(request).await?;
        serde_json::from_value(Value::Object(response.fields))
            .with_context(|| format!("malformed {name} response"))
    }

    /// Opens the socket and starts its reader. `None` when a session exists.
    ///
    /// The socket is dialled without holding the session lock and gives up
    /// after the request timeout.
    async fn open_session(&self, endpoint: &Url) -> Result<Option<u64>> {
        if self.shared.session.lock().await.is_some() {
            return Ok(None);
        }

        let (mut socket, _) =
            match tokio::time::timeout(self.request_timeout, connect_async(endpoint.as_str())).await
            {
                Ok(Ok(opened)) => opened,
                Ok(Err(err)) => {
                    return Err(ControllerError::Transport(format!("{endpoint}: {err}")).into())
                }
                Err(_) => {
                    return Err(ControllerError::Timeout {
                        request: "connect".to_string(),
                    }
                    .into())
                }
            };

        let mut slot = self.shared.session.lock().await;
        if slot.is_some() {
            drop(slot);
            debug!(%endpoint, "session opened concurrently; closing extra socket");
            if let Err(err) = socket.close(None).await {
                debug!(error = %err, "extra obs socket close failed");
            }
            return Ok(None);
        }
        let (writer, reader) = socket.split();
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Session {
            id,
            writer,
            reader: spawn_reader(Arc::clone(&self.shared), id, reader),
            announced: false,
        });
        debug!(session = id, %endpoint, "obs socket open");
        Ok(Some(id))
    }

    async fn handshake(&self, credential: &str) -> Result<()> {
        let challenge: AuthChallenge = self.request_as(ObsRequest::GetAuthRequired).await?;
        if !challenge.auth_required {
            return Ok(());
        }

        let (Some(challenge), Some(salt)) = (challenge.challenge, challenge.salt) else {
            return Err(ControllerError::Authentication(
                "auth required but no challenge offered".into(),
            )
            .into());
        };
        let auth = auth_response(credential, &salt, &challenge);
        match self.request(ObsRequest::Authenticate { auth }).await {
            Ok(_) => Ok(()),
            Err(err) => match err.downcast::<ControllerError>() {
                Ok(ControllerError::RequestFailed { message, .. }) => {
                    Err(ControllerError::Authentication(message).into())
                }
                Ok(other) => Err(other.into()),
                Err(err) => Err(err),
            },
        }
    }

    /// Marks session `id` as live. `false` if it closed during the handshake.
    async fn announce(&self, id: u64) -> bool {
        let mut slot = self.shared.session.lock().await;
        match slot.as_mut() {
            Some(session) if session.id == id => {
                session.announced = true;
                true
            }
            _ => false,
        }
    }

    async fn abandon(&self, id: u64) {
        if let Some(session) = self.shared.take_session(id).await {
            self.shutdown_session(session).await;
        }
    }

    async fn shutdown_session(&self, mut session: Session) {
        session.reader.abort();
        if let Err(err) = session.writer.close().await {
            debug!(session = session.id, error = %err, "obs socket close failed");
        }
        self.shared.retire(session).await;
    }
}

/// Accepts `ws://` and `wss://` URLs only.
pub fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)
        .map_err(|err| ControllerError::Transport(format!("invalid endpoint '{endpoint}': {err}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ControllerError::Transport(format!(
            "endpoint must use ws:// or wss://, got '{other}://'"
        ))
        .into()),
    }
}

#[async_trait]
impl SceneController for ObsWebsocket {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<()> {
        let endpoint = parse_endpoint(endpoint)?;
        let Some(id) = self.open_session(&endpoint).await? else {
            debug!(%endpoint, "already connected");
            return Ok(());
        };

        if let Err(err) = self.handshake(credential).await {
            warn!(%endpoint, error = %err, "obs handshake failed");
            self.abandon(id).await;
            return Err(err);
        }
        if !self.announce(id).await {
            return Err(ControllerError::Transport("connection closed during handshake".into()).into());
        }

        info!(session = id, %endpoint, "connected to obs");
        self.shared.emit(SceneEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let session = self.shared.session.lock().await.take();
        if let Some(session) = session {
            self.shutdown_session(session).await;
        }
        Ok(())
    }

    async fn list_scenes(&self) -> Result<Vec<Scene>> {
        let list: SceneListResponse = self.request_as(ObsRequest::GetSceneList).await?;
        Ok(list.scenes.into_iter().map(Scene::from).collect())
    }

    async fn change_scene(&self, name: &str) -> Result<()> {
        self.request(ObsRequest::SetCurrentScene {
            scene_name: name.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn read_overlay_text(&self, source_name: &str) -> Result<String> {
        let properties: TextSourceProperties = self
            .request_as(ObsRequest::GetTextGDIPlusProperties {
                source: source_name.to_string(),
            })
            .await?;
        Ok(properties.text)
    }

    async fn send_hotkey(&self, key_id: &str, modifiers: KeyModifiers) -> Result<()> {
        self.request(ObsRequest::TriggerHotkeyBySequence {
            key_id: key_id.to_string(),
            key_modifiers: modifiers.into(),
        })
        .await?;
        Ok(())
    }

    async fn set_recording(&self, active: bool) -> Result<()> {
        let request = if active {
            ObsRequest::StartRecording
        } else {
            ObsRequest::StopRecording
        };
        self.request(request).await?;
        Ok(())
    }

    async fn set_streaming(&self, active: bool) -> Result<()> {
        let request = if active {
            ObsRequest::StartStreaming
        } else {
            ObsRequest::StopStreaming
        };
        self.request(request).await?;
        Ok(())
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent> {
        self.shared.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_must_be_a_websocket_url() {
        assert!(parse_endpoint("ws://127.0.0.1:4444").is_ok());
        assert!(parse_endpoint("wss://obs.local/ws").is_ok());
        assert!(parse_endpoint("http://127.0.0.1:4444").is_err());
        assert!(parse_endpoint("127.0.0.1:4444").is_err());
    }

    #[tokio::test]
    async fn requests_fail_fast_without_a_socket() {
        let client = ObsWebsocket::new();
        let err = client.change_scene("Intro").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ControllerError>(),
            Some(ControllerError::NotConnected)
        ));
        assert!(!client.is_connected().await);
    }
}
