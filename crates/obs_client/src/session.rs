use std::{collections::HashMap, sync::Arc};

use futures::{
    stream::{SplitSink, SplitStream},
    StreamExt,
};
use shared::protocol::{IncomingFrame, ObsEvent, ResponseFrame};
use sync_core::SceneEvent;
use tokio::{
    net::TcpStream,
    sync::{broadcast, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(crate) struct Session {
    pub id: u64,
    pub writer: SplitSink<Socket, Message>,
    pub reader: JoinHandle<()>,
    /// Set once the handshake finished and `Connected` went out.
    pub announced: bool,
}

type PendingRequests = HashMap<String, oneshot::Sender<ResponseFrame>>;

/// State shared between the client handle and its socket reader task.
pub(crate) struct Shared {
    pub session: Mutex<Option<Session>>,
    pub pending: Mutex<PendingRequests>,
    pub events: broadcast::Sender<SceneEvent>,
}

impl Shared {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            session: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            events,
        })
    }

    pub fn emit(&self, event: SceneEvent) {
        let _ = self.events.send(event);
    }

    /// Removes session `id` if it is still the current one.
    pub async fn take_session(&self, id: u64) -> Option<Session> {
        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(|session| session.id == id) {
            slot.take()
        } else {
            None
        }
    }

    pub async fn close_session(&self, id: u64) {
        if let Some(session) = self.take_session(id).await {
            self.retire(session).await;
        }
    }

    /// Fails every outstanding request and reports the disconnect.
    pub async fn retire(&self, session: Session) {
        let failed = {
            let mut pending = self.pending.lock().await;
            let count = pending.len();
            pending.clear();
            count
        };
        if failed > 0 {
            debug!(session = session.id, failed, "dropped pending requests");
        }
        if session.announced {
            info!(session = session.id, "obs connection closed");
            self.emit(SceneEvent::Disconnected);
        }
    }

    pub async fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<IncomingFrame>(text) {
            Ok(IncomingFrame::Response(response)) => {
                let waiter = self.pending.lock().await.remove(&response.message_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => debug!(message_id = %response.message_id, "response for unknown request"),
                }
            }
            Ok(IncomingFrame::Event(event)) => {
                if let Some(event) = scene_event(event) {
                    self.emit(event);
                }
            }
            Err(err) => warn!(error = %err, "undecodable obs frame"),
        }
    }
}

pub(crate) fn spawn_reader(
    shared: Arc<Shared>,
    id: u64,
    mut reader: SplitStream<Socket>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = reader.next().await {
            match msg {
                Ok(Message::Text(text)) => shared.handle_frame(&text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    warn!(session = id, error = %err, "obs websocket receive failed");
                    break;
                }
            }
        }
        shared.close_session(id).await;
    })
}

pub(crate) fn scene_event(event: ObsEvent) -> Option<SceneEvent> {
    match event {
        ObsEvent::SwitchScenes { scene_name } => Some(SceneEvent::SceneChanged(scene_name)),
        ObsEvent::ScenesChanged => Some(SceneEvent::SceneListChanged),
        ObsEvent::SceneCollectionChanged => Some(SceneEvent::SceneCollectionChanged),
        ObsEvent::RecordingStarted => Some(SceneEvent::RecordingStateChanged(true)),
        ObsEvent::RecordingStopped => Some(SceneEvent::RecordingStateChanged(false)),
        ObsEvent::StreamStarted => Some(SceneEvent::StreamingStateChanged(true)),
        ObsEvent::StreamStopped => Some(SceneEvent::StreamingStateChanged(false)),
        ObsEvent::Unhandled => None,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
