use shared::domain::ConnectionState;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::scene_cache::SceneCache;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub connection: ConnectionState,
    pub is_recording: bool,
    pub is_streaming: bool,
    pub current_scene: Option<String>,
    pub default_scene: Option<String>,
}

#[derive(Debug, Default)]
struct MutableState {
    is_recording: bool,
    is_streaming: bool,
    current_scene: Option<String>,
    default_scene: Option<String>,
}

/// Connection flags and scene pointers shared by the event handlers.
pub struct SharedState {
    connection: watch::Sender<ConnectionState>,
    inner: Mutex<MutableState>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connection,
            inner: Mutex::new(MutableState::default()),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let guard = self.inner.lock().await;
        StateSnapshot {
            connection: self.connection(),
            is_recording: guard.is_recording,
            is_streaming: guard.is_streaming,
            current_scene: guard.current_scene.clone(),
            default_scene: guard.default_scene.clone(),
        }
    }

    pub async fn current_scene(&self) -> Option<String> {
        self.inner.lock().await.current_scene.clone()
    }

    pub async fn default_scene(&self) -> Option<String> {
        self.inner.lock().await.default_scene.clone()
    }

    /// The default scene, provided the cache still knows it.
    pub async fn fallback_scene(&self, cache: &SceneCache) -> Option<String> {
        let scene = self.default_scene().await?;
        cache.contains_scene(&scene).await.then_some(scene)
    }

    pub(crate) fn set_connection(&self, state: ConnectionState) {
        self.connection.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    pub(crate) async fn set_current_scene(&self, scene: impl Into<String>) {
        self.inner.lock().await.current_scene = Some(scene.into());
    }

    pub(crate) async fn set_recording(&self, active: bool) {
        self.inner.lock().await.is_recording = active;
    }

    pub(crate) async fn set_streaming(&self, active: bool) {
        self.inner.lock().await.is_streaming = active;
    }

    /// Stores `name` as the default scene iff the cache knows it.
    pub(crate) async fn set_default_scene(&self, cache: &SceneCache, name: &str) -> bool {
        if !cache.contains_scene(name).await {
            debug!(scene = name, "default scene not in cache; ignoring");
            return false;
        }
        self.inner.lock().await.default_scene = Some(name.to_string());
        true
    }
}
