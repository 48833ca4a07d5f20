//! Collaborator capabilities consumed by the engine.
//!
//! Both sides are driven through request/response calls and publish their
//! notifications on a broadcast channel.

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{KeyModifiers, Scene};
use tokio::sync::broadcast;

use crate::events::Routable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationEvent {
    SlideAdvanced { slide: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationEventKind {
    SlideAdvanced,
}

impl Routable for PresentationEvent {
    type Kind = PresentationEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            PresentationEvent::SlideAdvanced { .. } => PresentationEventKind::SlideAdvanced,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Connected,
    Disconnected,
    SceneChanged(String),
    SceneListChanged,
    SceneCollectionChanged,
    RecordingStateChanged(bool),
    StreamingStateChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneEventKind {
    Connected,
    Disconnected,
    SceneChanged,
    SceneListChanged,
    SceneCollectionChanged,
    RecordingStateChanged,
    StreamingStateChanged,
}

impl Routable for SceneEvent {
    type Kind = SceneEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            SceneEvent::Connected => SceneEventKind::Connected,
            SceneEvent::Disconnected => SceneEventKind::Disconnected,
            SceneEvent::SceneChanged(_) => SceneEventKind::SceneChanged,
            SceneEvent::SceneListChanged => SceneEventKind::SceneListChanged,
            SceneEvent::SceneCollectionChanged => SceneEventKind::SceneCollectionChanged,
            SceneEvent::RecordingStateChanged(_) => SceneEventKind::RecordingStateChanged,
            SceneEvent::StreamingStateChanged(_) => SceneEventKind::StreamingStateChanged,
        }
    }
}

#[async_trait]
pub trait PresentationDriver: Send + Sync {
    async fn advance_next(&self) -> Result<()>;
    async fn advance_previous(&self) -> Result<()>;
    async fn click_current(&self) -> Result<()>;
    async fn current_slide_notes_text(&self) -> Result<String>;
    fn subscribe_events(&self) -> broadcast::Receiver<PresentationEvent>;
}

#[async_trait]
pub trait SceneController: Send + Sync {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn list_scenes(&self) -> Result<Vec<Scene>>;
    async fn change_scene(&self, name: &str) -> Result<()>;
    async fn read_overlay_text(&self, source_name: &str) -> Result<String>;
    async fn send_hotkey(&self, key_id: &str, modifiers: KeyModifiers) -> Result<()>;
    async fn set_recording(&self, active: bool) -> Result<()>;
    async fn set_streaming(&self, active: bool) -> Result<()>;
    fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent>;
}
