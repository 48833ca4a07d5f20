//! obs-websocket 4.x wire frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{KeyModifiers, Scene, SceneItem};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "request-type")]
pub enum ObsRequest {
    GetAuthRequired,
    Authenticate {
        auth: String,
    },
    GetSceneList,
    SetCurrentScene {
        #[serde(rename = "scene-name")]
        scene_name: String,
    },
    GetTextGDIPlusProperties {
        source: String,
    },
    TriggerHotkeyBySequence {
        #[serde(rename = "keyId")]
        key_id: String,
        #[serde(rename = "keyModifiers")]
        key_modifiers: HotkeyModifiers,
    },
    StartRecording,
    StopRecording,
    StartStreaming,
    StopStreaming,
}

impl ObsRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ObsRequest::GetAuthRequired => "GetAuthRequired",
            ObsRequest::Authenticate { .. } => "Authenticate",
            ObsRequest::GetSceneList => "GetSceneList",
            ObsRequest::SetCurrentScene { .. } => "SetCurrentScene",
            ObsRequest::GetTextGDIPlusProperties { .. } => "GetTextGDIPlusProperties",
            ObsRequest::TriggerHotkeyBySequence { .. } => "TriggerHotkeyBySequence",
            ObsRequest::StartRecording => "StartRecording",
            ObsRequest::StopRecording => "StopRecording",
            ObsRequest::StartStreaming => "StartStreaming",
            ObsRequest::StopStreaming => "StopStreaming",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HotkeyModifiers {
    pub shift: bool,
    pub alt: bool,
    pub control: bool,
    pub command: bool,
}

impl From<KeyModifiers> for HotkeyModifiers {
    fn from(value: KeyModifiers) -> Self {
        Self {
            shift: value.contains(KeyModifiers::SHIFT),
            alt: value.contains(KeyModifiers::ALT),
            control: value.contains(KeyModifiers::CONTROL),
            command: value.contains(KeyModifiers::COMMAND),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestFrame {
    #[serde(rename = "message-id")]
    pub message_id: String,
    #[serde(flatten)]
    pub request: ObsRequest,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseFrame {
    #[serde(rename = "message-id")]
    pub message_id: String,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "update-type")]
pub enum ObsEvent {
    SwitchScenes {
        #[serde(rename = "scene-name")]
        scene_name: String,
    },
    ScenesChanged,
    SceneCollectionChanged,
    RecordingStarted,
    RecordingStopped,
    StreamStarted,
    StreamStopped,
    #[serde(other)]
    Unhandled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IncomingFrame {
    Response(ResponseFrame),
    Event(ObsEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthChallenge {
    #[serde(rename = "authRequired")]
    pub auth_required: bool,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub salt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneListResponse {
    #[serde(rename = "current-scene", default)]
    pub current_scene: Option<String>,
    pub scenes: Vec<WireScene>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireScene {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<WireSceneItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireSceneItem {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl From<WireScene> for Scene {
    fn from(value: WireScene) -> Self {
        Scene {
            name: value.name,
            items: value
                .sources
                .into_iter()
                .map(|item| SceneItem::new(item.name, item.kind))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextSourceProperties {
    pub source: String,
    #[serde(default)]
    pub text: String,
}
