use std::{fmt, str::FromStr};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneItem {
    pub source_name: String,
    pub internal_type: String,
}

impl SceneItem {
    pub fn new(source_name: impl Into<String>, internal_type: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            internal_type: internal_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub name: String,
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn new(name: impl Into<String>, items: Vec<SceneItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }
}

/// Which side drives the other. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMode {
    #[default]
    PresentationDriven,
    SceneDriven,
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerMode::PresentationDriven => f.write_str("presentation"),
            ControllerMode::SceneDriven => f.write_str("scene"),
        }
    }
}

impl FromStr for ControllerMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "presentation" | "ppt" | "slides" => Ok(ControllerMode::PresentationDriven),
            "scene" | "obs" => Ok(ControllerMode::SceneDriven),
            other => Err(format!(
                "unknown driver '{other}', expected 'presentation' or 'scene'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyModifiers: u8 {
        const SHIFT = 0b0001;
        const CONTROL = 0b0010;
        const ALT = 0b0100;
        const COMMAND = 0b1000;
    }
}

impl KeyModifiers {
    /// Resolves the notes shorthand: `+` shift, `^` control, `%` alt. Other
    /// characters are ignored.
    pub fn from_shorthand(shorthand: &str) -> Self {
        shorthand
            .chars()
            .fold(KeyModifiers::empty(), |acc, ch| match ch {
                '+' => acc | KeyModifiers::SHIFT,
                '^' => acc | KeyModifiers::CONTROL,
                '%' => acc | KeyModifiers::ALT,
                _ => acc,
            })
    }
}
