use std::{collections::HashMap, fs, path::Path, path::PathBuf, time::Duration};

use shared::domain::ControllerMode;
use sync_core::{
    engine::DEFAULT_ENDPOINT, scene_cache::OverlayMatcher, watchdog::DEFAULT_RECONNECT_INTERVAL,
    DispatchPolicy, SyncSettings,
};
use tracing::warn;

const ENV_PREFIX: &str = "SWITCHER__";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub driver: ControllerMode,
    pub endpoint: String,
    pub password: String,
    pub reconnect_secs: u64,
    pub overlay_prefix: String,
    pub overlay_type: String,
    pub dispatch_policy: DispatchPolicy,
    pub deck: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let overlay = OverlayMatcher::default();
        Self {
            driver: ControllerMode::default(),
            endpoint: DEFAULT_ENDPOINT.into(),
            password: String::new(),
            reconnect_secs: DEFAULT_RECONNECT_INTERVAL.as_secs(),
            overlay_prefix: overlay.source_prefix,
            overlay_type: overlay.internal_type,
            dispatch_policy: DispatchPolicy::default(),
            deck: PathBuf::from("deck.toml"),
        }
    }
}

impl Settings {
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            endpoint: self.endpoint.clone(),
            credential: self.password.clone(),
            reconnect_interval: Duration::from_secs(self.reconnect_secs.max(1)),
            overlay: OverlayMatcher {
                source_prefix: self.overlay_prefix.clone(),
                internal_type: self.overlay_type.clone(),
            },
            policy: self.dispatch_policy,
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "driver" => match value.parse() {
                Ok(driver) => self.driver = driver,
                Err(err) => warn!(%err, "ignoring driver setting"),
            },
            "endpoint" => self.endpoint = value.to_string(),
            "password" => self.password = value.to_string(),
            "reconnect_secs" => {
                if let Ok(parsed) = value.parse::<u64>() {
                    self.reconnect_secs = parsed;
                }
            }
            "overlay_prefix" => self.overlay_prefix = value.to_string(),
            "overlay_type" => self.overlay_type = value.to_string(),
            "dispatch_policy" => match value.parse() {
                Ok(policy) => self.dispatch_policy = policy,
                Err(err) => warn!(%err, "ignoring dispatch_policy setting"),
            },
            "deck" => self.deck = PathBuf::from(value),
            other => warn!(key = other, "unknown setting"),
        }
    }
}

/// Defaults, then the TOML file at `path` if readable, then `SWITCHER__*`
/// environment variables.
pub fn load_settings(path: &Path) -> Settings {
    let file = fs::read_to_string(path).ok();
    let env = std::env::vars().filter_map(|(key, value)| {
        key.strip_prefix(ENV_PREFIX)
            .map(|key| (key.to_ascii_lowercase(), value))
    });
    resolve(file.as_deref(), env)
}

fn resolve(file: Option<&str>, env: impl IntoIterator<Item = (String, String)>) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => {
                let mut keys: Vec<_> = file_cfg.keys().collect();
                keys.sort();
                for key in keys {
                    settings.apply(key, &file_cfg[key]);
                }
            }
            Err(err) => warn!(error = %err, "config file is not flat key = \"value\" toml; ignoring"),
        }
    }

    for (key, value) in env {
        settings.apply(&key, &value);
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
