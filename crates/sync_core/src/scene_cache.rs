//! Additive cache of scenes and their command overlay text.
//!
//! Entries are write-once per scene name: a refresh only ever adds scenes
//! that have not been seen before.

use std::collections::HashMap;

use anyhow::Result;
use shared::domain::{ConnectionState, Scene, SceneItem};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::capability::SceneController;

pub const DEFAULT_OVERLAY_PREFIX: &str = "ppt_commands";
pub const DEFAULT_OVERLAY_TYPE: &str = "text_gdiplus_v2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayMatcher {
    pub source_prefix: String,
    pub internal_type: String,
}

impl Default for OverlayMatcher {
    fn default() -> Self {
        Self {
            source_prefix: DEFAULT_OVERLAY_PREFIX.into(),
            internal_type: DEFAULT_OVERLAY_TYPE.into(),
        }
    }
}

impl OverlayMatcher {
    pub fn matches(&self, item: &SceneItem) -> bool {
        starts_with_ignore_case(&item.source_name, &self.source_prefix)
            && item.internal_type.eq_ignore_ascii_case(&self.internal_type)
    }

    pub fn find<'a>(&self, scene: &'a Scene) -> Option<&'a SceneItem> {
        scene.items.iter().find(|item| self.matches(item))
    }
}

#[derive(Default)]
struct SceneCacheInner {
    scenes: HashMap<String, Scene>,
    overlays: HashMap<String, String>,
}

pub struct SceneCache {
    matcher: OverlayMatcher,
    inner: RwLock<SceneCacheInner>,
}

impl SceneCache {
    pub fn new(matcher: OverlayMatcher) -> Self {
        Self {
            matcher,
            inner: RwLock::new(SceneCacheInner::default()),
        }
    }

    /// Merges the controller's current scene list into the cache and fetches
    /// overlay text for newly seen scenes. Does nothing while disconnected.
    /// Returns the number of scenes added.
    pub async fn refresh(
        &self,
        controller: &dyn SceneController,
        connection: ConnectionState,
    ) -> Result<usize> {
        if !connection.is_connected() {
            debug!("scene cache: refresh skipped while disconnected");
            return Ok(0);
        }

        let listed = controller.list_scenes().await?;

        let fresh: Vec<Scene> = {
            let guard = self.inner.read().await;
            listed
                .into_iter()
                .filter(|scene| !guard.scenes.contains_key(&scene.name))
                .collect()
        };

        let mut overlays = Vec::new();
        for scene in &fresh {
            let Some(item) = self.matcher.find(scene) else {
                continue;
            };
            match controller.read_overlay_text(&item.source_name).await {
                Ok(text) => overlays.push((scene.name.clone(), text)),
                Err(err) => warn!(
                    scene = %scene.name,
                    source = %item.source_name,
                    error = %err,
                    "scene cache: failed to read overlay text"
                ),
            }
        }

        let mut guard = self.inner.write().await;
        let mut added = 0;
        for scene in fresh {
            if let std::collections::hash_map::Entry::Vacant(entry) =
                guard.scenes.entry(scene.name.clone())
            {
                entry.insert(scene);
                added += 1;
            }
        }
        for (name, text) in overlays {
            guard.overlays.entry(name).or_insert(text);
        }

        info!(
            added,
            total = guard.scenes.len(),
            overlays = guard.overlays.len(),
            "scene cache refreshed"
        );
        Ok(added)
    }

    pub async fn lookup_overlay_text(&self, scene_name: &str) -> Option<String> {
        self.inner.read().await.overlays.get(scene_name).cloned()
    }

    pub async fn contains_scene(&self, name: &str) -> bool {
        self.inner.read().await.scenes.contains_key(name)
    }

    pub async fn lookup_scene(&self, name: &str) -> Option<Scene> {
        self.inner.read().await.scenes.get(name).cloned()
    }

    pub async fn scene_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().await.scenes.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.scenes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.scenes.is_empty()
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

#[cfg(test)]
#[path = "tests/scene_cache_tests.rs"]
mod tests;
