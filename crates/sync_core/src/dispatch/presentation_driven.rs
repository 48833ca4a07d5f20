use std::sync::Arc;

use anyhow::Result;
use shared::error::{classify, ControllerError};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

use super::{BatchReport, BatchSlot, DispatchOutcome};
use crate::{
    command::{parse_notes, Directive},
    engine::SyncContext,
};

const KEY_ID_PREFIX: &str = "OBS_KEY_";
const KEY_ID_NONE: &str = "OBS_KEY_NONE";

/// Slides drive scenes: each slide's notes are executed against the scene
/// controller.
pub struct PresentationDriven {
    context: Arc<SyncContext>,
    slot: BatchSlot,
}

impl PresentationDriven {
    pub(super) fn new(context: Arc<SyncContext>, slot: BatchSlot) -> Self {
        Self { context, slot }
    }

    pub fn slot(&self) -> &BatchSlot {
        &self.slot
    }

    pub async fn on_slide_advanced(&self, slide: u32) -> DispatchOutcome {
        let Some(permit) = self.slot.enter().await else {
            warn!(slide, "slide batch dropped; previous batch still running");
            return DispatchOutcome::Dropped;
        };
        self.run_slide(slide, permit).await
    }

    pub(super) async fn run_slide(
        &self,
        slide: u32,
        _permit: OwnedSemaphorePermit,
    ) -> DispatchOutcome {
        let notes = match self.context.presentation.current_slide_notes_text().await {
            Ok(notes) => notes,
            Err(err) => {
                debug!(slide, error = %err, "slide notes unreadable; nothing to run");
                return DispatchOutcome::Skipped;
            }
        };

        let batch = parse_notes(&notes);
        info!(slide, directives = batch.len(), "running slide batch");
        DispatchOutcome::Completed(self.execute(&batch).await)
    }

    /// Runs one batch in order. Failures are logged per directive and the
    /// batch continues.
    pub async fn execute(&self, batch: &[Directive]) -> BatchReport {
        let mut report = BatchReport {
            fallback_suppressed: batch.contains(&Directive::SuppressFallback),
            ..BatchReport::default()
        };

        for directive in batch {
            match self.apply(directive, &mut report).await {
                Ok(()) => report.executed += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        ?directive,
                        category = ?classify(&err),
                        error = %err,
                        "directive failed; continuing batch"
                    );
                }
            }
        }

        if !report.switched && !report.fallback_suppressed {
            self.fall_back(&mut report).await;
        }

        report
    }

    async fn apply(&self, directive: &Directive, report: &mut BatchReport) -> Result<()> {
        let ctx = &self.context;
        match directive {
            Directive::ChangeScene(name) => {
                report.switched = true;
                let target = if ctx.cache.contains_scene(name).await {
                    name.clone()
                } else if let Some(fallback) = ctx.state.fallback_scene(&ctx.cache).await {
                    info!(requested = %name, fallback = %fallback, "unknown scene; using default");
                    fallback
                } else {
                    debug!(requested = %name, "unknown scene and no default; not switching");
                    return Ok(());
                };
                self.switch_to(&target).await?;
            }
            Directive::Delay(duration) => {
                debug!(delay_ms = duration.as_millis() as u64, "batch delay");
                tokio::time::sleep(*duration).await;
            }
            Directive::SendHotkey { modifiers, key } => {
                self.ensure_connected()?;
                let key_id = resolve_key_id(key);
                info!(%key_id, ?modifiers, "sending hotkey");
                ctx.scenes.send_hotkey(&key_id, *modifiers).await?;
            }
            Directive::SetDefaultScene(name) => {
                if ctx.state.set_default_scene(&ctx.cache, name).await {
                    info!(scene = %name, "default scene set");
                }
            }
            Directive::SetRecording(toggle) => {
                self.ensure_connected()?;
                if let Err(err) = ctx.scenes.set_recording(toggle.is_start()).await {
                    debug!(?toggle, error = %err, "recording request rejected; ignoring");
                }
            }
            Directive::SetStreaming(toggle) => {
                self.ensure_connected()?;
                if let Err(err) = ctx.scenes.set_streaming(toggle.is_start()).await {
                    debug!(?toggle, error = %err, "streaming request rejected; ignoring");
                }
            }
            Directive::SuppressFallback => {}
        }
        Ok(())
    }

    async fn fall_back(&self, report: &mut BatchReport) {
        let ctx = &self.context;
        let Some(scene) = ctx.state.fallback_scene(&ctx.cache).await else {
            debug!("no default scene configured; staying put");
            return;
        };

        info!(scene = %scene, "switching to default scene");
        match self.switch_to(&scene).await {
            Ok(issued) => report.fallback_issued = issued,
            Err(err) => {
                report.failed += 1;
                warn!(
                    scene = %scene,
                    category = ?classify(&err),
                    error = %err,
                    "default scene switch failed"
                );
            }
        }
    }

    /// Returns `false` when the scene is already current.
    async fn switch_to(&self, scene: &str) -> Result<bool> {
        let ctx = &self.context;
        self.ensure_connected()?;
        if ctx.state.current_scene().await.as_deref() == Some(scene) {
            debug!(scene, "already on scene; not re-requesting");
            return Ok(false);
        }
        ctx.scenes.change_scene(scene).await?;
        ctx.state.set_current_scene(scene).await;
        Ok(true)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.context.state.connection().is_connected() {
            Ok(())
        } else {
            Err(ControllerError::NotConnected.into())
        }
    }
}

/// Maps a notes key name to an obs key identifier.
pub fn resolve_key_id(key: &str) -> String {
    let key = key.trim().to_ascii_uppercase();
    if key.is_empty() {
        KEY_ID_NONE.to_string()
    } else if key.starts_with(KEY_ID_PREFIX) {
        key
    } else {
        format!("{KEY_ID_PREFIX}{key}")
    }
}
