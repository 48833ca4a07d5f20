use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

use super::{BatchReport, BatchSlot, DispatchOutcome};
use crate::{
    command::{parse_overlay, PresentationDirective},
    engine::SyncContext,
};

/// Scenes drive slides: the overlay text cached for each scene is replayed
/// against the presentation.
pub struct SceneDriven {
    context: Arc<SyncContext>,
    slot: BatchSlot,
}

impl SceneDriven {
    pub(super) fn new(context: Arc<SyncContext>, slot: BatchSlot) -> Self {
        Self { context, slot }
    }

    pub fn slot(&self) -> &BatchSlot {
        &self.slot
    }

    pub async fn on_scene_changed(&self, scene: &str) -> DispatchOutcome {
        let Some(permit) = self.slot.enter().await else {
            warn!(scene, "scene batch dropped; previous batch still running");
            return DispatchOutcome::Dropped;
        };
        self.run_scene(scene, permit).await
    }

    pub(super) async fn run_scene(
        &self,
        scene: &str,
        _permit: OwnedSemaphorePermit,
    ) -> DispatchOutcome {
        let Some(text) = self.context.cache.lookup_overlay_text(scene).await else {
            debug!(scene, "no overlay commands cached for scene");
            return DispatchOutcome::Skipped;
        };

        let batch = parse_overlay(&text);
        info!(scene, directives = batch.len(), "replaying overlay commands");
        DispatchOutcome::Completed(self.execute(&batch).await)
    }

    pub async fn execute(&self, batch: &[PresentationDirective]) -> BatchReport {
        let mut report = BatchReport::default();
        for directive in batch {
            match self.apply(*directive).await {
                Ok(()) => report.executed += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(?directive, error = %err, "presentation directive failed; continuing");
                }
            }
        }
        report
    }

    async fn apply(&self, directive: PresentationDirective) -> Result<()> {
        let presentation = &self.context.presentation;
        match directive {
            PresentationDirective::NextSlide => presentation.advance_next().await,
            PresentationDirective::PreviousSlide => presentation.advance_previous().await,
            PresentationDirective::ClickSlide => presentation.click_current().await,
        }
    }
}
