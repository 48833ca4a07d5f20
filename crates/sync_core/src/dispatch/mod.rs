//! Directive batch execution for the non-driving side.
//!
//! The driving side is fixed at startup, so the dispatcher is one of two
//! variants. Both run their batches through a single [`BatchSlot`].

use std::{fmt, str::FromStr, sync::Arc};

use shared::domain::ControllerMode;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::engine::SyncContext;

mod presentation_driven;
mod queue;
mod scene_driven;

pub use presentation_driven::{resolve_key_id, PresentationDriven};
pub use queue::{DispatchQueue, Trigger};
pub use scene_driven::SceneDriven;

/// What happens to a trigger that arrives while a batch is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// Wait for the running batch, then run in arrival order.
    #[default]
    Queue,
    /// Discard the trigger.
    DropWhileBusy,
}

impl fmt::Display for DispatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchPolicy::Queue => f.write_str("queue"),
            DispatchPolicy::DropWhileBusy => f.write_str("drop"),
        }
    }
}

impl FromStr for DispatchPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queue" => Ok(DispatchPolicy::Queue),
            "drop" | "drop_while_busy" => Ok(DispatchPolicy::DropWhileBusy),
            other => Err(format!("unknown dispatch policy '{other}'")),
        }
    }
}

/// Depth-one execution slot: at most one batch runs at a time.
pub struct BatchSlot {
    permits: Arc<Semaphore>,
    policy: DispatchPolicy,
}

impl BatchSlot {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
            policy,
        }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// `None` means the trigger was dropped.
    pub async fn enter(&self) -> Option<OwnedSemaphorePermit> {
        match self.policy {
            DispatchPolicy::Queue => Arc::clone(&self.permits).acquire_owned().await.ok(),
            DispatchPolicy::DropWhileBusy => self.try_claim(),
        }
    }

    /// Takes the slot only if it is free right now, whatever the policy.
    pub fn try_claim(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub executed: usize,
    pub failed: usize,
    pub switched: bool,
    pub fallback_suppressed: bool,
    pub fallback_issued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(BatchReport),
    /// Nothing to run: no overlay for the scene, or unreadable notes.
    Skipped,
    /// Another batch held the slot under [`DispatchPolicy::DropWhileBusy`].
    Dropped,
}

impl DispatchOutcome {
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            DispatchOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

pub enum Dispatcher {
    PresentationDriven(PresentationDriven),
    SceneDriven(SceneDriven),
}

impl Dispatcher {
    pub fn new(mode: ControllerMode, context: Arc<SyncContext>) -> Self {
        let slot = BatchSlot::new(context.settings.policy);
        match mode {
            ControllerMode::PresentationDriven => {
                Dispatcher::PresentationDriven(PresentationDriven::new(context, slot))
            }
            ControllerMode::SceneDriven => Dispatcher::SceneDriven(SceneDriven::new(context, slot)),
        }
    }

    pub fn mode(&self) -> ControllerMode {
        match self {
            Dispatcher::PresentationDriven(_) => ControllerMode::PresentationDriven,
            Dispatcher::SceneDriven(_) => ControllerMode::SceneDriven,
        }
    }

    pub fn slot(&self) -> &BatchSlot {
        match self {
            Dispatcher::PresentationDriven(driven) => driven.slot(),
            Dispatcher::SceneDriven(driven) => driven.slot(),
        }
    }

    /// Waits for the slot per policy, then runs the trigger's batch.
    pub async fn dispatch(&self, trigger: Trigger) -> DispatchOutcome {
        let Some(permit) = self.slot().enter().await else {
            debug!(?trigger, "trigger dropped; previous batch still running");
            return DispatchOutcome::Dropped;
        };
        self.run(trigger, permit).await
    }

    /// Runs the trigger's batch while `permit` holds the slot.
    pub async fn run(&self, trigger: Trigger, permit: OwnedSemaphorePermit) -> DispatchOutcome {
        match (self, trigger) {
            (Dispatcher::PresentationDriven(driven), Trigger::SlideAdvanced(slide)) => {
                driven.run_slide(slide, permit).await
            }
            (Dispatcher::SceneDriven(driven), Trigger::SceneChanged(scene)) => {
                driven.run_scene(&scene, permit).await
            }
            (_, trigger) => {
                debug!(?trigger, mode = %self.mode(), "trigger does not drive this mode");
                DispatchOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/dispatch_tests.rs"]
mod tests;
