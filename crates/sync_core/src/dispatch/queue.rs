use std::sync::Arc;

use tokio::{
    sync::{mpsc, OwnedSemaphorePermit},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{DispatchPolicy, Dispatcher};

/// What set a batch off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    SlideAdvanced(u32),
    SceneChanged(String),
}

struct Admitted {
    trigger: Trigger,
    permit: Option<OwnedSemaphorePermit>,
}

/// Hands triggers from event routes to a single batch worker.
///
/// `submit` never waits on a batch. Under [`DispatchPolicy::DropWhileBusy`]
/// the slot is claimed at submission, so a trigger that arrives while a batch
/// holds it is discarded there; under [`DispatchPolicy::Queue`] triggers wait
/// in arrival order.
pub struct DispatchQueue {
    dispatcher: Arc<Dispatcher>,
    sender: mpsc::UnboundedSender<Admitted>,
    worker: JoinHandle<()>,
}

impl DispatchQueue {
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(Arc::clone(&dispatcher), receiver));
        Self {
            dispatcher,
            sender,
            worker,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// `false` when the trigger was dropped.
    pub fn submit(&self, trigger: Trigger) -> bool {
        let slot = self.dispatcher.slot();
        let permit = match slot.policy() {
            DispatchPolicy::Queue => None,
            DispatchPolicy::DropWhileBusy => match slot.try_claim() {
                Some(permit) => Some(permit),
                None => {
                    warn!(?trigger, "trigger dropped; previous batch still running");
                    return false;
                }
            },
        };

        if self.sender.send(Admitted { trigger, permit }).is_err() {
            warn!("dispatch worker stopped; trigger discarded");
            return false;
        }
        true
    }

    pub fn stop(&self) {
        self.worker.abort();
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(dispatcher: Arc<Dispatcher>, mut receiver: mpsc::UnboundedReceiver<Admitted>) {
    while let Some(Admitted { trigger, permit }) = receiver.recv().await {
        let permit = match permit {
            Some(permit) => permit,
            None => match dispatcher.slot().enter().await {
                Some(permit) => permit,
                None => {
                    debug!(?trigger, "slot unavailable; trigger dropped");
                    continue;
                }
            },
        };
        let outcome = dispatcher.run(trigger, permit).await;
        debug!(?outcome, "batch finished");
    }
}
