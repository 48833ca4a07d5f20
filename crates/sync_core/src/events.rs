//! Typed event routing from collaborator broadcast channels.
//!
//! Every subscription is one task: it awaits its handler before pulling the
//! next event, so events of a kind are handled one at a time while other
//! kinds proceed on their own tasks.

use std::{fmt::Debug, future::Future, hash::Hash};

use futures::StreamExt;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

pub trait Routable: Clone + Send + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Live routing of one event kind to a handler. Released on drop.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    label: String,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(subscription = %self.label, "unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn subscribe<E, F, Fut>(
    source: broadcast::Receiver<E>,
    kind: E::Kind,
    handler: F,
) -> Subscription
where
    E: Routable,
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let label = format!("{kind:?}");
    let task_label = label.clone();
    let task = tokio::spawn(async move {
        let mut stream = BroadcastStream::new(source);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) if event.kind() == kind => handler(event).await,
                Ok(_) => {}
                Err(err) => {
                    warn!(subscription = %task_label, error = %err, "subscriber lagged; events dropped");
                }
            }
        }
        debug!(subscription = %task_label, "event source closed");
    });

    Subscription {
        label,
        task: Some(task),
    }
}

/// A set of subscriptions released together.
#[derive(Default)]
pub struct Subscriptions {
    handles: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        self.handles.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.handles.iter().map(Subscription::label).collect()
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
#[path = "tests/events_tests.rs"]
mod tests;
