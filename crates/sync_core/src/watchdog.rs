//! Keeps the scene-controller link alive.
//!
//! While disconnected a periodic timer attempts one reconnect per tick;
//! entering `Connected` disarms it. Failed attempts are logged and retried on
//! the next tick.

use std::{sync::Arc, time::Duration};

use shared::{domain::ConnectionState, error::classify};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::capability::SceneController;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub endpoint: String,
    pub credential: String,
    pub interval: Duration,
}

pub struct Watchdog {
    controller: Arc<dyn SceneController>,
    connection: watch::Receiver<ConnectionState>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(
        controller: Arc<dyn SceneController>,
        connection: watch::Receiver<ConnectionState>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            controller,
            connection,
            config,
        }
    }

    pub fn spawn(self) -> WatchdogHandle {
        WatchdogHandle {
            task: Some(tokio::spawn(self.run())),
        }
    }

    async fn run(mut self) {
        loop {
            if self
                .connection
                .wait_for(|state| *state == ConnectionState::Disconnected)
                .await
                .is_err()
            {
                return;
            }

            debug!(interval_ms = self.config.interval.as_millis() as u64, "watchdog armed");
            let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if self.connection.borrow().is_connected() {
                            break;
                        }
                        self.attempt_reconnect().await;
                    }
                    changed = self.connection.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if self.connection.borrow_and_update().is_connected() {
                            debug!("watchdog disarmed");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn attempt_reconnect(&self) {
        debug!(endpoint = %self.config.endpoint, "watchdog: attempting reconnect");
        match self
            .controller
            .connect(&self.config.endpoint, &self.config.credential)
            .await
        {
            Ok(()) => info!(endpoint = %self.config.endpoint, "watchdog: reconnect succeeded"),
            Err(err) => warn!(
                endpoint = %self.config.endpoint,
                category = ?classify(&err),
                error = %err,
                "watchdog: reconnect failed; retrying next tick"
            ),
        }
    }
}

/// Aborts the watchdog task when dropped.
pub struct WatchdogHandle {
    task: Option<JoinHandle<()>>,
}

impl WatchdogHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
#[path = "tests/watchdog_tests.rs"]
mod tests;
