//! Composition root: context object, dispatch queue, subscriptions, watchdog.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ConnectionState, ControllerMode},
    error::classify,
};
use tracing::{info, warn};

use crate::{
    capability::{
        PresentationDriver, PresentationEvent, PresentationEventKind, SceneController, SceneEvent,
        SceneEventKind,
    },
    dispatch::{DispatchPolicy, DispatchQueue, Dispatcher, Trigger},
    events::{subscribe, Subscriptions},
    scene_cache::{OverlayMatcher, SceneCache},
    state::SharedState,
    watchdog::{Watchdog, WatchdogConfig, WatchdogHandle, DEFAULT_RECONNECT_INTERVAL},
};

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:4444";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub endpoint: String,
    pub credential: String,
    pub reconnect_interval: Duration,
    pub overlay: OverlayMatcher,
    pub policy: DispatchPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            credential: String::new(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            overlay: OverlayMatcher::default(),
            policy: DispatchPolicy::default(),
        }
    }
}

/// Everything a component needs, built once at startup.
pub struct SyncContext {
    pub presentation: Arc<dyn PresentationDriver>,
    pub scenes: Arc<dyn SceneController>,
    pub cache: SceneCache,
    pub state: SharedState,
    pub settings: SyncSettings,
}

impl SyncContext {
    pub fn new(
        presentation: Arc<dyn PresentationDriver>,
        scenes: Arc<dyn SceneController>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            presentation,
            scenes,
            cache: SceneCache::new(settings.overlay.clone()),
            state: SharedState::new(),
            settings,
        })
    }

    pub async fn refresh_scenes(&self) {
        if let Err(err) = self
            .cache
            .refresh(self.scenes.as_ref(), self.state.connection())
            .await
        {
            warn!(category = ?classify(&err), error = %err, "scene list refresh failed");
        }
    }

    fn watchdog_config(&self) -> WatchdogConfig {
        WatchdogConfig {
            endpoint: self.settings.endpoint.clone(),
            credential: self.settings.credential.clone(),
            interval: self.settings.reconnect_interval,
        }
    }
}

pub struct SyncEngine {
    context: Arc<SyncContext>,
    queue: Arc<DispatchQueue>,
    subscriptions: Subscriptions,
    watchdog: Option<WatchdogHandle>,
}

impl SyncEngine {
    /// Installs event routing, makes one connect attempt and arms the
    /// watchdog. Never fails: an unreachable controller is retried later.
    pub async fn start(context: Arc<SyncContext>, mode: ControllerMode) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(mode, Arc::clone(&context)));
        let mut engine = Self {
            context,
            queue: Arc::new(DispatchQueue::spawn(dispatcher)),
            subscriptions: Subscriptions::new(),
            watchdog: None,
        };
        engine.install_subscriptions();
        info!(
            %mode,
            subscriptions = ?engine.subscriptions.labels(),
            "sync engine started"
        );

        engine.initial_connect().await;
        engine.watchdog = Some(
            Watchdog::new(
                Arc::clone(&engine.context.scenes),
                engine.context.state.watch_connection(),
                engine.context.watchdog_config(),
            )
            .spawn(),
        );
        engine
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.queue.dispatcher()
    }

    pub fn mode(&self) -> ControllerMode {
        self.dispatcher().mode()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub async fn shutdown(mut self) {
        info!("shutting down sync engine");
        self.subscriptions.clear();
        self.queue.stop();
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        if let Err(err) = self.context.scenes.disconnect().await {
            warn!(error = %err, "scene controller disconnect failed");
        }
    }

    async fn initial_connect(&self) {
        let settings = &self.context.settings;
        if let Err(err) = self
            .context
            .scenes
            .connect(&settings.endpoint, &settings.credential)
            .await
        {
            warn!(
                endpoint = %settings.endpoint,
                category = ?classify(&err),
                error = %err,
                "scene controller unreachable; watchdog will retry"
            );
        }
    }

    fn install_subscriptions(&mut self) {
        self.route_scene(SceneEventKind::Connected, |ctx, _, _| async move {
            ctx.state.set_connection(ConnectionState::Connected);
            info!("connected to scene controller");
            ctx.refresh_scenes().await;
        });
        self.route_scene(SceneEventKind::Disconnected, |ctx, _, _| async move {
            ctx.state.set_connection(ConnectionState::Disconnected);
            info!("disconnected from scene controller");
        });
        self.route_scene(SceneEventKind::SceneListChanged, |ctx, _, _| async move {
            ctx.refresh_scenes().await;
        });
        self.route_scene(
            SceneEventKind::SceneCollectionChanged,
            |ctx, _, _| async move {
                ctx.refresh_scenes().await;
            },
        );
        self.route_scene(
            SceneEventKind::RecordingStateChanged,
            |ctx, _, event| async move {
                if let SceneEvent::RecordingStateChanged(active) = event {
                    ctx.state.set_recording(active).await;
                    info!(recording = active, "recording state changed");
                }
            },
        );
        self.route_scene(
            SceneEventKind::StreamingStateChanged,
            |ctx, _, event| async move {
                if let SceneEvent::StreamingStateChanged(active) = event {
                    ctx.state.set_streaming(active).await;
                    info!(streaming = active, "streaming state changed");
                }
            },
        );
        self.route_scene(
            SceneEventKind::SceneChanged,
            |ctx, queue, event| async move {
                let SceneEvent::SceneChanged(scene) = event else {
                    return;
                };
                ctx.state.set_current_scene(scene.as_str()).await;
                info!(scene = %scene, "scene controller switched scene");
                if queue.dispatcher().mode() == ControllerMode::SceneDriven {
                    queue.submit(Trigger::SceneChanged(scene));
                }
            },
        );

        if self.mode() == ControllerMode::PresentationDriven {
            let queue = Arc::clone(&self.queue);
            self.subscriptions.push(subscribe(
                self.context.presentation.subscribe_events(),
                PresentationEventKind::SlideAdvanced,
                move |event: PresentationEvent| {
                    let queue = Arc::clone(&queue);
                    async move {
                        let PresentationEvent::SlideAdvanced { slide } = event;
                        info!(slide, "presentation moved to slide");
                        queue.submit(Trigger::SlideAdvanced(slide));
                    }
                },
            ));
        }
    }

    fn route_scene<F, Fut>(&mut self, kind: SceneEventKind, handler: F)
    where
        F: Fn(Arc<SyncContext>, Arc<DispatchQueue>, SceneEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let context = Arc::clone(&self.context);
        let queue = Arc::clone(&self.queue);
        self.subscriptions.push(subscribe(
            self.context.scenes.subscribe_events(),
            kind,
            move |event| handler(Arc::clone(&context), Arc::clone(&queue), event),
        ));
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
