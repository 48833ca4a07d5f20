//! File-backed presentation: a TOML deck stepped through from the terminal.

use std::{fs, path::Path, sync::Arc};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sync_core::{PresentationDriver, PresentationEvent};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Deck {
    #[serde(default)]
    pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Slide {
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub clicks: u32,
}

impl Deck {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read deck '{}'", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid deck '{}'", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// 1-based slide number; 0 until the show starts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub slide: u32,
    pub click: u32,
}

pub struct DeckDriver {
    slides: Vec<Slide>,
    position: Mutex<Position>,
    events: broadcast::Sender<PresentationEvent>,
}

impl DeckDriver {
    pub fn new(deck: Deck) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            slides: deck.slides,
            position: Mutex::new(Position::default()),
            events,
        })
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub async fn position(&self) -> Position {
        *self.position.lock().await
    }

    /// Caller holds the position lock for the whole step.
    fn show(&self, position: &mut Position, slide: u32) {
        *position = Position { slide, click: 0 };
        info!(slide, total = self.slides.len(), "slide shown");
        let _ = self.events.send(PresentationEvent::SlideAdvanced { slide });
    }

    fn slide(&self, number: u32) -> Option<&Slide> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.slides.get(index)
    }
}

#[async_trait]
impl PresentationDriver for DeckDriver {
    async fn advance_next(&self) -> Result<()> {
        let mut position = self.position.lock().await;
        let current = position.slide;
        if self.slide(current + 1).is_none() {
            debug!(slide = current, "already on the last slide");
            return Ok(());
        }
        self.show(&mut position, current + 1);
        Ok(())
    }

    async fn advance_previous(&self) -> Result<()> {
        let mut position = self.position.lock().await;
        let current = position.slide;
        if current <= 1 {
            debug!(slide = current, "already on the first slide");
            return Ok(());
        }
        self.show(&mut position, current - 1);
        Ok(())
    }

    async fn click_current(&self) -> Result<()> {
        let mut position = self.position.lock().await;
        let slide = self
            .slide(position.slide)
            .ok_or_else(|| anyhow!("slide show is not running"))?;
        if position.click < slide.clicks {
            position.click += 1;
            info!(slide = position.slide, click = position.click, "click");
        } else {
            debug!(slide = position.slide, "no clicks left on slide");
        }
        Ok(())
    }

    async fn current_slide_notes_text(&self) -> Result<String> {
        let current = self.position().await.slide;
        let slide = self
            .slide(current)
            .ok_or_else(|| anyhow!("slide show is not running"))?;
        Ok(slide.notes.replace("\r\n", "\r").replace('\n', "\r"))
    }

    fn subscribe_events(&self) -> broadcast::Receiver<PresentationEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/deck_tests.rs"]
mod tests;
