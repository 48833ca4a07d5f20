//! Keeps a slide deck and a scene switcher in lock-step.
//!
//! One side drives, the other reacts: slide notes carry commands for the
//! scene controller, scene overlay text carries commands for the
//! presentation.

pub mod capability;
pub mod command;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod scene_cache;
pub mod state;
pub mod watchdog;

pub use capability::{PresentationDriver, PresentationEvent, SceneController, SceneEvent};
pub use command::{parse_hotkey, parse_notes, parse_overlay, Directive, PresentationDirective};
pub use dispatch::{BatchReport, DispatchOutcome, DispatchPolicy, Dispatcher};
pub use engine::{SyncContext, SyncEngine, SyncSettings};

#[cfg(test)]
#[path = "tests/fakes.rs"]
pub(crate) mod fakes;
