use super::*;
use std::time::Duration;

use shared::domain::{ConnectionState, ControllerMode, KeyModifiers};

use crate::{
    command::{Directive, OutputToggle, PresentationDirective},
    engine::SyncSettings,
    fakes::{context, ControllerCall, FakePresentation, FakeSceneController, PresentationCall},
};

struct Harness {
    presentation: Arc<FakePresentation>,
    controller: Arc<FakeSceneController>,
    context: Arc<SyncContext>,
}

impl Harness {
    async fn connected(scenes: &[&str]) -> Self {
        Self::with_policy(scenes, DispatchPolicy::Queue).await
    }

    async fn with_policy(scenes: &[&str], policy: DispatchPolicy) -> Self {
        let presentation = FakePresentation::new();
        let controller = FakeSceneController::new().with_scenes(scenes);
        let settings = SyncSettings {
            policy,
            ..SyncSettings::default()
        };
        let context = context(&presentation, &controller, settings);
        context.state.set_connection(ConnectionState::Connected);
        context.refresh_scenes().await;
        Self {
            presentation,
            controller,
            context,
        }
    }

    fn slides(&self) -> Arc<PresentationDriven> {
        Arc::new(PresentationDriven::new(
            Arc::clone(&self.context),
            BatchSlot::new(self.context.settings.policy),
        ))
    }

    fn scenes(&self) -> SceneDriven {
        SceneDriven::new(
            Arc::clone(&self.context),
            BatchSlot::new(self.context.settings.policy),
        )
    }

    async fn set_default(&self, scene: &str) {
        assert!(
            self.context
                .state
                .set_default_scene(&self.context.cache, scene)
                .await
        );
    }
}

#[tokio::test]
async fn explicit_switch_skips_fallback() {
    let harness = Harness::connected(&["Foo", "Wide"]).await;
    harness.set_default("Wide").await;

    let report = harness
        .slides()
        .execute(&[Directive::ChangeScene("Foo".into())])
        .await;

    assert_eq!(harness.controller.scene_switches(), vec!["Foo"]);
    assert!(report.switched);
    assert!(!report.fallback_issued);
}

#[tokio::test]
async fn empty_batch_falls_back_to_default_scene() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.set_default("Foo").await;

    let report = harness.slides().execute(&[]).await;

    assert_eq!(harness.controller.scene_switches(), vec!["Foo"]);
    assert!(report.fallback_issued);
}

#[tokio::test]
async fn empty_batch_without_default_does_nothing() {
    let harness = Harness::connected(&["Foo"]).await;

    let report = harness.slides().execute(&[]).await;

    assert!(harness.controller.scene_switches().is_empty());
    assert_eq!(report, BatchReport::default());
}

#[tokio::test]
async fn stay_suppresses_every_switch() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.set_default("Foo").await;

    let report = harness
        .slides()
        .execute(&[
            Directive::SendHotkey {
                modifiers: KeyModifiers::empty(),
                key: "F1".into(),
            },
            Directive::SuppressFallback,
        ])
        .await;

    assert!(harness.controller.scene_switches().is_empty());
    assert!(report.fallback_suppressed);
    assert!(!report.fallback_issued);
}

#[tokio::test]
async fn stay_applies_only_to_the_slide_that_declared_it() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.set_default("Foo").await;
    let slides = harness.slides();

    harness.presentation.set_notes(Some("OBSStay"));
    slides.on_slide_advanced(1).await;
    assert!(harness.controller.scene_switches().is_empty());

    harness.presentation.set_notes(Some(""));
    let outcome = slides.on_slide_advanced(2).await;

    assert_eq!(harness.controller.scene_switches(), vec!["Foo"]);
    assert!(outcome.report().expect("report").fallback_issued);
}

#[tokio::test]
async fn default_scene_must_exist_in_cache() {
    let harness = Harness::connected(&["Foo"]).await;

    harness
        .slides()
        .execute(&[Directive::SetDefaultScene("Missing".into())])
        .await;

    assert_eq!(harness.context.state.default_scene().await, None);
    assert!(harness.controller.scene_switches().is_empty());
}

#[tokio::test]
async fn default_declared_in_a_batch_is_its_own_fallback() {
    let harness = Harness::connected(&["Foo", "Wide"]).await;

    let report = harness
        .slides()
        .execute(&[Directive::SetDefaultScene("Wide".into())])
        .await;

    assert_eq!(
        harness.context.state.default_scene().await.as_deref(),
        Some("Wide")
    );
    assert_eq!(harness.controller.scene_switches(), vec!["Wide"]);
    assert!(report.fallback_issued);
}

#[tokio::test]
async fn unknown_scene_is_replaced_by_default() {
    let harness = Harness::connected(&["Wide"]).await;
    harness.set_default("Wide").await;

    let report = harness
        .slides()
        .execute(&[Directive::ChangeScene("Nope".into())])
        .await;

    assert_eq!(harness.controller.scene_switches(), vec!["Wide"]);
    assert!(report.switched);
    assert!(!report.fallback_issued);
}

#[tokio::test]
async fn unknown_scene_without_default_is_not_requested() {
    let harness = Harness::connected(&["Wide"]).await;

    let report = harness
        .slides()
        .execute(&[Directive::ChangeScene("Nope".into())])
        .await;

    assert!(harness.controller.scene_switches().is_empty());
    assert!(report.switched);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn switching_to_the_current_scene_is_not_requested_again() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.context.state.set_current_scene("Foo").await;

    harness
        .slides()
        .execute(&[Directive::ChangeScene("Foo".into())])
        .await;

    assert!(harness.controller.scene_switches().is_empty());
}

#[tokio::test]
async fn rejected_recording_request_is_ignored() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.controller.fail("SetRecording");

    let report = harness
        .slides()
        .execute(&[
            Directive::SetRecording(OutputToggle::Start),
            Directive::SetStreaming(OutputToggle::Stop),
            Directive::ChangeScene("Foo".into()),
        ])
        .await;

    assert_eq!(report.failed, 0);
    assert_eq!(report.executed, 3);
    assert!(harness
        .controller
        .calls()
        .ends_with(&[
            ControllerCall::Recording(true),
            ControllerCall::Streaming(false),
            ControllerCall::ChangeScene("Foo".into()),
        ]));
}

#[tokio::test]
async fn failed_directive_does_not_abort_the_batch() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.controller.fail("SetCurrentScene");

    let report = harness
        .slides()
        .execute(&[
            Directive::ChangeScene("Foo".into()),
            Directive::SendHotkey {
                modifiers: KeyModifiers::SHIFT | KeyModifiers::CONTROL,
                key: "a".into(),
            },
        ])
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.executed, 1);
    assert!(harness.controller.calls().contains(&ControllerCall::Hotkey(
        "OBS_KEY_A".into(),
        KeyModifiers::SHIFT | KeyModifiers::CONTROL
    )));
    assert_eq!(harness.context.state.current_scene().await, None);
}

#[tokio::test]
async fn disconnected_controller_fails_each_directive_but_batch_continues() {
    let harness = Harness::connected(&["Foo"]).await;
    harness
        .context
        .state
        .set_connection(ConnectionState::Disconnected);

    let report = harness
        .slides()
        .execute(&[
            Directive::ChangeScene("Foo".into()),
            Directive::SendHotkey {
                modifiers: KeyModifiers::empty(),
                key: "F1".into(),
            },
            Directive::SetDefaultScene("Foo".into()),
        ])
        .await;

    assert_eq!(report.failed, 2);
    assert_eq!(report.executed, 1);
    assert!(harness.controller.scene_switches().is_empty());
    assert_eq!(
        harness.context.state.default_scene().await.as_deref(),
        Some("Foo")
    );
}

#[tokio::test]
async fn unreadable_notes_abort_without_fallback() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.set_default("Foo").await;
    harness.presentation.set_notes(None);

    let outcome = harness.slides().on_slide_advanced(3).await;

    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert!(harness.controller.scene_switches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn delay_suspends_only_the_running_batch() {
    let harness = Harness::connected(&["Foo", "Bar"]).await;
    harness
        .presentation
        .set_notes(Some("OBSScene:Foo\rOBSDelay:2000\rOBSScene:Bar"));
    let slides = harness.slides();

    let running = tokio::spawn({
        let slides = Arc::clone(&slides);
        async move { slides.on_slide_advanced(1).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.controller.scene_switches(), vec!["Foo"]);
    assert!(slides.slot().is_busy());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.controller.scene_switches(), vec!["Foo", "Bar"]);
    let outcome = running.await.expect("join");
    assert_eq!(outcome.report().expect("report").executed, 3);
}

#[tokio::test(start_paused = true)]
async fn queue_policy_runs_triggers_one_after_another() {
    let harness = Harness::with_policy(&["Foo"], DispatchPolicy::Queue).await;
    harness
        .presentation
        .set_notes(Some("OBSDelay:1000\rOBSHotKeys:A"));
    let slides = harness.slides();

    let first = tokio::spawn({
        let slides = Arc::clone(&slides);
        async move { slides.on_slide_advanced(1).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = tokio::spawn({
        let slides = Arc::clone(&slides);
        async move { slides.on_slide_advanced(2).await }
    });

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(hotkeys(&harness), 1);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(hotkeys(&harness), 2);
    assert!(matches!(first.await.expect("join"), DispatchOutcome::Completed(_)));
    assert!(matches!(second.await.expect("join"), DispatchOutcome::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn drop_policy_discards_triggers_while_busy() {
    let harness = Harness::with_policy(&["Foo"], DispatchPolicy::DropWhileBusy).await;
    harness
        .presentation
        .set_notes(Some("OBSDelay:1000\rOBSHotKeys:A"));
    let slides = harness.slides();

    let first = tokio::spawn({
        let slides = Arc::clone(&slides);
        async move { slides.on_slide_advanced(1).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(slides.on_slide_advanced(2).await, DispatchOutcome::Dropped);
    assert!(matches!(first.await.expect("join"), DispatchOutcome::Completed(_)));
    assert_eq!(hotkeys(&harness), 1);

    assert!(matches!(
        slides.on_slide_advanced(3).await,
        DispatchOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn trigger_for_the_other_side_is_skipped() {
    let harness = Harness::connected(&["Foo"]).await;
    harness.presentation.set_notes(Some("OBSScene:Foo"));
    let dispatcher = Dispatcher::new(ControllerMode::SceneDriven, Arc::clone(&harness.context));

    let outcome = dispatcher.dispatch(Trigger::SlideAdvanced(1)).await;

    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert!(harness.controller.scene_switches().is_empty());
    assert!(!dispatcher.slot().is_busy());
}

#[tokio::test]
async fn claimed_slot_is_released_with_its_permit() {
    let slot = BatchSlot::new(DispatchPolicy::Queue);

    let permit = slot.try_claim().expect("free slot");
    assert!(slot.is_busy());
    assert!(slot.try_claim().is_none());

    drop(permit);
    assert!(!slot.is_busy());
}

#[tokio::test]
async fn scene_overlay_is_replayed_in_order() {
    let harness = Harness::connected(&[]).await;
    harness
        .controller
        .add_overlay_scene("Intro", "ppt_commands", "next_slide\nclick_slide\nprevious_slide");
    harness.context.refresh_scenes().await;

    let outcome = harness.scenes().on_scene_changed("Intro").await;

    assert_eq!(
        harness.presentation.calls(),
        vec![
            PresentationCall::Next,
            PresentationCall::Click,
            PresentationCall::Previous
        ]
    );
    assert_eq!(outcome.report().expect("report").executed, 3);
}

#[tokio::test]
async fn scene_without_overlay_does_nothing() {
    let harness = Harness::connected(&["Plain"]).await;

    let outcome = harness.scenes().on_scene_changed("Plain").await;

    assert_eq!(outcome, DispatchOutcome::Skipped);
    assert!(harness.presentation.calls().is_empty());
}

#[tokio::test]
async fn failing_presentation_call_does_not_stop_replay() {
    let harness = Harness::connected(&[]).await;
    harness.presentation.fail_next_slide();

    let report = harness
        .scenes()
        .execute(&[
            PresentationDirective::NextSlide,
            PresentationDirective::ClickSlide,
        ])
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.executed, 1);
    assert_eq!(
        harness.presentation.calls(),
        vec![PresentationCall::Next, PresentationCall::Click]
    );
}

#[test]
fn key_names_resolve_to_key_ids() {
    assert_eq!(resolve_key_id("a"), "OBS_KEY_A");
    assert_eq!(resolve_key_id("obs_key_f5"), "OBS_KEY_F5");
    assert_eq!(resolve_key_id("  "), "OBS_KEY_NONE");
}

#[test]
fn policy_parses_from_config_words() {
    assert_eq!("queue".parse::<DispatchPolicy>(), Ok(DispatchPolicy::Queue));
    assert_eq!("DROP".parse::<DispatchPolicy>(), Ok(DispatchPolicy::DropWhileBusy));
    assert!("later".parse::<DispatchPolicy>().is_err());
}

fn hotkeys(harness: &Harness) -> usize {
    harness
        .controller
        .calls()
        .into_iter()
        .filter(|call| matches!(call, ControllerCall::Hotkey(..)))
        .count()
}
