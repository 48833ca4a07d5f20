use super::*;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::Mutex;

use crate::capability::{SceneEvent, SceneEventKind};

#[tokio::test]
async fn routes_only_the_subscribed_kind() {
    let (tx, _) = broadcast::channel(16);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = subscribe(tx.subscribe(), SceneEventKind::SceneChanged, move |event| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().await.push(event);
        }
    });

    tx.send(SceneEvent::Connected).expect("send");
    tx.send(SceneEvent::SceneChanged("Intro".into())).expect("send");
    tx.send(SceneEvent::SceneListChanged).expect("send");
    tx.send(SceneEvent::SceneChanged("Outro".into())).expect("send");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        *seen.lock().await,
        vec![
            SceneEvent::SceneChanged("Intro".into()),
            SceneEvent::SceneChanged("Outro".into())
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn handlers_of_one_kind_run_to_completion_in_order() {
    let (tx, _) = broadcast::channel(16);
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let _subscription = subscribe(tx.subscribe(), SceneEventKind::SceneChanged, move |event| {
        let sink = Arc::clone(&sink);
        async move {
            let SceneEvent::SceneChanged(name) = event else {
                return;
            };
            sink.lock().await.push(format!("start {name}"));
            tokio::time::sleep(Duration::from_secs(1)).await;
            sink.lock().await.push(format!("end {name}"));
        }
    });

    tx.send(SceneEvent::SceneChanged("A".into())).expect("send");
    tx.send(SceneEvent::SceneChanged("B".into())).expect("send");
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(
        *log.lock().await,
        vec!["start A", "end A", "start B", "end B"]
    );
}

#[tokio::test(start_paused = true)]
async fn a_slow_kind_does_not_hold_up_other_kinds() {
    let (tx, _) = broadcast::channel(16);
    let fast = Arc::new(AtomicUsize::new(0));
    let slow_done = Arc::new(AtomicUsize::new(0));

    let slow_counter = Arc::clone(&slow_done);
    let _slow = subscribe(tx.subscribe(), SceneEventKind::SceneChanged, move |_| {
        let slow_counter = Arc::clone(&slow_counter);
        async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            slow_counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    let fast_counter = Arc::clone(&fast);
    let _fast = subscribe(tx.subscribe(), SceneEventKind::Disconnected, move |_| {
        let fast_counter = Arc::clone(&fast_counter);
        async move {
            fast_counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    tx.send(SceneEvent::SceneChanged("A".into())).expect("send");
    tx.send(SceneEvent::Disconnected).expect("send");
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(fast.load(Ordering::SeqCst), 1);
    assert_eq!(slow_done.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let (tx, _) = broadcast::channel(16);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let subscription = subscribe(tx.subscribe(), SceneEventKind::Connected, move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(subscription.label(), "Connected");

    tx.send(SceneEvent::Connected).expect("send");
    tokio::time::sleep(Duration::from_millis(50)).await;
    subscription.unsubscribe();
    let _ = tx.send(SceneEvent::Connected);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn subscription_set_releases_everything_on_clear() {
    let (tx, _) = broadcast::channel::<SceneEvent>(16);
    let mut subscriptions = Subscriptions::new();
    subscriptions.push(subscribe(tx.subscribe(), SceneEventKind::Connected, |_| async {}));
    subscriptions.push(subscribe(tx.subscribe(), SceneEventKind::Disconnected, |_| async {}));
    assert_eq!(subscriptions.labels(), vec!["Connected", "Disconnected"]);

    subscriptions.clear();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(subscriptions.is_empty());
    assert_eq!(tx.receiver_count(), 0);
}
