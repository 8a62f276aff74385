mod support;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use support::slow_transport::SlowTransport;
use support::task::Task;
use synced_rust::{
    Cursor, Direction, FetchError, Identity, InMemoryStore, ResourceChange, StoreTransport,
    SyncSession, VersionedStore,
};

fn by_created_at() -> Cursor {
    Cursor::new::<Task>("created_at", Direction::Ascending)
}

async fn seeded_store(tasks: &[Task]) -> InMemoryStore {
    let store = InMemoryStore::new();
    for task in tasks {
        store.create(task).await.unwrap();
    }
    store
}

fn ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.id.clone()).collect()
}

#[tokio::test]
async fn collection_reflects_server_push_events() {
    let store = seeded_store(&[
        Task::new("a", "ann", "first", 1),
        Task::new("b", "ann", "second", 2),
    ])
    .await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let tasks = session
        .collection::<Task>(by_created_at().with_page_size(2))
        .await
        .unwrap();
    assert!(tasks.is_complete());
    assert_eq!(ids(&tasks.current()), vec!["a", "b"]);

    // The server reports "a" gone.
    session.publish(&ResourceChange::removal::<Task>(
        Identity::new().with("id", &"a"),
    ));
    assert_eq!(ids(&tasks.current()), vec!["b"]);

    // Then a new task with the lowest ordering value appears.
    session.publish(&ResourceChange::addition(&Task::new("c", "ann", "third", 1)).unwrap());
    assert_eq!(ids(&tasks.current()), vec!["c", "b"]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_subscribers_share_one_fetch() {
    let store = seeded_store(&[Task::new("a", "ann", "first", 1)]).await;
    let transport = SlowTransport::new(
        StoreTransport::new(store.clone()),
        Duration::from_millis(50),
    );
    let fetches = transport.page_fetches();
    let session = SyncSession::new(transport, store);

    let cursor = by_created_at();
    let (first, second, third) = tokio::join!(
        session.collection::<Task>(cursor.clone()),
        session.collection::<Task>(cursor.clone()),
        session.collection::<Task>(cursor.clone()),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    let third = third.unwrap();

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert_eq!(session.live_artifacts(), 1);
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(ids(&first.current()), ids(&third.current()));

    // Eviction is reference-count driven: only the last drop releases.
    drop(first);
    drop(second);
    assert_eq!(session.live_artifacts(), 1);
    drop(third);
    assert_eq!(session.live_artifacts(), 0);

    // A fresh subscription fetches again.
    let again = session.collection::<Task>(cursor).await.unwrap();
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
    assert_eq!(ids(&again.current()), vec!["a"]);
}

#[tokio::test]
async fn filtered_collections_gate_additions() {
    let store = seeded_store(&[Task::new("a", "ann", "first", 1)]).await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let anns = session
        .collection::<Task>(by_created_at().with_filter("owner", &"ann"))
        .await
        .unwrap();
    assert_eq!(ids(&anns.current()), vec!["a"]);

    session.publish(&ResourceChange::addition(&Task::new("b", "bob", "other", 2)).unwrap());
    assert_eq!(ids(&anns.current()), vec!["a"]);

    session.publish(&ResourceChange::addition(&Task::new("c", "ann", "hers", 2)).unwrap());
    assert_eq!(ids(&anns.current()), vec!["a", "c"]);
}

#[tokio::test]
async fn update_does_not_reorder_live_collection() {
    let store = seeded_store(&[
        Task::new("a", "ann", "first", 1),
        Task::new("b", "ann", "second", 2),
    ])
    .await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let tasks = session.collection::<Task>(by_created_at()).await.unwrap();

    let mut partial = synced_rust::AttrMap::new();
    partial.insert("created_at".into(), serde_json::Value::from(99));
    session.publish(&ResourceChange::update::<Task>(
        Identity::new().with("id", &"a"),
        partial,
    ));

    // Ordering-attribute drift does not move the element.
    let current = tasks.current();
    assert_eq!(ids(&current), vec!["a", "b"]);
    assert_eq!(current[0].created_at, 99);
}

#[tokio::test]
async fn load_more_extends_until_complete() {
    let all: Vec<Task> = (1..=5)
        .map(|i| Task::new(&format!("t{}", i), "ann", "work", i))
        .collect();
    let store = seeded_store(&all).await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let tasks = session
        .collection::<Task>(by_created_at().with_page_size(2))
        .await
        .unwrap();
    assert!(!tasks.is_complete());
    assert_eq!(tasks.current().len(), 2);

    assert!(session.load_more(&tasks).await.unwrap());
    assert_eq!(tasks.current().len(), 4);

    assert!(session.load_more(&tasks).await.unwrap());
    assert_eq!(tasks.current().len(), 5);
    assert!(tasks.is_complete());

    assert!(!session.load_more(&tasks).await.unwrap());
    assert_eq!(ids(&tasks.current()), vec!["t1", "t2", "t3", "t4", "t5"]);
}

#[tokio::test]
async fn live_resource_follows_changes() {
    let store = seeded_store(&[Task::new("a", "ann", "first", 1)]).await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let identity = Identity::new().with("id", &"a");
    let task = session.resource::<Task>(identity.clone()).await.unwrap();
    assert_eq!(task.current().unwrap().title, "first");

    let mut partial = synced_rust::AttrMap::new();
    partial.insert("title".into(), serde_json::Value::String("renamed".into()));
    session.publish(&ResourceChange::update::<Task>(identity.clone(), partial));
    assert_eq!(task.current().unwrap().title, "renamed");

    session.publish(&ResourceChange::removal::<Task>(identity));
    assert!(task.current().is_none());
}

#[tokio::test]
async fn missing_resource_fails_with_not_found() {
    let store = InMemoryStore::new();
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let err = session
        .resource::<Task>(Identity::new().with("id", &"ghost"))
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::NotFound);
    assert_eq!(session.live_artifacts(), 0);
}

#[tokio::test]
async fn observers_see_optimistic_then_confirmed() {
    let store = seeded_store(&[Task::new("a", "ann", "first", 1)]).await;
    let session = SyncSession::new(StoreTransport::new(store.clone()), store);

    let tasks = session.collection::<Task>(by_created_at()).await.unwrap();

    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    tasks.observe(move |items| {
        sink.lock().unwrap().push(items.iter().map(|t| t.id.clone()).collect());
    });

    session
        .create(Task::new("b", "ann", "second", 2))
        .await
        .unwrap();

    // One notification for the optimistic overlay, one for the confirmed
    // change; both already include the new task.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], vec!["a", "b"]);
    assert_eq!(seen[1], vec!["a", "b"]);
    assert_eq!(session.pending_mutations(), 0);
}
