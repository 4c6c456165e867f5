mod common;

use chat_sync::Page;
use chat_sync::MessageDraft;
use chat_sync::event::model::ThreadEvent;
use chat_sync::thread::service::CreateThread;
use chat_sync::thread;

use common::{harness, harness_with_directory, recv_event, uid, StaticDirectory};

#[tokio::test]
async fn created_thread_is_listed_and_announced() {
    let h = harness_with_directory(StaticDirectory::with(&[("u1", "Jora"), ("u2", "Valera")]));
    let mut sub = h.sync.router().subscribe_threads(&uid("u2"));

    let created = h
        .sync
        .threads()
        .create(&uid("u1"), CreateThread::with(vec![uid("u2")]))
        .await
        .unwrap();

    assert_eq!(created.kind, thread::Kind::Direct);
    assert!(created.is_participant(&uid("u1")));
    assert!(created.is_participant(&uid("u2")));

    let listed = h
        .sync
        .threads()
        .find_all(&uid("u1"), &Page::first(50))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.id);

    match recv_event(&mut sub).await {
        ThreadEvent::New { thread } => assert_eq!(thread.id, created.id),
        other => panic!("expected new-thread event, got {other:?}"),
    }
}

#[tokio::test]
async fn explicit_kind_overrides_derivation() {
    let h = harness();

    let mut req = CreateThread::with(vec![uid("u2")]);
    req.kind = Some(thread::Kind::Group);
    req.name = Some("pair study".into());

    let created = h.sync.threads().create(&uid("u1"), req).await.unwrap();

    assert_eq!(created.kind, thread::Kind::Group);
    assert_eq!(created.name, "pair study");
}

#[tokio::test]
async fn listing_excludes_non_participants() {
    let h = harness();
    h.backend.seed_thread(&["u1", "u2"]);

    let theirs = h
        .sync
        .threads()
        .find_all(&uid("u3"), &Page::first(50))
        .await
        .unwrap();

    assert!(theirs.is_empty());
    assert!(!h.sync.degraded());
}

#[tokio::test]
async fn recursive_policy_fault_uses_overview_without_degrading() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);
    h.backend
        .recursive_policy
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let listed = h
        .sync
        .threads()
        .find_all(&uid("u1"), &Page::first(50))
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, t);
    // the alternate read path is a retry, not a fallback
    assert!(!h.sync.degraded());
}

#[tokio::test]
async fn unread_count_is_recomputed_from_read_state() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);
    h.backend.seed_message(t, "u2", "first");
    let second = h.backend.seed_message(t, "u2", "second");

    let listed = h
        .sync
        .threads()
        .find_all(&uid("u1"), &Page::first(50))
        .await
        .unwrap();
    assert_eq!(listed[0].unread_count, 2);

    h.sync
        .messages()
        .mark_read(&t, &[second], &uid("u1"))
        .await
        .unwrap();

    let listed = h
        .sync
        .threads()
        .find_all(&uid("u1"), &Page::first(50))
        .await
        .unwrap();
    assert_eq!(listed[0].unread_count, 1);
}

#[tokio::test]
async fn degraded_creation_is_idempotent_per_participant_set() {
    let h = harness();
    h.backend.set_offline(true);

    let first = h
        .sync
        .threads()
        .create(&uid("u1"), CreateThread::with(vec![uid("u2")]))
        .await
        .unwrap();
    let second = h
        .sync
        .threads()
        .create(&uid("u1"), CreateThread::with(vec![uid("u2")]))
        .await
        .unwrap();

    assert!(h.sync.degraded());
    assert_eq!(first.id, second.id);

    // new message, not new thread
    h.sync
        .messages()
        .create(&first.id, &MessageDraft::text("still here"), &uid("u1"))
        .await
        .unwrap();
    let listed = h
        .sync
        .threads()
        .find_all(&uid("u1"), &Page::first(50))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}
