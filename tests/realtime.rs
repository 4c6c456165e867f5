mod common;

use uuid::Uuid;

use chat_sync::MessageDraft;
use chat_sync::event::model::{MessageEvent, ThreadEvent};
use chat_sync::integration::model::{ChangeEvent, ChangeOp, Table};

use common::{assert_no_event, harness, recv_event, uid};

fn insert_event(record_id: String) -> ChangeEvent {
    ChangeEvent {
        op: ChangeOp::Insert,
        table: Table::Messages,
        record_id,
        record: None,
    }
}

#[tokio::test]
async fn feed_deliveries_skip_push() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);
    let id = h.backend.seed_message(t, "u2", "from elsewhere");

    let mut sub = h.sync.router().subscribe_messages(&t);
    h.sync.start().await.unwrap();

    h.feed.send(insert_event(id.to_string())).unwrap();

    match recv_event(&mut sub).await {
        MessageEvent::New { message, skip_push } => {
            assert_eq!(message.id, id);
            assert_eq!(message.content, "from elsewhere");
            assert!(skip_push);
        }
        other => panic!("expected new-message event, got {other:?}"),
    }

    // the originating side already notified; redelivery must not
    assert!(h.push.sent().is_empty());
}

#[tokio::test]
async fn feed_redelivery_carries_the_stored_id() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);

    let mut sub = h.sync.router().subscribe_messages(&t);
    h.sync.start().await.unwrap();

    let sent = h
        .sync
        .messages()
        .create(&t, &MessageDraft::text("echo me"), &uid("u1"))
        .await
        .unwrap();

    match recv_event(&mut sub).await {
        MessageEvent::New { message, skip_push } => {
            assert_eq!(message.id, sent.id);
            assert!(!skip_push);
        }
        other => panic!("expected local delivery first, got {other:?}"),
    }

    // the backend feed re-announces the same row
    h.feed.send(insert_event(sent.id.to_string())).unwrap();

    match recv_event(&mut sub).await {
        MessageEvent::New { message, skip_push } => {
            // same id both times, so subscribers can collapse the pair
            assert_eq!(message.id, sent.id);
            assert!(skip_push);
        }
        other => panic!("expected feed redelivery, got {other:?}"),
    }
}

#[tokio::test]
async fn unresolvable_change_is_dropped() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);

    let mut sub = h.sync.router().subscribe_messages(&t);
    h.sync.start().await.unwrap();

    h.feed
        .send(insert_event(Uuid::new_v4().to_string()))
        .unwrap();

    assert_no_event(&mut sub).await;
}

#[tokio::test]
async fn call_signaling_survives_a_failed_refetch() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);

    let mut sub = h.sync.router().subscribe_messages(&t);
    h.sync.start().await.unwrap();

    // an id the backend cannot resolve, but with a usable snapshot
    let orphan = Uuid::new_v4();
    h.feed
        .send(ChangeEvent {
            op: ChangeOp::Insert,
            table: Table::Messages,
            record_id: orphan.to_string(),
            record: Some(serde_json::json!({
                "id": orphan,
                "thread_id": t,
                "sender_id": "u2",
                "content": "",
                "message_type": "call_accepted",
            })),
        })
        .unwrap();

    match recv_event(&mut sub).await {
        MessageEvent::New { message, skip_push } => {
            assert_eq!(message.message_type, chat_sync::message::MessageType::CallAccepted);
            assert!(skip_push);
        }
        other => panic!("expected snapshot passthrough, got {other:?}"),
    }
}

#[tokio::test]
async fn thread_changes_reach_participants_only() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);

    let mut member = h.sync.router().subscribe_threads(&uid("u2"));
    let mut outsider = h.sync.router().subscribe_threads(&uid("u3"));
    h.sync.start().await.unwrap();

    h.feed
        .send(ChangeEvent {
            op: ChangeOp::Update,
            table: Table::Threads,
            record_id: t.to_string(),
            record: None,
        })
        .unwrap();

    match recv_event(&mut member).await {
        ThreadEvent::Updated { thread } => assert_eq!(thread.id, t),
        other => panic!("expected thread update, got {other:?}"),
    }
    assert_no_event(&mut outsider).await;
}

#[tokio::test]
async fn unsubscribe_detaches_immediately() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);

    let sub = h.sync.router().subscribe_messages(&t);
    assert_eq!(h.sync.router().message_subscriber_count(&t), 1);

    drop(sub);
    assert_eq!(h.sync.router().message_subscriber_count(&t), 0);

    let mut again = h.sync.router().subscribe_messages(&t);
    again.unsubscribe();
    again.unsubscribe();
    assert_eq!(h.sync.router().message_subscriber_count(&t), 0);
}

#[tokio::test]
async fn dispose_stops_routing_and_clears_subscriptions() {
    let h = harness();
    let t = h.backend.seed_thread(&["u1", "u2"]);
    let id = h.backend.seed_message(t, "u2", "late");

    let mut sub = h.sync.router().subscribe_messages(&t);
    h.sync.start().await.unwrap();
    h.sync.dispose();

    h.feed.send(insert_event(id.to_string())).ok();

    assert_no_event(&mut sub).await;
    assert_eq!(h.sync.router().message_subscriber_count(&t), 0);
}
