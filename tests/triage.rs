use std::sync::Arc;

use missionterm::bridge::demo::DemoBridge;
use missionterm::bridge::{Bridge, RemoteAction};
use missionterm::conversation::{Conversation, ReplyComposer};
use missionterm::dispatch::{Completion, TaskDispatcher};
use missionterm::recipients::ReplyMode;
use missionterm::store::{MutationKind, MutationStore};
use tokio::sync::mpsc::{self, UnboundedReceiver};

const ME: &str = "me@example.com";

type Store = MutationStore<TaskDispatcher<DemoBridge>>;

async fn setup(bridge: Arc<DemoBridge>) -> (Store, UnboundedReceiver<Completion>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = TaskDispatcher::new(Arc::clone(&bridge), tx);
    let mut store = MutationStore::new(ME, dispatcher);
    store.refresh(bridge.fetch_inbox(ME).await.unwrap());
    (store, rx)
}

async fn settle_all(store: &mut Store, rx: &mut UnboundedReceiver<Completion>, count: usize) {
    for _ in 0..count {
        let completion = rx.recv().await.expect("completion");
        store.settle(completion);
    }
}

fn visible(store: &Store) -> Vec<String> {
    store.visible_items().iter().map(|i| i.id.clone()).collect()
}

#[tokio::test]
async fn test_archive_and_similar_round_trip() {
    let bridge = Arc::new(DemoBridge::new());
    let (mut store, mut rx) = setup(Arc::clone(&bridge)).await;
    assert_eq!(store.visible_len(), 6);

    store.apply_single("demo_1", MutationKind::Archive).unwrap();
    assert!(!store.is_visible("demo_1"));

    let prompt = store.prompt().expect("acme.com prompt");
    assert_eq!(prompt.domain, "acme.com");
    let mut candidates: Vec<_> = prompt.candidates.iter().map(|c| c.id.clone()).collect();
    candidates.sort();
    assert_eq!(candidates, vec!["demo_2", "demo_3"]);

    let tickets = store.accept_prompt();
    assert_eq!(tickets.len(), 2);
    settle_all(&mut store, &mut rx, 3).await;

    assert_eq!(store.pending_count(), 0);
    assert!(visible(&store).iter().all(|id| !id.starts_with("demo_1")));
    assert!(!store.is_visible("demo_2"));
    assert!(!store.is_visible("demo_3"));
    assert_eq!(bridge.applied_mutations().len(), 3);
    assert!(store.take_notices().is_empty());

    // The remote agrees once refreshed.
    store.refresh(bridge.fetch_inbox(ME).await.unwrap());
    assert_eq!(store.visible_len(), 3);
}

#[tokio::test]
async fn test_failed_mutation_rolls_back() {
    let bridge = Arc::new(DemoBridge::new());
    bridge.fail_mutations_for("demo_5");
    let (mut store, mut rx) = setup(Arc::clone(&bridge)).await;

    store.apply_bulk(
        &["demo_5".to_string(), "demo_6".to_string()],
        MutationKind::Trash,
    );
    assert!(!store.is_visible("demo_5"));
    assert!(!store.is_visible("demo_6"));

    settle_all(&mut store, &mut rx, 2).await;

    assert!(store.is_visible("demo_5"));
    assert!(!store.is_visible("demo_6"));
    let notices = store.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].item_id, "demo_5");
    assert_eq!(
        bridge.applied_mutations(),
        vec![("demo_6".to_string(), RemoteAction::Trash)]
    );
}

#[tokio::test]
async fn test_refresh_discards_in_flight_completions() {
    let bridge = Arc::new(DemoBridge::new());
    let (mut store, mut rx) = setup(Arc::clone(&bridge)).await;

    bridge.fail_mutations_for("demo_4");
    store.apply_single("demo_4", MutationKind::Done);
    store.refresh(bridge.fetch_inbox(ME).await.unwrap());

    settle_all(&mut store, &mut rx, 1).await;
    assert!(store.is_visible("demo_4"));
    assert!(store.take_notices().is_empty());
}

#[tokio::test]
async fn test_thread_conversation_and_reply() {
    let bridge = DemoBridge::new();
    let thread = bridge.fetch_thread("demo_4", ME).await.unwrap();

    let conversation = Conversation::from_thread(&thread);
    assert_eq!(conversation.message_count, 2);
    assert_eq!(
        conversation.entries[1].body,
        "Numbers attached, happy to walk through them."
    );

    let mut composer = ReplyComposer::new(thread, ME);
    assert_eq!(composer.mode(), ReplyMode::ReplyAll);
    assert_eq!(
        composer.recipients().to,
        vec!["dana@northwind.io", "finance@northwind.io"]
    );
    assert_eq!(composer.recipients().cc, vec!["ops@example.com"]);

    composer.toggle_reply_all();
    assert_eq!(composer.recipients().to, vec!["dana@northwind.io"]);
    assert!(composer.recipients().cc.is_empty());

    let draft = composer.draft("Looks good, thanks.", Vec::new());
    bridge.send_reply(ME, &draft).await.unwrap();
    assert_eq!(bridge.sent_replies()[0].to, "dana@northwind.io");
    assert_eq!(bridge.sent_replies()[0].subject, "Re: Quote for the Q4 rollout");
}
