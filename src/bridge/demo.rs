//! In-memory bridge with a realistic demo inbox, for screenshots, offline
//! use and tests. Individual items can be told to fail their mutations.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use tracing::debug;

use super::{Bridge, MutationMetadata, RemoteAction, ReplyDraft};
use crate::error::{BridgeError, Result};
use crate::model::{Item, Message, MessageBuilder, Thread};

#[derive(Debug, Default)]
struct DemoState {
    inbox: Vec<Item>,
    threads: HashMap<String, Vec<Message>>,
    failing: HashSet<String>,
    mutations: Vec<(String, RemoteAction)>,
    sent: Vec<ReplyDraft>,
}

/// A bridge backed by memory only
#[derive(Debug, Default)]
pub struct DemoBridge {
    state: Mutex<DemoState>,
    latency: Option<StdDuration>,
}

impl DemoBridge {
    /// An empty inbox
    pub fn empty() -> Self {
        Self::default()
    }

    /// The demo inbox, timestamps relative to now
    pub fn new() -> Self {
        let bridge = Self::empty();
        for (item, messages) in demo_threads(Utc::now()) {
            bridge.insert(item, messages);
        }
        bridge
    }

    /// Delays every call, so optimistic updates are visible in the UI
    pub fn with_latency(mut self, latency: StdDuration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, item: Item, messages: Vec<Message>) {
        let mut state = self.lock();
        state.threads.insert(item.id.clone(), messages);
        state.inbox.push(item);
    }

    /// Makes every mutation of `item_id` fail until cleared
    pub fn fail_mutations_for(&self, item_id: &str) {
        self.lock().failing.insert(item_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Mutations that succeeded, in order
    pub fn applied_mutations(&self) -> Vec<(String, RemoteAction)> {
        self.lock().mutations.clone()
    }

    pub fn sent_replies(&self) -> Vec<ReplyDraft> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DemoState> {
        // A poisoned lock only means a test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Bridge for DemoBridge {
    async fn fetch_inbox(&self, _account: &str) -> Result<Vec<Item>> {
        self.delay().await;
        let mut items = self.lock().inbox.clone();
        items.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(items)
    }

    async fn fetch_thread(&self, item_id: &str, account: &str) -> Result<Thread> {
        self.delay().await;
        let messages = self
            .lock()
            .threads
            .get(item_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(item_id.to_string()))?;
        Ok(Thread::new(item_id, messages, account))
    }

    async fn mutate_item(
        &self,
        item_id: &str,
        _account: &str,
        action: RemoteAction,
        metadata: Option<MutationMetadata>,
    ) -> Result<()> {
        self.delay().await;
        let mut state = self.lock();
        if state.failing.contains(item_id) {
            return Err(BridgeError::transport(
                "mutate",
                format!("demo failure for {item_id}"),
            ));
        }
        let before = state.inbox.len();
        state.inbox.retain(|item| item.id != item_id);
        if state.inbox.len() == before {
            return Err(BridgeError::NotFound(item_id.to_string()));
        }
        debug!(item = item_id, %action, ?metadata, "demo mutation applied");
        state.mutations.push((item_id.to_string(), action));
        Ok(())
    }

    async fn send_reply(&self, _account: &str, draft: &ReplyDraft) -> Result<()> {
        self.delay().await;
        if draft.to.trim().is_empty() {
            return Err(BridgeError::rejected("send", "no recipients"));
        }
        self.lock().sent.push(draft.clone());
        Ok(())
    }
}

const DEMO_ACCOUNT: &str = "Demo User <me@example.com>";

fn demo_item(id: &str, sender: &str, subject: &str, at: DateTime<Utc>, snippet: &str) -> Item {
    Item::new(id, sender, subject, at).with_snippet(snippet)
}

fn demo_threads(now: DateTime<Utc>) -> Vec<(Item, Vec<Message>)> {
    let yesterday = now - Duration::days(1);

    vec![
        (
            demo_item(
                "demo_1",
                "Acme Billing <billing@acme.com>",
                "Invoice #4821 is ready",
                now - Duration::hours(2),
                "Your invoice for October is attached...",
            ),
            vec![
                MessageBuilder::new()
                    .id("demo_1_m1")
                    .from("Acme Billing <billing@acme.com>")
                    .to(DEMO_ACCOUNT)
                    .subject("Invoice #4821 is ready")
                    .body_text("Hi,\n\nYour invoice for October is attached.\n\n--\nAcme Billing")
                    .date(now - Duration::hours(2))
                    .build(),
            ],
        ),
        (
            demo_item(
                "demo_2",
                "Acme Support <support@acme.com>",
                "Ticket #991 resolved",
                now - Duration::hours(5),
                "We have closed your ticket...",
            ),
            vec![
                MessageBuilder::new()
                    .id("demo_2_m1")
                    .from("Acme Support <support@acme.com>")
                    .to(DEMO_ACCOUNT)
                    .subject("Ticket #991 resolved")
                    .body_markup(
                        "<div>We have closed your ticket.</div>\
                         <div class=\"gmail_quote\"><div>On Mon, you wrote:</div>\
                         <blockquote>The export is broken</blockquote></div>",
                    )
                    .date(now - Duration::hours(5))
                    .build(),
            ],
        ),
        (
            demo_item(
                "demo_3",
                "Acme News <news@acme.com>",
                "What's new in Acme 4.2",
                yesterday,
                "Faster exports, a new dashboard and more...",
            )
            .mark_read(),
            vec![
                MessageBuilder::new()
                    .id("demo_3_m1")
                    .from("Acme News <news@acme.com>")
                    .to(DEMO_ACCOUNT)
                    .subject("What's new in Acme 4.2")
                    .body_text("Faster exports, a new dashboard and more.")
                    .date(yesterday)
                    .build(),
            ],
        ),
        (
            demo_item(
                "demo_4",
                "Dana Vendor <dana@northwind.io>",
                "Re: Quote for the Q4 rollout",
                now - Duration::hours(1),
                "Numbers attached, happy to walk through them...",
            ),
            vec![
                MessageBuilder::new()
                    .id("demo_4_m1")
                    .from(DEMO_ACCOUNT)
                    .to("Dana Vendor <dana@northwind.io>")
                    .cc("Ops <ops@example.com>")
                    .subject("Quote for the Q4 rollout")
                    .body_text("Hi Dana,\n\nCould you send over a quote for the Q4 rollout?\n\nThanks")
                    .date(now - Duration::days(2))
                    .build(),
                MessageBuilder::new()
                    .id("demo_4_m2")
                    .from("Dana Vendor <dana@northwind.io>")
                    .to("me@example.com, Finance <finance@northwind.io>")
                    .cc("ops@example.com")
                    .subject("Re: Quote for the Q4 rollout")
                    .body_text(
                        "Numbers attached, happy to walk through them.\n\n\
                         On Tue, Demo User <me@example.com> wrote:\n\
                         > Hi Dana,\n\
                         >\n\
                         > Could you send over a quote for the Q4 rollout?",
                    )
                    .date(now - Duration::hours(1))
                    .build(),
            ],
        ),
        (
            demo_item(
                "demo_5",
                "Alice Chen <alice.chen@gmail.com>",
                "Coffee tomorrow?",
                now - Duration::hours(3),
                "How about the new place on Market St?",
            ),
            vec![
                MessageBuilder::new()
                    .id("demo_5_m1")
                    .from("Alice Chen <alice.chen@gmail.com>")
                    .to(DEMO_ACCOUNT)
                    .subject("Coffee tomorrow?")
                    .body_text("How about the new place on Market St? I heard they have great espresso.")
                    .date(now - Duration::hours(3))
                    .build(),
            ],
        ),
        (
            demo_item(
                "demo_6",
                "Bob Ortiz <bob@globex.com>",
                "Fwd: Contract draft",
                now - Duration::days(3),
                "See below, can you take a look?",
            )
            .mark_read(),
            vec![
                MessageBuilder::new()
                    .id("demo_6_m1")
                    .from("Bob Ortiz <bob@globex.com>")
                    .to(DEMO_ACCOUNT)
                    .subject("Fwd: Contract draft")
                    .body_text(
                        "See below, can you take a look?\n\n\
                         ---------- Forwarded message ---------\n\
                         From: Legal <legal@globex.com>\n\
                         Subject: Contract draft\n\n\
                         Draft v3 attached.",
                    )
                    .date(now - Duration::days(3))
                    .build(),
            ],
        ),
    ]
}
