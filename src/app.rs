use std::collections::HashSet;

use tracing::info;

use crate::bridge::ReplyDraft;
use crate::conversation::{Conversation, ReplyComposer};
use crate::dispatch::{Completion, Dispatch, Ticket};
use crate::model::{Item, Thread};
use crate::store::{MutationKind, MutationStore};

/// Lines moved by page up/down in the thread view
const SCROLL_PAGE: u16 = 10;

/// The current view state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum View {
    #[default]
    Inbox,
    Thread,
    Compose,
}

/// An opened thread: the stripped conversation plus its reply state
#[derive(Debug, Clone)]
pub struct ThreadView {
    pub item_id: String,
    pub conversation: Conversation,
    pub composer: ReplyComposer,
    pub scroll: u16,
}

/// The main application state
pub struct App<D> {
    pub store: MutationStore<D>,
    pub view: View,
    /// Cursor position in the visible item list
    pub selected: usize,
    /// Items marked for a bulk action
    marked: HashSet<String>,
    pub thread: Option<ThreadView>,
    pub draft_body: String,
    pub status: Option<String>,
    /// True while an inbox or thread fetch is outstanding
    pub loading: bool,
}

impl<D: Dispatch> App<D> {
    pub fn new(store: MutationStore<D>) -> Self {
        Self {
            store,
            view: View::default(),
            selected: 0,
            marked: HashSet::new(),
            thread: None,
            draft_body: String::new(),
            status: None,
            loading: false,
        }
    }

    /// Replaces the inbox with a fresh fetch
    pub fn set_items(&mut self, items: Vec<Item>) {
        self.store.refresh(items);
        self.marked.retain(|id| self.store.is_visible(id));
        if self.store.open_detail().is_none() && self.view != View::Inbox {
            self.thread = None;
            self.view = View::Inbox;
        }
        self.loading = false;
        self.clamp_selection();
    }

    /// Returns the item under the cursor
    pub fn current_item(&self) -> Option<&Item> {
        self.store.visible_items().get(self.selected).copied()
    }

    pub fn select_next(&mut self) {
        match self.view {
            View::Inbox => {
                if self.selected + 1 < self.store.visible_len() {
                    self.selected += 1;
                }
            }
            View::Thread => self.scroll_by(1),
            View::Compose => {}
        }
    }

    pub fn select_previous(&mut self) {
        match self.view {
            View::Inbox => self.selected = self.selected.saturating_sub(1),
            View::Thread => self.scroll_by(-1),
            View::Compose => {}
        }
    }

    pub fn select_first(&mut self) {
        match self.view {
            View::Inbox => self.selected = 0,
            View::Thread => {
                if let Some(thread) = &mut self.thread {
                    thread.scroll = 0;
                }
            }
            View::Compose => {}
        }
    }

    pub fn select_last(&mut self) {
        if self.view == View::Inbox {
            self.selected = self.store.visible_len().saturating_sub(1);
        }
    }

    pub fn page_down(&mut self) {
        self.scroll_by(SCROLL_PAGE as i32);
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(SCROLL_PAGE as i32));
    }

    fn scroll_by(&mut self, delta: i32) {
        if let Some(thread) = &mut self.thread {
            thread.scroll = (thread.scroll as i32 + delta).clamp(0, u16::MAX as i32) as u16;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.store.visible_len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Marks or unmarks the item under the cursor for a bulk action
    pub fn toggle_mark(&mut self) {
        let Some(id) = self.current_item().map(|item| item.id.clone()) else {
            return;
        };
        if !self.marked.remove(&id) {
            self.marked.insert(id);
        }
    }

    pub fn is_marked(&self, item_id: &str) -> bool {
        self.marked.contains(item_id)
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    pub fn clear_marks(&mut self) {
        self.marked.clear();
    }

    /// The id the next single action targets: the open thread, else the cursor
    fn target_id(&self) -> Option<String> {
        match self.view {
            View::Thread | View::Compose => self.thread.as_ref().map(|t| t.item_id.clone()),
            View::Inbox => self.current_item().map(|item| item.id.clone()),
        }
    }

    /// Applies `kind` to the open thread or the item under the cursor
    pub fn apply_to_current(&mut self, kind: MutationKind) -> Option<Ticket> {
        let id = self.target_id()?;
        let ticket = self.store.apply_single(&id, kind)?;
        info!(item = %id, %kind, "applied");
        self.marked.remove(&id);
        if self.view != View::Inbox {
            self.close_thread();
        }
        self.clamp_selection();
        self.status = None;
        Some(ticket)
    }

    /// Applies `kind` to every marked item, or to the cursor item when none
    /// are marked.
    pub fn apply_to_marked(&mut self, kind: MutationKind) -> Vec<Ticket> {
        if self.marked.is_empty() {
            return self.apply_to_current(kind).into_iter().collect();
        }

        // Keep list order so dispatch order matches what the user sees.
        let ids: Vec<String> = self
            .store
            .visible_items()
            .iter()
            .filter(|item| self.marked.contains(&item.id))
            .map(|item| item.id.clone())
            .collect();
        self.marked.clear();
        let tickets = self.store.apply_bulk(&ids, kind);
        info!(count = tickets.len(), %kind, "bulk applied");
        self.clamp_selection();
        self.status = Some(format!("{} {} item(s)", capitalize(kind.verb()), tickets.len()));
        tickets
    }

    pub fn accept_prompt(&mut self) -> Vec<Ticket> {
        let tickets = self.store.accept_prompt();
        self.clamp_selection();
        if !tickets.is_empty() {
            self.status = Some(format!("Applied to {} similar item(s)", tickets.len()));
        }
        tickets
    }

    pub fn dismiss_prompt(&mut self) {
        self.store.dismiss_prompt();
    }

    /// Feeds a remote outcome into the store and surfaces any failure
    pub fn settle(&mut self, completion: Completion) {
        self.store.settle(completion);
        if let Some(notice) = self.store.take_notices().pop() {
            self.status = Some(notice.to_string());
        }
        self.clamp_selection();
    }

    /// The id of the item whose thread should be fetched when opening
    pub fn thread_to_open(&self) -> Option<String> {
        (self.view == View::Inbox)
            .then(|| self.current_item().map(|item| item.id.clone()))
            .flatten()
    }

    /// Shows a fetched thread, unless the item left the inbox meanwhile.
    pub fn show_thread(&mut self, thread: Thread) {
        self.loading = false;
        if !self.store.is_visible(&thread.id) {
            return;
        }
        let item_id = thread.id.clone();
        let composer = ReplyComposer::new(thread.clone(), self.store.account());
        let conversation = Conversation::from_thread(&thread);

        self.store.mark_read(&item_id);
        self.store.open(&item_id);
        self.thread = Some(ThreadView {
            item_id,
            conversation,
            composer,
            scroll: 0,
        });
        self.view = View::Thread;
    }

    pub fn close_thread(&mut self) {
        self.store.close_detail();
        self.thread = None;
        self.draft_body.clear();
        self.view = View::Inbox;
    }

    pub fn toggle_reply_all(&mut self) {
        if let Some(thread) = &mut self.thread {
            thread.composer.toggle_reply_all();
        }
    }

    pub fn start_compose(&mut self) {
        if self.thread.is_some() {
            self.view = View::Compose;
        }
    }

    pub fn cancel_compose(&mut self) {
        self.draft_body.clear();
        if self.thread.is_some() {
            self.view = View::Thread;
        }
    }

    pub fn push_char(&mut self, c: char) {
        self.draft_body.push(c);
    }

    pub fn pop_char(&mut self) {
        self.draft_body.pop();
    }

    /// Builds the reply from the composer and the typed body.
    /// Returns None when nothing was typed or there are no recipients.
    pub fn take_draft(&mut self) -> Option<ReplyDraft> {
        let thread = self.thread.as_ref()?;
        if self.draft_body.trim().is_empty() {
            self.status = Some("Reply is empty".to_string());
            return None;
        }
        if thread.composer.recipients().is_empty() {
            self.status = Some("No recipients for this reply".to_string());
            return None;
        }
        let draft = thread
            .composer
            .draft(std::mem::take(&mut self.draft_body), Vec::new());
        self.view = View::Thread;
        Some(draft)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::QueuedDispatch;
    use crate::error::BridgeError;
    use crate::model::MessageBuilder;
    use chrono::{Duration, Utc};

    const ME: &str = "me@x.com";

    fn item(id: &str, sender: &str, minutes_ago: i64) -> Item {
        Item::new(id, sender, format!("Subject {id}"), Utc::now() - Duration::minutes(minutes_ago))
    }

    fn app() -> App<QueuedDispatch> {
        let mut app = App::new(MutationStore::new(ME, QueuedDispatch::new()));
        app.set_items(vec![
            item("a", "billing@acme.com", 1),
            item("b", "alice@gmail.com", 2),
            item("c", "news@acme.com", 3),
            item("d", "bob@globex.com", 4),
        ]);
        app
    }

    fn thread(id: &str) -> Thread {
        Thread::new(
            id,
            vec![
                MessageBuilder::new()
                    .id("m1")
                    .from("Billing <billing@acme.com>")
                    .to("me@x.com, ap@acme.com")
                    .subject("Invoice")
                    .body_text("Hello\n\nOn Mon, X wrote:\n> a\n> b\n> c")
                    .build(),
            ],
            ME,
        )
    }

    fn visible_ids<D: Dispatch>(app: &App<D>) -> Vec<String> {
        app.store
            .visible_items()
            .iter()
            .map(|i| i.id.clone())
            .collect()
    }

    #[test]
    fn test_app_default_state() {
        let app = app();
        assert_eq!(app.view, View::Inbox);
        assert_eq!(app.selected, 0);
        assert_eq!(app.current_item().unwrap().id, "a");
    }

    #[test]
    fn test_navigation_clamps() {
        let mut app = app();
        app.select_previous();
        assert_eq!(app.selected, 0);
        app.select_last();
        assert_eq!(app.selected, 3);
        app.select_next();
        assert_eq!(app.selected, 3);
        app.select_first();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_archive_offers_similar_and_accept_applies() {
        let mut app = app();
        app.apply_to_current(MutationKind::Archive).unwrap();
        assert_eq!(visible_ids(&app), vec!["b", "c", "d"]);

        let prompt = app.store.prompt().unwrap();
        assert_eq!(prompt.domain, "acme.com");

        let tickets = app.accept_prompt();
        assert_eq!(tickets.len(), 1);
        assert_eq!(visible_ids(&app), vec!["b", "d"]);
        assert!(app.store.prompt().is_none());
        assert_eq!(app.store.dispatcher().queued().len(), 2);
    }

    #[test]
    fn test_selection_clamped_after_removing_last() {
        let mut app = app();
        app.select_last();
        app.apply_to_current(MutationKind::Trash);
        assert_eq!(app.selected, 2);
        assert_eq!(app.current_item().unwrap().id, "c");
    }

    #[test]
    fn test_bulk_applies_marked_in_list_order() {
        let mut app = app();
        app.select_last();
        app.toggle_mark();
        app.select_first();
        app.toggle_mark();
        assert_eq!(app.marked_count(), 2);

        let tickets = app.apply_to_marked(MutationKind::Done);
        assert_eq!(tickets.len(), 2);
        assert_eq!(app.marked_count(), 0);
        assert_eq!(visible_ids(&app), vec!["b", "c"]);

        let ids: Vec<_> = app
            .store
            .dispatcher()
            .queued()
            .iter()
            .map(|r| r.item_id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert!(app.store.prompt().is_none());
    }

    #[test]
    fn test_bulk_without_marks_uses_cursor() {
        let mut app = app();
        app.select_next();
        assert_eq!(app.apply_to_marked(MutationKind::Trash).len(), 1);
        assert_eq!(visible_ids(&app), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_failure_restores_and_sets_status() {
        let mut app = app();
        app.apply_to_current(MutationKind::Trash);
        let request = app.store.dispatcher_mut().drain().remove(0);

        app.settle(Completion::failed(
            &request,
            BridgeError::transport("trash", "timeout"),
        ));
        assert_eq!(visible_ids(&app), vec!["a", "b", "c", "d"]);
        assert!(app.status.as_deref().unwrap().starts_with("Could not delete"));
    }

    #[test]
    fn test_show_thread_and_reply() {
        let mut app = app();
        assert_eq!(app.thread_to_open().as_deref(), Some("a"));
        app.show_thread(thread("a"));
        assert_eq!(app.view, View::Thread);
        assert_eq!(app.store.open_detail(), Some("a"));
        assert!(app.store.item("a").unwrap().read);

        let view = app.thread.as_ref().unwrap();
        assert_eq!(view.conversation.entries[0].body, "Hello");
        assert_eq!(
            view.composer.recipients().to,
            vec!["billing@acme.com", "ap@acme.com"]
        );

        app.start_compose();
        assert_eq!(app.view, View::Compose);
        assert!(app.take_draft().is_none());
        for c in "Paid, thanks".chars() {
            app.push_char(c);
        }
        let draft = app.take_draft().unwrap();
        assert_eq!(draft.body, "Paid, thanks");
        assert_eq!(draft.to, "billing@acme.com, ap@acme.com");
        assert_eq!(draft.subject, "Re: Invoice");
        assert_eq!(app.view, View::Thread);
        assert!(app.draft_body.is_empty());
    }

    #[test]
    fn test_toggle_reply_all_in_thread() {
        let mut app = app();
        app.show_thread(thread("a"));
        app.toggle_reply_all();
        let view = app.thread.as_ref().unwrap();
        assert_eq!(view.composer.recipients().to, vec!["billing@acme.com"]);
    }

    #[test]
    fn test_action_in_thread_view_returns_to_inbox() {
        let mut app = app();
        app.select_next();
        app.select_next();
        app.show_thread(thread("c"));
        app.apply_to_current(MutationKind::Archive);
        assert_eq!(app.view, View::Inbox);
        assert!(app.thread.is_none());
        assert!(app.store.open_detail().is_none());
        assert!(!app.store.is_visible("c"));
    }

    #[test]
    fn test_thread_for_hidden_item_is_not_shown() {
        let mut app = app();
        app.apply_to_current(MutationKind::Trash);
        app.show_thread(thread("a"));
        assert_eq!(app.view, View::Inbox);
        assert!(app.thread.is_none());
    }

    #[test]
    fn test_refresh_drops_vanished_thread_and_marks() {
        let mut app = app();
        app.toggle_mark();
        app.show_thread(thread("a"));
        app.set_items(vec![item("b", "alice@gmail.com", 2)]);
        assert_eq!(app.view, View::Inbox);
        assert!(app.thread.is_none());
        assert_eq!(app.marked_count(), 0);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("mark done"), "Mark done");
        assert_eq!(capitalize(""), "");
    }
}
