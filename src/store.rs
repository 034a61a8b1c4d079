//! Locally-optimistic triage state.
//!
//! [`MutationStore`] owns the list of inbox items and decides which of them
//! are visible. Triage actions hide items immediately and dispatch the remote
//! call; [`MutationStore::settle`] reconciles each completion, rolling the
//! item back into view when its call failed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use tracing::{debug, info, warn};

use crate::bridge::{MutationMetadata, RemoteAction};
use crate::dispatch::{Completion, Dispatch, MutationRequest, Ticket};
use crate::error::BridgeError;
use crate::model::Item;
use crate::similar::SimilarItemFinder;

/// Maximum number of undelivered notices kept
const MAX_NOTICES: usize = 20;

/// A triage action as the user sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Archive,
    Trash,
    Done,
    /// Hide from the inbox without further handling
    Ignore,
    /// Turned into a deal; leaves the inbox as done
    Deal,
}

impl MutationKind {
    pub fn remote_action(self) -> RemoteAction {
        match self {
            MutationKind::Archive | MutationKind::Ignore => RemoteAction::Archive,
            MutationKind::Trash => RemoteAction::Trash,
            MutationKind::Done | MutationKind::Deal => RemoteAction::Done,
        }
    }

    /// Whether a single action of this kind may suggest archiving similar items
    pub fn offers_similar(self) -> bool {
        matches!(self, MutationKind::Archive | MutationKind::Ignore)
    }

    pub fn verb(self) -> &'static str {
        match self {
            MutationKind::Archive => "archive",
            MutationKind::Trash => "delete",
            MutationKind::Done => "mark done",
            MutationKind::Ignore => "ignore",
            MutationKind::Deal => "mark as deal",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Bookkeeping for a mutation whose remote call has not resolved yet
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub ticket: Ticket,
    pub item_id: String,
    pub kind: MutationKind,
    /// Whether the item was already hidden when this mutation was applied
    pub prior_hidden: bool,
}

/// Suggestion to apply the same action to other items from one domain
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityPrompt {
    pub domain: String,
    pub kind: MutationKind,
    pub candidates: Vec<Item>,
}

/// A failed remote call that was rolled back
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub item_id: String,
    pub kind: MutationKind,
    pub error: BridgeError,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not {}: {}", self.kind, self.error)
    }
}

/// The single owner of triage state.
///
/// Presentation code reads through the accessors and changes state only
/// through [`apply_single`](Self::apply_single),
/// [`apply_bulk`](Self::apply_bulk) and [`refresh`](Self::refresh).
pub struct MutationStore<D> {
    account: String,
    items: Vec<Item>,
    ignored: HashSet<String>,
    /// Unresolved mutations per item, oldest first
    pending: HashMap<String, Vec<PendingMutation>>,
    /// Items with at least one acknowledged mutation since the last refresh
    confirmed: HashSet<String>,
    next_ticket: u64,
    open_detail: Option<String>,
    prompt: Option<SimilarityPrompt>,
    notices: VecDeque<Notice>,
    finder: SimilarItemFinder,
    dispatcher: D,
}

impl<D: Dispatch> MutationStore<D> {
    pub fn new(account: impl Into<String>, dispatcher: D) -> Self {
        Self {
            account: account.into(),
            items: Vec::new(),
            ignored: HashSet::new(),
            pending: HashMap::new(),
            confirmed: HashSet::new(),
            next_ticket: 1,
            open_detail: None,
            prompt: None,
            notices: VecDeque::new(),
            finder: SimilarItemFinder::new(),
            dispatcher,
        }
    }

    pub fn with_finder(mut self, finder: SimilarItemFinder) -> Self {
        self.finder = finder;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Items currently shown, in fetch order
    pub fn visible_items(&self) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|item| !self.ignored.contains(&item.id))
            .collect()
    }

    pub fn visible_len(&self) -> usize {
        self.items
            .iter()
            .filter(|item| !self.ignored.contains(&item.id))
            .count()
    }

    pub fn is_visible(&self, item_id: &str) -> bool {
        self.items.iter().any(|item| item.id == item_id) && !self.ignored.contains(item_id)
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn ignored(&self) -> &HashSet<String> {
        &self.ignored
    }

    /// Number of remote calls still in flight
    pub fn pending_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn pending_for(&self, item_id: &str) -> &[PendingMutation] {
        self.pending.get(item_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Item whose detail view is open, if any
    pub fn open_detail(&self) -> Option<&str> {
        self.open_detail.as_deref()
    }

    pub fn open(&mut self, item_id: &str) {
        self.open_detail = Some(item_id.to_string());
    }

    pub fn close_detail(&mut self) {
        self.open_detail = None;
    }

    pub fn prompt(&self) -> Option<&SimilarityPrompt> {
        self.prompt.as_ref()
    }

    pub fn dismiss_prompt(&mut self) -> Option<SimilarityPrompt> {
        self.prompt.take()
    }

    /// Applies the prompt's action to its candidates that are still visible.
    pub fn accept_prompt(&mut self) -> Vec<Ticket> {
        let Some(prompt) = self.prompt.take() else {
            return Vec::new();
        };
        let ids: Vec<String> = prompt
            .candidates
            .iter()
            .filter(|c| self.is_visible(&c.id))
            .map(|c| c.id.clone())
            .collect();
        info!(domain = %prompt.domain, count = ids.len(), "applying to similar items");
        self.apply_bulk(&ids, prompt.kind)
    }

    /// Failure notices not yet shown to the user, oldest first
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Marks an item read locally; nothing is sent to the remote.
    pub fn mark_read(&mut self, item_id: &str) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == item_id) {
            item.read = true;
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Hides one item, dispatches its remote call, and for archive-like
    /// actions offers the other items from the same sender domain.
    pub fn apply_single(&mut self, item_id: &str, kind: MutationKind) -> Option<Ticket> {
        let ticket = self.apply(&[item_id.to_string()], kind).into_iter().next()?;

        if kind.offers_similar()
            && let Some(item) = self.item(item_id).cloned()
        {
            self.offer_similar(&item, kind);
        }
        Some(ticket)
    }

    /// Hides every item at once, then dispatches one remote call per item.
    pub fn apply_bulk(&mut self, item_ids: &[String], kind: MutationKind) -> Vec<Ticket> {
        self.apply(item_ids, kind)
    }

    /// Reconciles a remote outcome. Unknown tickets (already settled, or
    /// discarded by a refresh) are ignored.
    pub fn settle(&mut self, completion: Completion) {
        let Some(stack) = self.pending.get_mut(&completion.item_id) else {
            debug!(ticket = completion.ticket.0, "completion for discarded mutation");
            return;
        };
        let Some(pos) = stack.iter().position(|p| p.ticket == completion.ticket) else {
            debug!(ticket = completion.ticket.0, "completion for discarded mutation");
            return;
        };

        let settled = stack.remove(pos);
        let still_pending = !stack.is_empty();
        if !still_pending {
            self.pending.remove(&completion.item_id);
        }

        match completion.outcome {
            Ok(()) => {
                debug!(ticket = settled.ticket.0, item = %settled.item_id, "mutation confirmed");
                self.confirmed.insert(settled.item_id);
            }
            Err(error) => {
                let restore = !still_pending && !self.confirmed.contains(&settled.item_id);
                warn!(
                    ticket = settled.ticket.0,
                    item = %settled.item_id,
                    kind = %settled.kind,
                    prior_hidden = settled.prior_hidden,
                    restore,
                    %error,
                    "mutation failed"
                );
                if restore {
                    self.ignored.remove(&settled.item_id);
                }
                self.push_notice(Notice {
                    item_id: settled.item_id,
                    kind: settled.kind,
                    error,
                });
            }
        }
    }

    /// Replaces the item list with a fresh fetch and forgets all optimistic
    /// state. Completions of calls still in flight become no-ops.
    pub fn refresh(&mut self, items: Vec<Item>) {
        info!(
            items = items.len(),
            discarded = self.pending_count(),
            "refreshing inbox"
        );
        self.items = items;
        self.ignored.clear();
        self.pending.clear();
        self.confirmed.clear();
        self.prompt = None;
        if let Some(open) = &self.open_detail
            && !self.items.iter().any(|item| &item.id == open)
        {
            self.open_detail = None;
        }
    }

    fn apply(&mut self, item_ids: &[String], kind: MutationKind) -> Vec<Ticket> {
        let mut requests = Vec::with_capacity(item_ids.len());

        // Hide everything first so the list changes in one step.
        for item_id in item_ids {
            let Some(item) = self.item(item_id) else {
                warn!(item = %item_id, "mutation for unknown item");
                continue;
            };
            let metadata = MutationMetadata {
                sender: item.sender.clone(),
                subject: item.subject.clone(),
            };

            let ticket = Ticket(self.next_ticket);
            self.next_ticket += 1;

            let prior_hidden = !self.ignored.insert(item_id.clone());
            self.pending
                .entry(item_id.clone())
                .or_default()
                .push(PendingMutation {
                    ticket,
                    item_id: item_id.clone(),
                    kind,
                    prior_hidden,
                });
            if self.open_detail.as_deref() == Some(item_id.as_str()) {
                self.open_detail = None;
            }

            requests.push(MutationRequest {
                ticket,
                item_id: item_id.clone(),
                account: self.account.clone(),
                action: kind.remote_action(),
                metadata: Some(metadata),
            });
        }

        if let Some(prompt) = self.prompt.as_mut() {
            prompt.candidates.retain(|c| !self.ignored.contains(&c.id));
            if prompt.candidates.is_empty() {
                self.prompt = None;
            }
        }

        info!(kind = %kind, count = requests.len(), "applied optimistically");
        requests
            .into_iter()
            .map(|request| {
                let ticket = request.ticket;
                self.dispatcher.dispatch(request);
                ticket
            })
            .collect()
    }

    fn offer_similar(&mut self, item: &Item, kind: MutationKind) {
        let visible: Vec<Item> = self.visible_items().into_iter().cloned().collect();
        let candidates = self.finder.find_similar(item, &visible, &self.ignored);
        let Some(domain) = item.sender_domain() else {
            return;
        };
        if candidates.is_empty() {
            return;
        }
        debug!(%domain, count = candidates.len(), "offering similar items");
        self.prompt = Some(SimilarityPrompt {
            domain,
            kind,
            candidates,
        });
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() == MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }
}
