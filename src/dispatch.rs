//! Fire-and-forget delivery of remote mutations.
//!
//! The store hands each mutation to a [`Dispatch`] implementation and returns
//! immediately. The outcome comes back later as a [`Completion`] which the
//! owner of the store feeds into `MutationStore::settle`.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::bridge::{Bridge, MutationMetadata, RemoteAction};
use crate::error::BridgeError;

/// Identifies one dispatched mutation. Unique and increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// A remote mutation ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub ticket: Ticket,
    pub item_id: String,
    pub account: String,
    pub action: RemoteAction,
    pub metadata: Option<MutationMetadata>,
}

/// The settled outcome of one [`MutationRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: Ticket,
    pub item_id: String,
    pub outcome: Result<(), BridgeError>,
}

impl Completion {
    pub fn succeeded(request: &MutationRequest) -> Self {
        Self {
            ticket: request.ticket,
            item_id: request.item_id.clone(),
            outcome: Ok(()),
        }
    }

    pub fn failed(request: &MutationRequest, error: BridgeError) -> Self {
        Self {
            ticket: request.ticket,
            item_id: request.item_id.clone(),
            outcome: Err(error),
        }
    }
}

/// Starts a remote mutation without waiting for it.
pub trait Dispatch {
    fn dispatch(&mut self, request: MutationRequest);
}

/// Spawns one runtime task per mutation and reports completions on a channel.
///
/// There is no concurrency cap and no ordering between completions; every
/// completion carries its own ticket and item id.
pub struct TaskDispatcher<B> {
    bridge: Arc<B>,
    completions: UnboundedSender<Completion>,
    runtime: Handle,
}

impl<B> TaskDispatcher<B>
where
    B: Bridge + 'static,
{
    /// Must be called from within a tokio runtime.
    pub fn new(bridge: Arc<B>, completions: UnboundedSender<Completion>) -> Self {
        Self::with_handle(bridge, completions, Handle::current())
    }

    pub fn with_handle(
        bridge: Arc<B>,
        completions: UnboundedSender<Completion>,
        runtime: Handle,
    ) -> Self {
        Self {
            bridge,
            completions,
            runtime,
        }
    }
}

impl<B> Dispatch for TaskDispatcher<B>
where
    B: Bridge + 'static,
{
    fn dispatch(&mut self, request: MutationRequest) {
        let bridge = Arc::clone(&self.bridge);
        let completions = self.completions.clone();

        self.runtime.spawn(async move {
            debug!(
                ticket = request.ticket.0,
                item = %request.item_id,
                action = %request.action,
                "dispatching mutation"
            );
            let outcome = bridge
                .mutate_item(
                    &request.item_id,
                    &request.account,
                    request.action,
                    request.metadata.clone(),
                )
                .await;

            let completion = match outcome {
                Ok(()) => Completion::succeeded(&request),
                Err(e) => Completion::failed(&request, e),
            };
            if completions.send(completion).is_err() {
                warn!(ticket = request.ticket.0, "completion receiver dropped");
            }
        });
    }
}

/// Keeps every request instead of sending it; settle them by hand.
#[derive(Debug, Default)]
pub struct QueuedDispatch {
    queued: Vec<MutationRequest>,
}

impl QueuedDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> &[MutationRequest] {
        &self.queued
    }

    /// Removes and returns everything dispatched so far
    pub fn drain(&mut self) -> Vec<MutationRequest> {
        std::mem::take(&mut self.queued)
    }
}

impl Dispatch for QueuedDispatch {
    fn dispatch(&mut self, request: MutationRequest) {
        self.queued.push(request);
    }
}
