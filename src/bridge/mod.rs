//! Remote capabilities consumed by the triage core.
//!
//! The bridge is opaque to the rest of the crate: the store only ever sees
//! `mutate_item`, the front-end uses the fetch and send calls.

pub mod demo;
pub mod gmail;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

use crate::error::Result;
use crate::model::{Item, Thread};

/// Mutations the remote store understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteAction {
    Archive,
    Trash,
    Done,
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteAction::Archive => "archive",
            RemoteAction::Trash => "trash",
            RemoteAction::Done => "done",
        };
        f.write_str(name)
    }
}

/// Passed along with a mutation for downstream learning; not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationMetadata {
    pub sender: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// An outgoing reply, recipients already joined in header format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub body: String,
    pub thread_id: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Trait for remote operations - allows mocking in tests
#[cfg_attr(test, mockall::automock)]
pub trait Bridge: Send + Sync {
    /// Lists the items currently in the inbox
    fn fetch_inbox(&self, account: &str) -> impl Future<Output = Result<Vec<Item>>> + Send;

    /// Fetches the full thread behind an inbox item
    fn fetch_thread(
        &self,
        item_id: &str,
        account: &str,
    ) -> impl Future<Output = Result<Thread>> + Send;

    /// Applies a triage action to an item
    fn mutate_item(
        &self,
        item_id: &str,
        account: &str,
        action: RemoteAction,
        metadata: Option<MutationMetadata>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Sends a reply within an existing thread
    fn send_reply(
        &self,
        account: &str,
        draft: &ReplyDraft,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use chrono::Utc;

    #[test]
    fn test_remote_action_names() {
        assert_eq!(RemoteAction::Archive.to_string(), "archive");
        assert_eq!(
            serde_json::to_string(&RemoteAction::Trash).unwrap(),
            "\"trash\""
        );
    }

    #[tokio::test]
    async fn test_mock_bridge_fetch_inbox() {
        let mut mock = MockBridge::new();
        mock.expect_fetch_inbox()
            .with(mockall::predicate::eq("me@x.com"))
            .returning(|_| {
                Box::pin(async { Ok(vec![Item::new("1", "a@acme.com", "Hi", Utc::now())]) })
            });

        let items = mock.fetch_inbox("me@x.com").await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_mock_bridge_mutate_failure() {
        let mut mock = MockBridge::new();
        mock.expect_mutate_item()
            .with(
                mockall::predicate::eq("item9"),
                mockall::predicate::eq("me@x.com"),
                mockall::predicate::eq(RemoteAction::Archive),
                mockall::predicate::always(),
            )
            .returning(|_, _, _, _| {
                Box::pin(async { Err(BridgeError::transport("archive", "offline")) })
            });

        let result = mock
            .mutate_item("item9", "me@x.com", RemoteAction::Archive, None)
            .await;
        assert!(matches!(result, Err(BridgeError::Transport { .. })));
    }
}
