//! Display-ready conversations and reply drafts built from a raw thread.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::address;
use crate::bridge::{Attachment, ReplyDraft};
use crate::model::{Message, Thread};
use crate::quote;
use crate::recipients::{self, RecipientSet, ReplyMode};

/// One message with its quoted chain removed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub message_id: String,
    pub sender: String,
    pub date: DateTime<Utc>,
    pub is_self: bool,
    /// Newly authored text only
    pub body: String,
    /// Sanitized markup with the quoted chain removed, when the message had markup
    pub markup: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub thread_id: String,
    pub subject: String,
    pub message_count: usize,
    pub entries: Vec<ConversationEntry>,
}

impl Conversation {
    pub fn from_thread(thread: &Thread) -> Self {
        Self {
            thread_id: thread.id.clone(),
            subject: thread.subject().to_string(),
            message_count: thread.message_count,
            entries: thread.messages.iter().map(entry_for).collect(),
        }
    }
}

fn entry_for(message: &Message) -> ConversationEntry {
    let markup = message.body_markup.as_deref().map(quote::strip_markup);

    // Markup-only messages are flattened and then stripped like plain text,
    // which catches quote styles the markup signatures miss.
    let body = if message.body_text.trim().is_empty() {
        markup
            .as_deref()
            .map(|m| quote::strip(&quote::markup_to_text(m)))
            .unwrap_or_default()
    } else {
        quote::strip(&message.body_text)
    };

    ConversationEntry {
        message_id: message.id.clone(),
        sender: address::display_name(&message.from),
        date: message.date,
        is_self: message.is_self,
        body,
        markup,
    }
}

/// Prefilled reply state for a thread.
///
/// Toggling between Reply and Reply-All re-derives the recipients from the
/// thread, so anything edited by hand beforehand is replaced.
#[derive(Debug, Clone)]
pub struct ReplyComposer {
    thread: Thread,
    self_address: String,
    mode: ReplyMode,
    recipients: RecipientSet,
}

impl ReplyComposer {
    pub fn new(thread: Thread, self_address: impl Into<String>) -> Self {
        let self_address = self_address.into();
        let mode = recipients::default_mode(&thread);
        let recipients = recipients::resolve_with(&thread, &self_address, mode);
        Self {
            thread,
            self_address,
            mode,
            recipients,
        }
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    pub fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }

    pub fn toggle_reply_all(&mut self) {
        self.set_mode(self.mode.toggled());
    }

    pub fn set_mode(&mut self, mode: ReplyMode) {
        self.mode = mode;
        self.recipients = recipients::resolve_with(&self.thread, &self.self_address, mode);
    }

    /// Adds a blind-copy address. Ignored if it is the account itself or
    /// already a recipient.
    pub fn add_bcc(&mut self, address: &str) {
        let address = address::normalize(address);
        if address.is_empty()
            || address::same_address(&address, &self.self_address)
            || self.recipients.contains(&address)
        {
            return;
        }
        self.recipients.bcc.push(address);
    }

    pub fn subject(&self) -> String {
        reply_subject(self.thread.subject())
    }

    pub fn draft(&self, body: impl Into<String>, attachments: Vec<Attachment>) -> ReplyDraft {
        ReplyDraft {
            to: self.recipients.to_header(),
            cc: self.recipients.cc_header(),
            bcc: self.recipients.bcc_header(),
            subject: self.subject(),
            body: body.into(),
            thread_id: self.thread.id.clone(),
            attachments,
        }
    }
}

/// Prefixes `Re: ` unless the subject already carries a reply prefix.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("re:") || lower.starts_with("aw:") {
        trimmed.to_string()
    } else if trimmed.is_empty() {
        "Re:".to_string()
    } else {
        format!("Re: {trimmed}")
    }
}
