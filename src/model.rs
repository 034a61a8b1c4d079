use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address;

/// One decoded message of a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Raw From header, e.g. `Alice <alice@example.com>`
    pub from: String,
    /// Raw To header (free text, may hold several addresses)
    pub to: String,
    /// Raw Cc header
    pub cc: Option<String>,
    pub date: DateTime<Utc>,
    pub subject: String,
    pub body_text: String,
    pub body_markup: Option<String>,
    /// True when `from` is the active account's own address
    pub is_self: bool,
}

impl Message {
    /// The case-folded address carried by the From header
    pub fn from_address(&self) -> String {
        address::extract_email(&self.from)
    }

    /// Re-derives `is_self` against an account identity.
    fn with_identity(mut self, self_address: &str) -> Self {
        self.is_self = address::same_address(&self.from_address(), self_address);
        self
    }
}

/// Builder for creating Message instances
#[derive(Default)]
pub struct MessageBuilder {
    id: String,
    from: String,
    to: String,
    cc: Option<String>,
    date: Option<DateTime<Utc>>,
    subject: String,
    body_text: String,
    body_markup: Option<String>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc = Some(cc.into());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body_text(mut self, body: impl Into<String>) -> Self {
        self.body_text = body.into();
        self
    }

    pub fn body_markup(mut self, markup: impl Into<String>) -> Self {
        self.body_markup = Some(markup.into());
        self
    }

    /// Builds the message; `is_self` is filled in when the message joins a [`Thread`].
    pub fn build(self) -> Message {
        Message {
            id: self.id,
            from: self.from,
            to: self.to,
            cc: self.cc,
            date: self.date.unwrap_or_else(Utc::now),
            subject: self.subject,
            body_text: self.body_text,
            body_markup: self.body_markup,
            is_self: false,
        }
    }
}

/// A conversation: messages in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<Message>,
    pub message_count: usize,
}

impl Thread {
    /// Builds a thread for the given account identity. Messages are sorted by
    /// date (stable, so equal timestamps keep fetch order) and `is_self` is
    /// derived for each one.
    pub fn new(id: impl Into<String>, messages: Vec<Message>, self_address: &str) -> Self {
        let mut messages: Vec<Message> = messages
            .into_iter()
            .map(|m| m.with_identity(self_address))
            .collect();
        messages.sort_by_key(|m| m.date);

        Self {
            id: id.into(),
            message_count: messages.len(),
            messages,
        }
    }

    /// The most recent message, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Subject of the conversation, taken from the first message that has one
    pub fn subject(&self) -> &str {
        self.messages
            .iter()
            .map(|m| m.subject.as_str())
            .find(|s| !s.trim().is_empty())
            .unwrap_or("")
    }
}

/// A triage unit shown in the inbox list (an email thread)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub snippet: String,
}

impl Item {
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            received_at,
            read: false,
            snippet: String::new(),
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn mark_read(mut self) -> Self {
        self.read = true;
        self
    }

    /// The case-folded sender domain, if the sender carries an address
    pub fn sender_domain(&self) -> Option<String> {
        address::sender_domain(&self.sender)
    }
}
