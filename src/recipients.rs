use serde::{Deserialize, Serialize};

use crate::address::{normalize, parse_addresses, same_address};
use crate::model::Thread;

/// Whether a reply goes to the sender only or to everyone on the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyMode {
    Reply,
    ReplyAll,
}

impl ReplyMode {
    pub fn toggled(self) -> Self {
        match self {
            ReplyMode::Reply => ReplyMode::ReplyAll,
            ReplyMode::ReplyAll => ReplyMode::Reply,
        }
    }
}

/// Derived recipients of a reply.
///
/// Addresses are case-folded. An address is in at most one of the three
/// fields and the account's own address is in none of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSet {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub is_reply_all: bool,
}

impl RecipientSet {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.fields().any(|a| same_address(a, address))
    }

    /// `to` joined the way the transport expects
    pub fn to_header(&self) -> String {
        self.to.join(", ")
    }

    /// `None` when there is nothing to put in the header
    pub fn cc_header(&self) -> Option<String> {
        (!self.cc.is_empty()).then(|| self.cc.join(", "))
    }

    pub fn bcc_header(&self) -> Option<String> {
        (!self.bcc.is_empty()).then(|| self.bcc.join(", "))
    }

    fn fields(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}

/// Fills the fields of a [`RecipientSet`] in order, skipping the account's
/// own address and anything an earlier field already took.
struct FieldBuilder {
    self_address: String,
    taken: Vec<String>,
}

impl FieldBuilder {
    fn new(self_address: &str) -> Self {
        Self {
            self_address: normalize(self_address),
            taken: Vec::new(),
        }
    }

    fn take(&mut self, candidates: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut field = Vec::new();
        for address in candidates {
            if address.is_empty()
                || address == self.self_address
                || self.taken.contains(&address)
            {
                continue;
            }
            self.taken.push(address.clone());
            field.push(address);
        }
        field
    }
}

/// Default mode for a thread: reply-all when the last message went to more
/// than one distinct address across To and Cc.
pub fn default_mode(thread: &Thread) -> ReplyMode {
    let Some(last) = thread.last() else {
        return ReplyMode::Reply;
    };
    let mut distinct = parse_addresses(&last.to);
    for address in parse_addresses(last.cc.as_deref().unwrap_or("")) {
        if !distinct.contains(&address) {
            distinct.push(address);
        }
    }
    if distinct.len() > 1 {
        ReplyMode::ReplyAll
    } else {
        ReplyMode::Reply
    }
}

/// Recipients for replying to `thread` in its default mode.
pub fn resolve(thread: &Thread, self_address: &str) -> RecipientSet {
    resolve_with(thread, self_address, default_mode(thread))
}

/// Recipients for replying to `thread` in the given mode.
///
/// The result depends only on the thread's last message and the account
/// address, so toggling the mode and resolving again always yields the same
/// set for the same mode.
pub fn resolve_with(thread: &Thread, self_address: &str, mode: ReplyMode) -> RecipientSet {
    let is_reply_all = mode == ReplyMode::ReplyAll;
    let Some(last) = thread.last() else {
        return RecipientSet {
            is_reply_all,
            ..RecipientSet::default()
        };
    };

    let original_to = parse_addresses(&last.to);
    let original_cc = parse_addresses(last.cc.as_deref().unwrap_or(""));
    let sender = last.from_address();
    let from_self = last.is_self || same_address(&sender, self_address);

    let (to, cc) = if from_self {
        // Waiting on a reply: address the original recipients again,
        // whatever the mode.
        let mut fields = FieldBuilder::new(self_address);
        let to = fields.take(original_to);
        let cc = fields.take(original_cc);
        (to, cc)
    } else {
        let sender_only = parse_addresses(&sender);
        let mut fields = FieldBuilder::new(self_address);
        let mut to = fields.take(sender_only);
        let cc = if is_reply_all {
            to.extend(fields.take(original_to));
            fields.take(original_cc)
        } else {
            Vec::new()
        };
        (to, cc)
    };

    RecipientSet {
        to,
        cc,
        bcc: Vec::new(),
        is_reply_all,
    }
}
