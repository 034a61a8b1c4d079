//! Gmail API bridge. Inbox items are Gmail threads.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, TimeZone, Utc};
use google_gmail1::Gmail;
use google_gmail1::api::{Message as GmailMessage, MessagePart, ModifyThreadRequest};
use hyper_rustls::HttpsConnector;
use mail_builder::MessageBuilder as MimeBuilder;
use mail_builder::headers::address::Address;
use hyper_util::client::legacy::connect::HttpConnector;
use tracing::{debug, info};
use yup_oauth2::{self as oauth2, authenticator::Authenticator};

use super::{Bridge, MutationMetadata, RemoteAction, ReplyDraft};
use crate::address::parse_addresses;
use crate::error::{BridgeError, Result};
use crate::model::{Item, Message, MessageBuilder, Thread};

const USER: &str = "me";
const INBOX_LABEL: &str = "INBOX";
const UNREAD_LABEL: &str = "UNREAD";
const INBOX_PAGE_SIZE: u32 = 100;

/// Creates an OAuth2 authenticator, caching tokens next to the config
pub async fn create_authenticator(
    client_secret: &Path,
    token_cache: &Path,
) -> AnyResult<Authenticator<HttpsConnector<HttpConnector>>> {
    if !client_secret.exists() {
        anyhow::bail!(
            "Client secret file not found at {:?}. \
             Download OAuth2 desktop credentials from Google Cloud Console \
             and save them there.",
            client_secret
        );
    }

    let secret = oauth2::read_application_secret(client_secret)
        .await
        .context("Failed to read client secret")?;

    oauth2::InstalledFlowAuthenticator::builder(
        secret,
        oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache)
    .build()
    .await
    .context("Failed to build authenticator")
}

/// Bridge backed by the Gmail REST API
pub struct GmailBridge {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailBridge {
    pub async fn connect(client_secret: &Path, token_cache: &Path) -> AnyResult<Self> {
        let auth = create_authenticator(client_secret, token_cache).await?;
        Self::new(auth)
    }

    pub fn new(auth: Authenticator<HttpsConnector<HttpConnector>>) -> AnyResult<Self> {
        let client = google_gmail1::hyper_util::client::legacy::Client::builder(
            google_gmail1::hyper_util::rt::TokioExecutor::new(),
        )
        .build(
            google_gmail1::hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .context("Failed to load native TLS roots")?
                .https_or_http()
                .enable_http1()
                .build(),
        );

        Ok(Self {
            hub: Gmail::new(client, auth),
        })
    }

    async fn modify_labels(&self, thread_id: &str, remove: &[&str]) -> Result<()> {
        let req = ModifyThreadRequest {
            remove_label_ids: Some(remove.iter().map(|l| l.to_string()).collect()),
            ..Default::default()
        };
        self.hub
            .users()
            .threads_modify(req, USER, thread_id)
            .doit()
            .await
            .map_err(|e| classify("modify", thread_id, e))?;
        Ok(())
    }
}

impl Bridge for GmailBridge {
    async fn fetch_inbox(&self, account: &str) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .hub
                .users()
                .threads_list(USER)
                .q("in:inbox")
                .max_results(INBOX_PAGE_SIZE);
            if let Some(token) = &page_token {
                request = request.page_token(token);
            }

            let (_, response) = request
                .doit()
                .await
                .map_err(|e| classify("list", account, e))?;

            for thread_ref in response.threads.unwrap_or_default() {
                let Some(thread_id) = thread_ref.id else {
                    continue;
                };
                let (_, thread) = self
                    .hub
                    .users()
                    .threads_get(USER, &thread_id)
                    .format("metadata")
                    .add_metadata_headers("From")
                    .add_metadata_headers("Subject")
                    .add_metadata_headers("Date")
                    .doit()
                    .await
                    .map_err(|e| classify("get", &thread_id, e))?;

                let messages = thread.messages.unwrap_or_default();
                if let Some(item) = item_from_messages(&thread_id, &messages) {
                    items.push(item);
                }
            }

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        info!(count = items.len(), "fetched inbox");
        Ok(items)
    }

    async fn fetch_thread(&self, item_id: &str, account: &str) -> Result<Thread> {
        let (_, thread) = self
            .hub
            .users()
            .threads_get(USER, item_id)
            .format("full")
            .doit()
            .await
            .map_err(|e| classify("get", item_id, e))?;

        let messages: Vec<Message> = thread
            .messages
            .unwrap_or_default()
            .iter()
            .map(message_from_gmail)
            .collect();
        debug!(thread = item_id, count = messages.len(), "fetched thread");
        Ok(Thread::new(item_id, messages, account))
    }

    async fn mutate_item(
        &self,
        item_id: &str,
        _account: &str,
        action: RemoteAction,
        metadata: Option<MutationMetadata>,
    ) -> Result<()> {
        debug!(thread = item_id, %action, ?metadata, "mutating thread");
        match action {
            RemoteAction::Archive => self.modify_labels(item_id, &[INBOX_LABEL]).await,
            RemoteAction::Done => {
                self.modify_labels(item_id, &[INBOX_LABEL, UNREAD_LABEL])
                    .await
            }
            RemoteAction::Trash => {
                self.hub
                    .users()
                    .threads_trash(USER, item_id)
                    .doit()
                    .await
                    .map_err(|e| classify("trash", item_id, e))?;
                Ok(())
            }
        }
    }

    async fn send_reply(&self, account: &str, draft: &ReplyDraft) -> Result<()> {
        let raw = build_raw_message(account, draft)?;
        let req = GmailMessage {
            thread_id: Some(draft.thread_id.clone()),
            ..Default::default()
        };

        self.hub
            .users()
            .messages_send(req, USER)
            .upload(
                Cursor::new(raw),
                "message/rfc822"
                    .parse()
                    .map_err(|e| BridgeError::transport("send", e))?,
            )
            .await
            .map_err(|e| classify("send", &draft.thread_id, e))?;

        info!(thread = %draft.thread_id, "reply sent");
        Ok(())
    }
}

/// Maps a Gmail client error onto the bridge taxonomy
fn classify(op: &'static str, target: &str, err: google_gmail1::Error) -> BridgeError {
    match err {
        google_gmail1::Error::MissingToken(e) => BridgeError::Auth(e.to_string()),
        google_gmail1::Error::Failure(response) if response.status().as_u16() == 404 => {
            BridgeError::NotFound(target.to_string())
        }
        google_gmail1::Error::Failure(response) => BridgeError::rejected(op, response.status()),
        google_gmail1::Error::BadRequest(body) => BridgeError::rejected(op, body),
        other => BridgeError::transport(op, other),
    }
}

/// Header value by case-insensitive name; empty when absent
fn header(part: Option<&MessagePart>, name: &str) -> String {
    part.and_then(|p| p.headers.as_ref())
        .and_then(|headers| {
            headers.iter().find_map(|h| match (&h.name, &h.value) {
                (Some(n), Some(v)) if n.eq_ignore_ascii_case(name) => Some(v.clone()),
                _ => None,
            })
        })
        .unwrap_or_default()
}

fn message_date(msg: &GmailMessage) -> DateTime<Utc> {
    msg.internal_date
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .or_else(|| parse_email_date(&header(msg.payload.as_ref(), "Date")))
        .unwrap_or_else(Utc::now)
}

fn item_from_messages(thread_id: &str, messages: &[GmailMessage]) -> Option<Item> {
    let last = messages.last()?;
    let payload = last.payload.as_ref();
    let unread = messages.iter().any(|m| {
        m.label_ids
            .as_ref()
            .is_some_and(|labels| labels.iter().any(|l| l == UNREAD_LABEL))
    });

    let mut item = Item::new(
        thread_id,
        header(payload, "From"),
        header(payload, "Subject"),
        message_date(last),
    )
    .with_snippet(last.snippet.clone().unwrap_or_default());
    item.read = !unread;
    Some(item)
}

fn message_from_gmail(msg: &GmailMessage) -> Message {
    let payload = msg.payload.as_ref();
    let mut text = String::new();
    let mut markup = String::new();
    if let Some(part) = payload {
        collect_bodies(part, &mut text, &mut markup);
    }

    let cc = header(payload, "Cc");
    let mut builder = MessageBuilder::new()
        .id(msg.id.clone().unwrap_or_default())
        .from(header(payload, "From"))
        .to(header(payload, "To"))
        .subject(header(payload, "Subject"))
        .body_text(text)
        .date(message_date(msg));
    if !cc.is_empty() {
        builder = builder.cc(cc);
    }
    if !markup.is_empty() {
        builder = builder.body_markup(markup);
    }
    builder.build()
}

/// Walks the MIME tree collecting inline text and html bodies.
fn collect_bodies(part: &MessagePart, text: &mut String, markup: &mut String) {
    let is_attachment = part.filename.as_deref().is_some_and(|f| !f.is_empty());
    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_ref())
        .map(|d| String::from_utf8_lossy(d).into_owned());

    match (part.mime_type.as_deref(), data) {
        (Some("text/plain"), Some(body)) if !is_attachment && text.is_empty() => *text = body,
        (Some("text/html"), Some(body)) if !is_attachment && markup.is_empty() => *markup = body,
        _ => {}
    }

    for child in part.parts.iter().flatten() {
        collect_bodies(child, text, markup);
    }
}

/// Parses an email date string into a DateTime
fn parse_email_date(date_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(date_str.trim()) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M:%S %Z",
    ];
    formats
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(date_str.trim(), fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Address header for a comma-separated recipient list; `None` when empty
fn address_header(header: &str) -> Option<Address<'static>> {
    let mut addresses: Vec<Address<'static>> = parse_addresses(header)
        .into_iter()
        .map(Address::from)
        .collect();
    match addresses.len() {
        0 => None,
        1 => addresses.pop(),
        _ => Some(Address::new_list(addresses)),
    }
}

/// Assembles the RFC 822 text of a reply.
fn build_raw_message(from: &str, draft: &ReplyDraft) -> Result<Vec<u8>> {
    let mut builder = MimeBuilder::new()
        .from(Address::from(from.to_string()))
        .subject(draft.subject.clone())
        .text_body(draft.body.clone());

    if let Some(to) = address_header(&draft.to) {
        builder = builder.to(to);
    }
    if let Some(cc) = draft.cc.as_deref().and_then(address_header) {
        builder = builder.cc(cc);
    }
    if let Some(bcc) = draft.bcc.as_deref().and_then(address_header) {
        builder = builder.bcc(bcc);
    }
    for attachment in &draft.attachments {
        builder = builder.attachment(
            attachment.content_type.clone(),
            attachment.filename.clone(),
            attachment.data.clone(),
        );
    }

    builder
        .write_to_vec()
        .map_err(|e| BridgeError::transport("send", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Attachment;
    use chrono::Datelike;
    use google_gmail1::api::{MessagePartBody, MessagePartHeader};

    fn draft() -> ReplyDraft {
        ReplyDraft {
            to: "vendor@acme.com, cc2@y.com".into(),
            cc: Some("boss@acme.com".into()),
            bcc: None,
            subject: "Re: Quote".into(),
            body: "Thanks!".into(),
            thread_id: "t1".into(),
            attachments: Vec::new(),
        }
    }

    fn part(mime: &str, data: &str) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(MessagePartBody {
                data: Some(data.as_bytes().to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_email_date_rfc2822() {
        let date = parse_email_date("Sun, 25 Jan 2026 10:30:00 -0500").unwrap();
        assert_eq!(date.year(), 2026);
        assert_eq!(date.day(), 25);
        assert!(parse_email_date("invalid date").is_none());
    }

    fn raw(draft: &ReplyDraft) -> String {
        String::from_utf8(build_raw_message("me@x.com", draft).unwrap()).unwrap()
    }

    fn header_lines(raw: &str) -> Vec<&str> {
        raw.split("\r\n\r\n").next().unwrap().split("\r\n").collect()
    }

    #[test]
    fn test_raw_message_plain() {
        let raw = raw(&draft());
        let headers = header_lines(&raw);
        assert!(headers.iter().any(|h| h.starts_with("From:") && h.contains("me@x.com")));
        assert!(headers.iter().any(|h| h.starts_with("To:")
            && h.contains("vendor@acme.com")
            && h.contains("cc2@y.com")));
        assert!(headers.iter().any(|h| h.starts_with("Cc:") && h.contains("boss@acme.com")));
        assert!(!headers.iter().any(|h| h.starts_with("Bcc:")));
        assert!(headers.contains(&"Subject: Re: Quote"));
        assert!(raw.contains("Thanks!"));
        assert!(!raw.contains("multipart/mixed"));
    }

    #[test]
    fn test_raw_message_with_attachment() {
        let mut draft = draft();
        draft.attachments.push(Attachment {
            filename: "quote.pdf".into(),
            content_type: "application/pdf".into(),
            data: b"%PDF-1.4 quote".to_vec(),
        });
        let raw = raw(&draft);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("quote.pdf"));
        assert!(raw.contains("Thanks!"));
    }

    #[test]
    fn test_header_injection_is_neutralized() {
        let mut draft = draft();
        draft.subject = "Hi\r\nBcc: evil@x.com".into();
        let raw = raw(&draft);
        assert!(!header_lines(&raw).iter().any(|h| h.starts_with("Bcc:")));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let mut draft = draft();
        draft.subject = "Re: Grüße".into();
        let raw = raw(&draft);
        let subject = header_lines(&raw)
            .into_iter()
            .find(|h| h.starts_with("Subject:"))
            .unwrap()
            .to_ascii_lowercase();
        assert!(subject.contains("=?utf-8?"));
        assert!(!raw.contains("Grüße"));
    }

    #[test]
    fn test_address_header_skips_empty_lists() {
        assert!(address_header("").is_none());
        assert!(address_header("not an address").is_none());
        assert!(address_header("a@x.com, B@x.com").is_some());
    }

    #[test]
    fn test_collect_bodies_prefers_inline_parts() {
        let mut attachment = part("text/plain", "attached file");
        attachment.filename = Some("notes.txt".into());
        let root = MessagePart {
            mime_type: Some("multipart/mixed".into()),
            parts: Some(vec![
                MessagePart {
                    mime_type: Some("multipart/alternative".into()),
                    parts: Some(vec![part("text/plain", "hello"), part("text/html", "<p>hello</p>")]),
                    ..Default::default()
                },
                attachment,
            ]),
            ..Default::default()
        };

        let (mut text, mut markup) = (String::new(), String::new());
        collect_bodies(&root, &mut text, &mut markup);
        assert_eq!(text, "hello");
        assert_eq!(markup, "<p>hello</p>");
    }

    #[test]
    fn test_message_from_gmail_missing_fields() {
        let msg = GmailMessage::default();
        let parsed = message_from_gmail(&msg);
        assert_eq!(parsed.from, "");
        assert_eq!(parsed.to, "");
        assert!(parsed.cc.is_none());
        assert_eq!(parsed.body_text, "");
    }

    #[test]
    fn test_item_from_messages() {
        let msg = GmailMessage {
            internal_date: Some(1_700_000_000_000),
            label_ids: Some(vec!["INBOX".into(), "UNREAD".into()]),
            snippet: Some("hello there".into()),
            payload: Some(MessagePart {
                headers: Some(vec![
                    MessagePartHeader {
                        name: Some("from".into()),
                        value: Some("Billing <billing@acme.com>".into()),
                    },
                    MessagePartHeader {
                        name: Some("Subject".into()),
                        value: Some("Invoice".into()),
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let item = item_from_messages("t1", &[msg]).unwrap();
        assert_eq!(item.id, "t1");
        assert_eq!(item.sender, "Billing <billing@acme.com>");
        assert_eq!(item.subject, "Invoice");
        assert!(!item.read);
        assert_eq!(item.snippet, "hello there");
        assert!(item_from_messages("t2", &[]).is_none());
    }
}
