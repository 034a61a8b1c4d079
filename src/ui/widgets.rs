use chrono::{DateTime, Datelike, Local, Utc};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Paragraph, Row, StatefulWidget, Table, TableState, Widget, Wrap,
    },
};

use crate::address;
use crate::app::{App, View};
use crate::conversation::Conversation;
use crate::dispatch::Dispatch;
use crate::recipients::{RecipientSet, ReplyMode};
use crate::store::SimilarityPrompt;

/// Warning indicator character for messages
pub const WARNING_CHAR: char = '⚠';

/// Spinner frames for animated busy indicator
const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Candidates listed in the similarity popup before "and N more"
const PROMPT_LIST_LIMIT: usize = 5;

/// Format a date for display in item lists.
/// Shows time for current year, year for older items
fn format_date(date: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = date.with_timezone(&Local);
    let now = Local::now();

    if local.year() == now.year() {
        local.format("%b %d %H:%M").to_string()
    } else {
        local.format("%b %d  %Y").to_string()
    }
}

/// UI state that supplements App state
#[derive(Debug, Default)]
pub struct UiState {
    /// Frame counter for spinner animation
    pub spinner_frame: usize,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_spinner(&mut self) {
        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn spinner_char(&self) -> char {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }
}

/// Clears a rectangle so an overlay draws on a blank background
fn clear_area(area: Rect, buf: &mut Buffer) {
    Clear.render(area, buf);
}

/// Widget for the inbox item list
pub struct InboxListWidget<'a, D> {
    app: &'a App<D>,
}

impl<'a, D> InboxListWidget<'a, D> {
    pub fn new(app: &'a App<D>) -> Self {
        Self { app }
    }
}

impl<D: Dispatch> StatefulWidget for InboxListWidget<'_, D> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let items = self.app.store.visible_items();
        let pending = self.app.store.pending_count();
        let mut title = format!(" Inbox · {} items ", items.len());
        if pending > 0 {
            title.push_str(&format!("· {} syncing ", pending));
        }
        if self.app.marked_count() > 0 {
            title.push_str(&format!("· {} marked ", self.app.marked_count()));
        }

        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        block.render(area, buf);

        if items.is_empty() {
            let msg = if self.app.loading {
                "Loading..."
            } else {
                "Inbox zero"
            };
            let x = inner.x + (inner.width.saturating_sub(msg.len() as u16)) / 2;
            let y = inner.y + inner.height / 2;
            buf.set_line(
                x,
                y,
                &Line::from(Span::styled(msg, Style::default().fg(Color::DarkGray))),
                inner.width,
            );
            return;
        }

        let rows: Vec<Row> = items
            .iter()
            .map(|item| {
                let mark = if self.app.is_marked(&item.id) { "*" } else { " " };
                let unread = if item.read { " " } else { "●" };
                let style = if item.read {
                    Style::default()
                } else {
                    Style::default().add_modifier(Modifier::BOLD)
                };
                Row::new(vec![
                    mark.to_string(),
                    unread.to_string(),
                    format_date(&item.received_at),
                    address::display_name(&item.sender),
                    item.subject.clone(),
                ])
                .style(style)
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(1),  // Mark
                Constraint::Length(1),  // Unread
                Constraint::Length(12), // Date
                Constraint::Length(24), // Sender
                Constraint::Min(20),    // Subject
            ],
        )
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        StatefulWidget::render(table, inner, buf, state);
    }
}

fn recipient_lines(recipients: &RecipientSet, mode: ReplyMode) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let mode = match mode {
        ReplyMode::Reply => "Reply",
        ReplyMode::ReplyAll => "Reply all",
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{mode:<9} "), label),
        Span::raw(format!("To: {}", recipients.to_header())),
    ])];
    if let Some(cc) = recipients.cc_header() {
        lines.push(Line::from(vec![
            Span::styled("          ", label),
            Span::raw(format!("Cc: {cc}")),
        ]));
    }
    if let Some(bcc) = recipients.bcc_header() {
        lines.push(Line::from(vec![
            Span::styled("          ", label),
            Span::raw(format!("Bcc: {bcc}")),
        ]));
    }
    lines
}

fn conversation_lines(conversation: &Conversation) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in &conversation.entries {
        let sender_style = if entry.is_self {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(vec![
            Span::styled(entry.sender.clone(), sender_style),
            Span::styled(
                format!("  {}", format_date(&entry.date)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        if entry.body.is_empty() {
            lines.push(Line::from(Span::styled(
                "(no new text)",
                Style::default().fg(Color::DarkGray),
            )));
        } else {
            lines.extend(entry.body.lines().map(|l| Line::from(l.to_string())));
        }
        lines.push(Line::default());
    }
    lines
}

/// Widget for the stripped conversation of the open thread
pub struct ThreadViewWidget<'a, D> {
    app: &'a App<D>,
}

impl<'a, D> ThreadViewWidget<'a, D> {
    pub fn new(app: &'a App<D>) -> Self {
        Self { app }
    }
}

impl<D: Dispatch> Widget for ThreadViewWidget<'_, D> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(thread) = &self.app.thread else {
            Block::default()
                .borders(Borders::ALL)
                .title(" Thread ")
                .render(area, buf);
            return;
        };

        let conversation = &thread.conversation;
        let title = if conversation.message_count == 1 {
            format!(" {} · 1 message ", conversation.subject)
        } else {
            format!(
                " {} · {} messages ",
                conversation.subject, conversation.message_count
            )
        };

        let mut lines = recipient_lines(thread.composer.recipients(), thread.composer.mode());
        lines.push(Line::default());
        lines.extend(conversation_lines(conversation));

        Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .scroll((thread.scroll, 0))
            .render(area, buf);
    }
}

/// Widget for writing a reply to the open thread
pub struct ComposeWidget<'a, D> {
    app: &'a App<D>,
}

impl<'a, D> ComposeWidget<'a, D> {
    pub fn new(app: &'a App<D>) -> Self {
        Self { app }
    }
}

impl<D: Dispatch> Widget for ComposeWidget<'_, D> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(thread) = &self.app.thread else {
            return;
        };

        let mut lines = recipient_lines(thread.composer.recipients(), thread.composer.mode());
        lines.push(Line::from(vec![
            Span::styled("Subject   ", Style::default().fg(Color::DarkGray)),
            Span::raw(thread.composer.subject()),
        ]));
        lines.push(Line::default());
        lines.extend(self.app.draft_body.split('\n').map(|l| Line::from(l.to_string())));
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Reply "),
            )
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Popup offering to apply the last action to other items from one domain
pub struct SimilarPromptWidget<'a> {
    prompt: &'a SimilarityPrompt,
}

impl<'a> SimilarPromptWidget<'a> {
    pub fn new(prompt: &'a SimilarityPrompt) -> Self {
        Self { prompt }
    }

    pub fn lines(&self) -> Vec<String> {
        let count = self.prompt.candidates.len();
        let mut lines = vec![format!(
            "Also {} {} other item(s) from {}?",
            self.prompt.kind, count, self.prompt.domain
        )];
        lines.extend(
            self.prompt
                .candidates
                .iter()
                .take(PROMPT_LIST_LIMIT)
                .map(|item| format!("  {}", item.subject)),
        );
        if count > PROMPT_LIST_LIMIT {
            lines.push(format!("  ...and {} more", count - PROMPT_LIST_LIMIT));
        }
        lines.push("(y/n)".to_string());
        lines
    }
}

impl Widget for SimilarPromptWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        clear_area(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Similar items ")
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(area);
        block.render(area, buf);

        for (i, line) in self.lines().iter().enumerate() {
            if i >= inner.height as usize {
                break;
            }
            let style = if i == 0 {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            buf.set_line(
                inner.x,
                inner.y + i as u16,
                &Line::from(Span::styled(line.clone(), style)),
                inner.width,
            );
        }
    }
}

/// Widget for the busy/loading modal overlay
pub struct BusyModalWidget<'a> {
    message: &'a str,
    spinner: char,
}

impl<'a> BusyModalWidget<'a> {
    pub fn new(message: &'a str, spinner: char) -> Self {
        Self { message, spinner }
    }
}

impl Widget for BusyModalWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let display_msg = format!("{} {}", self.spinner, self.message);

        let msg_width = display_msg.chars().count() as u16 + 4;
        let box_width = msg_width.max(20).min(area.width.saturating_sub(4));
        let box_height = 3;

        let x = area.x + (area.width.saturating_sub(box_width)) / 2;
        let y = area.y + (area.height.saturating_sub(box_height)) / 2;
        let modal_area = Rect::new(x, y, box_width, box_height.min(area.height));

        clear_area(modal_area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(modal_area);
        block.render(modal_area, buf);

        let msg_x = inner.x + (inner.width.saturating_sub(display_msg.chars().count() as u16)) / 2;
        buf.set_line(
            msg_x,
            inner.y,
            &Line::from(Span::styled(
                display_msg,
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            inner.width,
        );
    }
}

/// Widget for the status line above the help bar
pub struct StatusBarWidget<'a> {
    message: &'a str,
}

impl<'a> StatusBarWidget<'a> {
    pub fn new(message: &'a str) -> Self {
        Self { message }
    }
}

impl Widget for StatusBarWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = if self.message.starts_with("Could not") {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let text = if style.fg == Some(Color::Yellow) {
            format!("{WARNING_CHAR} {}", self.message)
        } else {
            self.message.to_string()
        };
        Paragraph::new(text).style(style).render(area, buf);
    }
}

/// Widget for the help bar at the bottom
pub struct HelpBarWidget {
    view: View,
    prompting: bool,
}

impl HelpBarWidget {
    pub fn new(view: View, prompting: bool) -> Self {
        Self { view, prompting }
    }

    pub fn text(&self) -> &'static str {
        if self.prompting {
            return "y: apply to similar | n: dismiss";
        }
        match self.view {
            View::Inbox => {
                "j/k: move | Enter: open | a: archive | d: delete | e: done | i: ignore | m: deal | space: mark | A/D/E: marked | r: refresh | q: quit"
            }
            View::Thread => {
                "j/k: scroll | R: reply | t: reply/all | a/d/e/i/m: act on thread | q: back"
            }
            View::Compose => "type to write | Ctrl-s: send | Esc: cancel | Ctrl-t: reply/all",
        }
    }
}

impl Widget for HelpBarWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Paragraph::new(self.text())
            .style(Style::default().fg(Color::DarkGray))
            .render(area, buf);
    }
}
