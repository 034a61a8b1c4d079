use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::TableState,
};

use crate::app::{App, View};
use crate::dispatch::Dispatch;
use crate::ui::widgets::{
    BusyModalWidget, ComposeWidget, HelpBarWidget, InboxListWidget, SimilarPromptWidget,
    StatusBarWidget, ThreadViewWidget, UiState,
};

/// Renders the entire application UI
pub fn render<D: Dispatch>(frame: &mut Frame, app: &App<D>, ui_state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Main content
            Constraint::Length(1), // Status line
            Constraint::Length(1), // Help bar
        ])
        .split(frame.area());

    match app.view {
        View::Inbox => {
            let widget = InboxListWidget::new(app);
            let selected = (app.store.visible_len() > 0).then_some(app.selected);
            let mut table_state = TableState::default().with_selected(selected);
            frame.render_stateful_widget(widget, chunks[0], &mut table_state);
        }
        View::Thread => frame.render_widget(ThreadViewWidget::new(app), chunks[0]),
        View::Compose => frame.render_widget(ComposeWidget::new(app), chunks[0]),
    }

    if let Some(status) = &app.status {
        frame.render_widget(StatusBarWidget::new(status), chunks[1]);
    }

    let prompt = app.store.prompt();
    frame.render_widget(HelpBarWidget::new(app.view, prompt.is_some()), chunks[2]);

    if let Some(prompt) = prompt {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(SimilarPromptWidget::new(prompt), area);
    }

    if app.loading {
        let modal = BusyModalWidget::new("Loading...", ui_state.spinner_char());
        frame.render_widget(modal, frame.area());
    }
}

/// Creates a centered rectangle for dialogs
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::QueuedDispatch;
    use crate::model::Item;
    use crate::store::{MutationKind, MutationStore};
    use chrono::Utc;
    use ratatui::{Terminal, backend::TestBackend};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|cell| cell.symbol()).collect()
    }

    fn app() -> App<QueuedDispatch> {
        let mut app = App::new(MutationStore::new("me@x.com", QueuedDispatch::new()));
        app.set_items(vec![
            Item::new("a", "Billing <billing@acme.com>", "Invoice", Utc::now()),
            Item::new("b", "News <news@acme.com>", "Newsletter", Utc::now()),
        ]);
        app
    }

    #[test]
    fn test_centered_rect() {
        let area = Rect::new(0, 0, 100, 100);
        let centered = centered_rect(50, 50, area);

        assert!(centered.x > 0);
        assert!(centered.y > 0);
        assert!(centered.width < area.width);
        assert!(centered.height < area.height);
    }

    #[test]
    fn test_render_inbox() {
        let app = app();
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal
            .draw(|f| render(f, &app, &UiState::new()))
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("Invoice"));
        assert!(text.contains("Newsletter"));
    }

    #[test]
    fn test_render_prompt_after_archive() {
        let mut app = app();
        app.apply_to_current(MutationKind::Archive);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| render(f, &app, &UiState::new()))
            .unwrap();
        let text = buffer_text(&terminal);
        assert!(text.contains("acme.com?"));
        assert!(text.contains("y: apply to similar"));
    }
}
