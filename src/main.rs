use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

use missionterm::app::{App, View};
use missionterm::bridge::demo::DemoBridge;
use missionterm::bridge::gmail::GmailBridge;
use missionterm::bridge::{Bridge, ReplyDraft};
use missionterm::config::{self, BackendKind, Config};
use missionterm::conversation::{Conversation, ReplyComposer};
use missionterm::dispatch::{Completion, Dispatch, TaskDispatcher};
use missionterm::error::BridgeError;
use missionterm::logging::{self, LogTarget};
use missionterm::model::{Item, Thread};
use missionterm::recipients::{RecipientSet, ReplyMode};
use missionterm::similar::SimilarItemFinder;
use missionterm::store::{MutationKind, MutationStore};
use missionterm::ui::render::render;
use missionterm::ui::widgets::UiState;

/// Artificial delay of the demo backend in the TUI, so syncing is visible
const DEMO_LATENCY: Duration = Duration::from_millis(400);

/// How long the event loop waits for a key before redrawing
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "missionterm", version, about = "Inbox triage from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use the built-in demo inbox regardless of configuration
    #[arg(long, global = true)]
    demo: bool,

    /// Config file (default: ~/.config/missionterm/config.toml)
    #[arg(long, value_name = "PATH", env = config::CONFIG_ENV, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Interactive triage (default)
    Tui,
    /// Print the inbox
    Inbox,
    /// Print a thread with quoted text removed and the reply recipients
    Thread {
        /// Thread id as shown by `inbox`
        id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;
    let command = cli.command.clone().unwrap_or(Commands::Tui);

    let target = match command {
        Commands::Tui => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    logging::init(
        &logging::effective_level(&config.log.level, cli.verbose),
        target,
        &config.log_path(),
    );

    let backend = if cli.demo {
        BackendKind::Demo
    } else {
        config.backend.kind
    };
    info!(?backend, account = %config.account.email, "starting");

    match backend {
        BackendKind::Demo => {
            let bridge = match command {
                Commands::Tui => DemoBridge::new().with_latency(DEMO_LATENCY),
                _ => DemoBridge::new(),
            };
            run(Arc::new(bridge), &config, command).await
        }
        BackendKind::Gmail => {
            config::ensure_dir(&config.dir)?;
            let bridge =
                GmailBridge::connect(&config.client_secret_path(), &config.token_cache_path())
                    .await
                    .context("Failed to connect to Gmail")?;
            run(Arc::new(bridge), &config, command).await
        }
    }
}

async fn run<B: Bridge + 'static>(bridge: Arc<B>, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Tui => run_tui(bridge, config).await,
        Commands::Inbox => cmd_inbox(bridge.as_ref(), config).await,
        Commands::Thread { id, json } => cmd_thread(bridge.as_ref(), config, &id, json).await,
    }
}

async fn cmd_inbox<B: Bridge>(bridge: &B, config: &Config) -> Result<()> {
    let items = bridge.fetch_inbox(&config.account.email).await?;
    for item in &items {
        println!(
            "{:<20} {}  {:<32} {}",
            item.id,
            item.received_at.format("%Y-%m-%d %H:%M"),
            item.sender,
            item.subject
        );
    }
    eprintln!("{} item(s)", items.len());
    Ok(())
}

#[derive(Serialize)]
struct ThreadReport<'a> {
    conversation: &'a Conversation,
    reply_mode: ReplyMode,
    recipients: &'a RecipientSet,
}

async fn cmd_thread<B: Bridge>(bridge: &B, config: &Config, id: &str, json: bool) -> Result<()> {
    let thread = bridge.fetch_thread(id, &config.account.email).await?;
    let conversation = Conversation::from_thread(&thread);
    let composer = ReplyComposer::new(thread, &config.account.email);

    if json {
        let report = ThreadReport {
            conversation: &conversation,
            reply_mode: composer.mode(),
            recipients: composer.recipients(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} ({} messages)\n", conversation.subject, conversation.message_count);
    for entry in &conversation.entries {
        println!("{}  {}", entry.sender, entry.date.format("%Y-%m-%d %H:%M"));
        println!("{}\n", entry.body);
    }
    let recipients = composer.recipients();
    println!("{:?} to: {}", composer.mode(), recipients.to_header());
    if let Some(cc) = recipients.cc_header() {
        println!("cc: {cc}");
    }
    Ok(())
}

/// Results of fetches and sends started from the event loop
enum BridgeEvent {
    Inbox(Result<Vec<Item>, BridgeError>),
    Thread(Result<Thread, BridgeError>),
    Sent(Result<(), BridgeError>),
}

/// Starts bridge calls in the background and reports back over a channel
struct Session<B> {
    bridge: Arc<B>,
    account: String,
    events: UnboundedSender<BridgeEvent>,
}

impl<B: Bridge + 'static> Session<B> {
    fn fetch_inbox(&self) {
        let (bridge, account, events) = self.handles();
        tokio::spawn(async move {
            let result = bridge.fetch_inbox(&account).await;
            let _ = events.send(BridgeEvent::Inbox(result));
        });
    }

    fn fetch_thread(&self, item_id: String) {
        let (bridge, account, events) = self.handles();
        tokio::spawn(async move {
            let result = bridge.fetch_thread(&item_id, &account).await;
            let _ = events.send(BridgeEvent::Thread(result));
        });
    }

    fn send(&self, draft: ReplyDraft) {
        let (bridge, account, events) = self.handles();
        tokio::spawn(async move {
            let result = bridge.send_reply(&account, &draft).await;
            let _ = events.send(BridgeEvent::Sent(result));
        });
    }

    fn handles(&self) -> (Arc<B>, String, UnboundedSender<BridgeEvent>) {
        (
            Arc::clone(&self.bridge),
            self.account.clone(),
            self.events.clone(),
        )
    }
}

async fn run_tui<B: Bridge + 'static>(bridge: Arc<B>, config: &Config) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, bridge, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "tui exited with error");
    }
    result
}

fn run_app<B: Bridge + 'static>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    bridge: Arc<B>,
    config: &Config,
) -> Result<()> {
    let account = config.account.email.clone();
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<BridgeEvent>();

    let finder = SimilarItemFinder::new().with_extra_skip_domains(&config.triage.extra_skip_domains);
    let dispatcher = TaskDispatcher::new(Arc::clone(&bridge), completion_tx);
    let store = MutationStore::new(account.clone(), dispatcher).with_finder(finder);
    let mut app = App::new(store);
    let mut ui_state = UiState::new();

    let session = Session {
        bridge,
        account,
        events: event_tx,
    };
    app.loading = true;
    session.fetch_inbox();

    loop {
        drain_channels(&mut app, &mut completion_rx, &mut event_rx);
        terminal.draw(|f| render(f, &app, &ui_state))?;
        if app.loading {
            ui_state.tick_spinner();
        }

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && handle_key(&mut app, &session, key) == Flow::Quit
        {
            return Ok(());
        }
    }
}

fn drain_channels<D: Dispatch>(
    app: &mut App<D>,
    completions: &mut UnboundedReceiver<Completion>,
    events: &mut UnboundedReceiver<BridgeEvent>,
) {
    while let Ok(completion) = completions.try_recv() {
        app.settle(completion);
    }
    while let Ok(event) = events.try_recv() {
        match event {
            BridgeEvent::Inbox(Ok(items)) => app.set_items(items),
            BridgeEvent::Thread(Ok(thread)) => app.show_thread(thread),
            BridgeEvent::Sent(Ok(())) => app.status = Some("Reply sent".to_string()),
            BridgeEvent::Inbox(Err(e)) => {
                app.loading = false;
                app.status = Some(format!("Could not refresh: {e}"));
            }
            BridgeEvent::Thread(Err(e)) => {
                app.loading = false;
                app.status = Some(format!("Could not open thread: {e}"));
            }
            BridgeEvent::Sent(Err(e)) => app.status = Some(format!("Could not send reply: {e}")),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

fn kind_for(c: char) -> Option<MutationKind> {
    match c {
        'a' => Some(MutationKind::Archive),
        'd' => Some(MutationKind::Trash),
        'e' => Some(MutationKind::Done),
        'i' => Some(MutationKind::Ignore),
        'm' => Some(MutationKind::Deal),
        _ => None,
    }
}

fn handle_key<B: Bridge + 'static, D: Dispatch>(
    app: &mut App<D>,
    session: &Session<B>,
    key: KeyEvent,
) -> Flow {
    if app.view == View::Compose {
        handle_compose_key(app, session, key);
        return Flow::Continue;
    }

    if app.store.prompt().is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                app.accept_prompt();
                return Flow::Continue;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.dismiss_prompt();
                return Flow::Continue;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc if app.view == View::Thread => app.close_thread(),
        KeyCode::Char('q') => return Flow::Quit,
        KeyCode::Esc => app.clear_marks(),
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
        KeyCode::Char('g') => app.select_first(),
        KeyCode::Char('G') => app.select_last(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Char(' ') => app.toggle_mark(),
        KeyCode::Enter => {
            if let Some(id) = app.thread_to_open() {
                app.loading = true;
                session.fetch_thread(id);
            }
        }
        KeyCode::Char('r') => {
            app.loading = true;
            session.fetch_inbox();
        }
        KeyCode::Char('R') => app.start_compose(),
        KeyCode::Char('t') => app.toggle_reply_all(),
        KeyCode::Char('A') => {
            app.apply_to_marked(MutationKind::Archive);
        }
        KeyCode::Char('D') => {
            app.apply_to_marked(MutationKind::Trash);
        }
        KeyCode::Char('E') => {
            app.apply_to_marked(MutationKind::Done);
        }
        KeyCode::Char(c) => {
            if let Some(kind) = kind_for(c) {
                app.apply_to_current(kind);
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn handle_compose_key<B: Bridge + 'static, D: Dispatch>(
    app: &mut App<D>,
    session: &Session<B>,
    key: KeyEvent,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.cancel_compose(),
        KeyCode::Char('s') if ctrl => {
            if let Some(draft) = app.take_draft() {
                app.status = Some("Sending...".to_string());
                session.send(draft);
            }
        }
        KeyCode::Char('t') if ctrl => app.toggle_reply_all(),
        KeyCode::Enter => app.push_char('\n'),
        KeyCode::Backspace => app.pop_char(),
        KeyCode::Char(c) if !ctrl => app.push_char(c),
        _ => {}
    }
}
