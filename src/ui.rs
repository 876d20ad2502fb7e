//! TUI and event loop
//!
//! Features:
//! - Subscription list with fuzzy filter
//! - Loading / retry spinner
//! - Result and error pages
//! - Effect runner: external calls and timers on tokio tasks, results fed
//!   back through one channel so the app sees one event at a time

use anyhow::Result;
use crossterm::{
    event::{self, Event as TermEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::app::{App, AppState, Effect, Event};
use crate::config::Config;
use crate::gateway::{self, AzCli, SubscriptionGateway};

const APP_TITLE: &str = "Select Azure Subscription";
const SUCCESS_MESSAGE: &str = "Azure subscription successfully changed!";
const NO_CHANGE_MESSAGE: &str = "No change needed - subscription is already active";

/// Spinner frame rate
const TICK_RATE: Duration = Duration::from_millis(100);

/// Run the interactive picker until the user quits or the result page times out
pub async fn run_tui(config: &Config) -> Result<()> {
    let gateway: Arc<dyn SubscriptionGateway> =
        Arc::new(AzCli::new(config.tool.clone()).with_sample_data(config.use_sample_data));
    let mut app = App::new(config.retry_policy(), config.result_countdown());

    let mut terminal = setup_terminal()?;
    let result = run_tui_loop(&mut terminal, &mut app, gateway).await;
    restore_terminal(terminal)?;
    result
}

async fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    gateway: Arc<dyn SubscriptionGateway>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<Event>(64);

    let size = terminal.size()?;
    dispatch(app, Event::Resize { width: size.width, height: size.height }, &tx, &gateway);
    for effect in app.start() {
        perform(effect, &tx, &gateway);
    }

    let mut last_tick = Instant::now();

    loop {
        // Completed calls and timers
        while let Ok(event) = rx.try_recv() {
            dispatch(app, event, &tx, &gateway);
        }

        if last_tick.elapsed() >= TICK_RATE {
            dispatch(app, Event::Tick, &tx, &gateway);
            last_tick = Instant::now();
        }

        if app.should_quit() {
            break;
        }

        terminal.draw(|f| render(f, app))?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                TermEvent::Key(key) => {
                    if let Some(input) = app.map_key(key) {
                        dispatch(app, Event::Input(input), &tx, &gateway);
                    }
                }
                TermEvent::Resize(width, height) => {
                    dispatch(app, Event::Resize { width, height }, &tx, &gateway);
                }
                _ => {}
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

fn dispatch(
    app: &mut App,
    event: Event,
    tx: &mpsc::Sender<Event>,
    gateway: &Arc<dyn SubscriptionGateway>,
) {
    if !matches!(event, Event::Tick) {
        tracing::debug!(?event, "event");
    }
    for effect in app.update(event) {
        perform(effect, tx, gateway);
    }
}

/// Start the work an effect describes; its outcome comes back as an event
fn perform(effect: Effect, tx: &mpsc::Sender<Event>, gateway: &Arc<dyn SubscriptionGateway>) {
    tracing::debug!(?effect, "effect");
    let tx = tx.clone();
    match effect {
        Effect::LoadSubscriptions => {
            let gateway = Arc::clone(gateway);
            tokio::spawn(async move {
                let result = gateway::fetch_subscriptions(gateway.as_ref()).await;
                let _ = tx.send(Event::SubscriptionsLoaded(result)).await;
            });
        }
        Effect::SetSubscription(id) => {
            let gateway = Arc::clone(gateway);
            tokio::spawn(async move {
                let result = gateway.set_active_subscription(&id).await;
                let _ = tx.send(Event::SubscriptionChanged { id, result }).await;
            });
        }
        Effect::ScheduleRetry(delay) => {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Event::RetryDue).await;
            });
        }
        Effect::StartCountdown { id, after } => {
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = tx.send(Event::CountdownElapsed(id)).await;
            });
        }
        // The loop checks should_quit; in-flight calls die with the process
        Effect::Quit => {}
    }
}

// ═══════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════

fn render(f: &mut Frame, app: &App) {
    let area = f.size();
    match app.state() {
        AppState::Loading => {
            let text = format!("{} Loading subscriptions...", spinner_char(app.tick()));
            render_centered(f, area, text, Style::default().fg(Color::White));
        }
        AppState::Retrying { .. } => {
            let retry = app.retry();
            let text = format!(
                "{} Retrying... (attempt {}/{})",
                spinner_char(app.tick()),
                retry.attempt_count,
                retry.max_attempts
            );
            render_centered(f, area, text, Style::default().fg(Color::Yellow));
        }
        AppState::SelectingSubscription => render_list(f, app, area),
        AppState::ShowingResult { changed, .. } => {
            let (text, color) = if *changed {
                (SUCCESS_MESSAGE, Color::Green)
            } else {
                (NO_CHANGE_MESSAGE, Color::Cyan)
            };
            render_centered(f, area, text.to_string(), Style::default().fg(color));
        }
        AppState::Error { .. } => render_error(f, app, area),
    }
}

fn render_list(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    // Two lines per entry unless the terminal is cramped
    let compact = app.size().1 < 12;
    let visible = app.visible();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|s| {
            let active = if s.id == app.selected_id() { " (active)" } else { "" };
            let title = Line::from(vec![
                Span::styled(s.title().to_string(), Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(active, Style::default().fg(Color::Green)),
            ]);
            if compact {
                ListItem::new(title)
            } else {
                let desc = Line::styled(s.description(), Style::default().fg(Color::DarkGray));
                ListItem::new(vec![title, desc])
            }
        })
        .collect();

    let title = match app.filter() {
        Some(filter) => format!("{} | filter: {}_", APP_TITLE, filter),
        None => format!("{} ({})", APP_TITLE, app.subscriptions().len()),
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
        .highlight_symbol("│ ");

    let mut list_state = ListState::default();
    if !visible.is_empty() {
        list_state.select(Some(app.cursor()));
    }
    f.render_stateful_widget(list, chunks[0], &mut list_state);

    let help = if app.is_busy() {
        format!(" {} Switching subscription...", spinner_char(app.tick()))
    } else if app.filter().is_some() {
        " Enter: select | Esc: clear filter | Type to filter".to_string()
    } else {
        " ↑/k ↓/j: move | Enter: select | /: filter | q: quit".to_string()
    };
    let help = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[1]);
}

fn render_error(f: &mut Frame, app: &App, area: Rect) {
    let Some(err) = app.error() else {
        return;
    };
    let retry = app.retry();

    let hints = if retry.attempts_remaining() {
        format!(
            "Press 'r' to retry ({}/{}) • Press 'esc' to go back • Press 'q' to quit",
            retry.attempt_count, retry.max_attempts
        )
    } else {
        "Press 'esc' to go back • Press 'q' to quit".to_string()
    };
    let text = format!("✗ {} error: {}\n\n{}\n\n{}", err.kind.name(), err.cause, err.suggestion, hints);
    render_centered(f, area, text, Style::default().fg(Color::Red));
}

fn render_centered(f: &mut Frame, area: Rect, text: String, style: Style) {
    let lines = text.lines().count() as u16;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(lines.saturating_add(2)),
            Constraint::Min(0),
        ])
        .split(area);

    let para = Paragraph::new(text)
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false });
    f.render_widget(para, chunks[1]);
}

fn spinner_char(tick: usize) -> char {
    const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    SPINNER[tick % SPINNER.len()]
}

// ═══════════════════════════════════════════════════════════════
// TERMINAL SETUP
// ═══════════════════════════════════════════════════════════════

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
