//! Terminal dashboard: one gauge + sparkline per panel and a status bar

use crate::render::{badge_glyph, balance_of};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use fieldwatch_client::{ConnectionManager, LiveSnapshot};
use fieldwatch_core::{PanelKey, TierTable};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

struct App {
    tables: HashMap<PanelKey, TierTable>,
    snapshots: Vec<LiveSnapshot>,
    polling: HashMap<PanelKey, bool>,
    selected: usize,
    should_quit: bool,
}

impl App {
    fn selected_key(&self) -> Option<PanelKey> {
        self.snapshots.get(self.selected).map(|s| s.key.clone())
    }
}

fn tier_color(name: &str) -> Color {
    match name {
        "magenta" => Color::Magenta,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "cyan" => Color::Cyan,
        "red" => Color::Red,
        "blue" => Color::Blue,
        _ => Color::Gray,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(size);

    let n = app.snapshots.len().max(1) as u32;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..n).map(|_| Constraint::Ratio(1, n)).collect::<Vec<_>>())
        .split(chunks[0]);

    for (i, snap) in app.snapshots.iter().enumerate() {
        draw_panel(frame, app, snap, i == app.selected, rows[i]);
    }
    draw_status(frame, app, chunks[1]);
}

fn draw_panel(frame: &mut Frame, app: &App, snap: &LiveSnapshot, selected: bool, area: Rect) {
    let table = app.tables.get(&snap.key);
    let tier = snap.value().zip(table).map(|(v, t)| t.classify(v).clone());
    let color = tier.as_ref().map(|t| tier_color(&t.color)).unwrap_or(Color::DarkGray);
    let polling = app.polling.get(&snap.key).copied().unwrap_or(false);

    let badge_color = match snap.badge {
        "connected" => Color::Green,
        "stale" => Color::Yellow,
        _ => Color::Red,
    };
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", snap.key),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} {} ", badge_glyph(snap.badge), snap.badge),
            Style::default().fg(badge_color),
        ),
        Span::styled(
            if polling { "" } else { "[paused] " },
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let border = if selected { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let gauge_label = match (&snap.current, &tier) {
        (Some(sample), Some(t)) => format!("{:.3} {} {}", sample.value, t.emoji, t.label),
        (Some(sample), None) => format!("{:.3}", sample.value),
        (None, _) => "waiting for data".to_string(),
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(color))
        .ratio(snap.value().unwrap_or(0.0).clamp(0.0, 1.0))
        .label(gauge_label);
    frame.render_widget(gauge, parts[0]);

    let mut info = Vec::new();
    if let Some(balance) = balance_of(snap) {
        info.push(Span::styled(
            format!("ratio {} ({}) ", balance.ratio_label(), balance.status()),
            Style::default().fg(Color::Cyan),
        ));
    }
    if let Some(at) = snap.last_success_at {
        info.push(Span::raw(format!("updated {} ", at.format("%H:%M:%S"))));
    }
    if let Some(notice) = snap.notices.last() {
        info.push(Span::styled(format!("{} ", notice), Style::default().fg(Color::DarkGray)));
    }
    if !snap.connected {
        if let Some(err) = &snap.last_error {
            info.push(Span::styled(err.clone(), Style::default().fg(Color::Red)));
        }
    }
    frame.render_widget(Paragraph::new(Line::from(info)), parts[1]);

    let data: Vec<u64> = snap
        .history
        .iter()
        .map(|s| (s.value.clamp(0.0, 1.0) * 100.0).round() as u64)
        .collect();
    let spark = Sparkline::default()
        .data(&data)
        .max(100)
        .style(Style::default().fg(color));
    frame.render_widget(spark, parts[2]);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let connected = app.snapshots.iter().filter(|s| s.connected).count();
    let line = Line::from(vec![
        Span::styled(
            " FIELDWATCH ",
            Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {}/{} connected ", connected, app.snapshots.len())),
        Span::styled(
            " ↑/↓ select  space toggle  c clear  q quit ",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

pub async fn run_dashboard(
    manager: Arc<ConnectionManager>,
    tables: HashMap<PanelKey, TierTable>,
) -> anyhow::Result<()> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
        original_hook(info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App {
        tables,
        snapshots: Vec::new(),
        polling: HashMap::new(),
        selected: 0,
        should_quit: false,
    };

    let result = run_event_loop(&mut terminal, &mut app, &manager).await;

    terminal::disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    manager: &ConnectionManager,
) -> anyhow::Result<()> {
    loop {
        app.snapshots = manager.snapshots().await;
        app.polling = app
            .snapshots
            .iter()
            .map(|s| (s.key.clone(), manager.is_polling(&s.key)))
            .collect();
        if app.selected >= app.snapshots.len() {
            app.selected = app.snapshots.len().saturating_sub(1);
        }

        terminal.draw(|f| draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true
                    }
                    KeyCode::Up => app.selected = app.selected.saturating_sub(1),
                    KeyCode::Down => {
                        if app.selected + 1 < app.snapshots.len() {
                            app.selected += 1;
                        }
                    }
                    KeyCode::Char(' ') => {
                        if let Some(key) = app.selected_key() {
                            let polling = app.polling.get(&key).copied().unwrap_or(false);
                            if let Err(e) = manager.set_enabled(&key, !polling) {
                                tracing::warn!("toggle {} failed: {}", key, e);
                            }
                        }
                    }
                    KeyCode::Char('c') => {
                        if let Some(live) = app.selected_key().and_then(|k| manager.panel(&k)) {
                            live.clear_history().await;
                        }
                    }
                    _ => {}
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
