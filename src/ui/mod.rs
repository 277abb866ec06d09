// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Terminal UI for the metronome.
//!
//! Provides a ratatui-based terminal interface with the transport display,
//! tempo slider and a key binding overlay. The UI never touches the
//! scheduler directly; it reads published status and sends commands
//! through a [`MetronomeHandle`].

mod transport;

pub use transport::TransportWidget;

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};

use crate::control::{format_shortcut, ControlAction, KeyboardController};
use crate::scheduler::{Beat, BpmRange, SchedulingPolicy};
use crate::transport::{MetronomeHandle, TransportStatus};

/// How long the beat light stays on
const FLASH_DURATION: Duration = Duration::from_millis(100);

/// Redraw period, about 30 fps
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// UI state
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// Transport state
    pub transport: TransportState,
    /// Help text visible
    pub show_help: bool,
    /// Status message
    pub status_message: Option<String>,
    /// Status message timestamp
    pub status_time: Option<Instant>,
}

impl UiState {
    /// Set a status message that will be displayed temporarily
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    /// Clear expired status message
    pub fn clear_expired_status(&mut self) {
        if let Some(time) = self.status_time {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
                self.status_time = None;
            }
        }
    }
}

/// Transport state for UI display
#[derive(Debug, Clone)]
pub struct TransportState {
    /// Whether playing
    pub playing: bool,
    /// Current tempo
    pub bpm: u32,
    /// Accepted tempo range, the slider's bounds
    pub range: BpmRange,
    /// Beat interval in milliseconds
    pub interval_ms: f64,
    /// Beats since playback started
    pub beats: u64,
    /// Active scheduling policy
    pub policy: String,
    /// Fault that stopped playback
    pub anomaly: Option<String>,
    last_beat: Option<Beat>,
    flash_until: Option<Instant>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            playing: false,
            bpm: 100,
            range: BpmRange::default(),
            interval_ms: 600.0,
            beats: 0,
            policy: String::new(),
            anomaly: None,
            last_beat: None,
            flash_until: None,
        }
    }
}

impl TransportState {
    /// Update from published transport status
    pub fn update_from_status(&mut self, status: &TransportStatus, now: Instant) {
        self.playing = status.is_playing();
        self.bpm = status.bpm;
        self.range = status.range;
        self.interval_ms = status.interval.as_secs_f64() * 1000.0;
        self.beats = status.beats;
        self.policy = match status.policy {
            SchedulingPolicy::Lookahead { window } => {
                format!("lookahead {} ms", window.as_millis())
            }
            SchedulingPolicy::WallClock => "wall clock".to_string(),
        };
        self.anomaly = status.anomaly.as_ref().map(|a| a.label().to_string());

        if status.last_beat.is_some() && status.last_beat != self.last_beat {
            self.flash_until = Some(now + FLASH_DURATION);
        }
        self.last_beat = status.last_beat;
    }

    /// Whether the beat light is on
    pub fn beat_flash(&self, now: Instant) -> bool {
        self.playing && self.flash_until.is_some_and(|until| now < until)
    }
}

/// Apply a control action. Returns false when the UI should exit.
pub fn dispatch(state: &mut UiState, action: ControlAction, handle: &MetronomeHandle) -> bool {
    match action {
        ControlAction::Quit => return false,
        ControlAction::ToggleHelp => state.show_help = !state.show_help,
        other => {
            if let Some(command) = other.transport_command() {
                if let Err(err) = handle.send(command) {
                    tracing::warn!(%err, ?command, "command not delivered");
                    state.set_status("Metronome stopped responding");
                }
            }
        }
    }
    true
}

/// Terminal UI application
pub struct App {
    state: UiState,
    keyboard: KeyboardController,
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl App {
    /// Set up the terminal and create the app
    pub fn new(keyboard: KeyboardController) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            state: UiState::default(),
            keyboard,
            terminal,
        })
    }

    /// Run until the user quits. Blocks the calling thread.
    pub fn run(&mut self, handle: &MetronomeHandle) -> io::Result<()> {
        loop {
            self.state
                .transport
                .update_from_status(&handle.status(), Instant::now());
            self.state.clear_expired_status();
            self.draw()?;

            if !event::poll(FRAME_INTERVAL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(action) = self.keyboard.process_key(key.code, key.modifiers) {
                if !dispatch(&mut self.state, action, handle) {
                    return Ok(());
                }
            }
        }
    }

    /// Draw the UI
    fn draw(&mut self) -> io::Result<()> {
        let state = &self.state;
        let keyboard = &self.keyboard;
        let now = Instant::now();

        self.terminal.draw(|frame| {
            let area = frame.area();

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(8), // Transport
                    Constraint::Min(0),    // Padding
                    Constraint::Length(1), // Status bar
                ])
                .split(area);

            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!(" Metronome · {} ", state.transport.policy));
            frame.render_widget(
                TransportWidget::new(&state.transport)
                    .block(block)
                    .beat_flash(state.transport.beat_flash(now)),
                chunks[0],
            );

            render_status_bar(frame, chunks[2], state);

            if state.show_help {
                render_help_overlay(frame, area, keyboard);
            }
        })?;

        Ok(())
    }

    fn cleanup(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Render status bar
fn render_status_bar(frame: &mut Frame, area: Rect, state: &UiState) {
    let text = if let Some(ref msg) = state.status_message {
        Span::styled(msg, Style::default().fg(Color::Yellow))
    } else {
        Span::styled(
            " Space: Play/Pause | ↑/↓: Tempo ±1 | PgUp/PgDn: ±10 | h: Help | q: Quit",
            Style::default().fg(Color::DarkGray),
        )
    };

    frame.render_widget(Paragraph::new(text), area);
}

/// Render help overlay from the active key bindings
fn render_help_overlay(frame: &mut Frame, area: Rect, keyboard: &KeyboardController) {
    let mut help_text = Vec::new();
    for (category, bindings) in keyboard.bindings_by_category() {
        if !help_text.is_empty() {
            help_text.push(Line::from(""));
        }
        help_text.push(Line::from(Span::styled(
            category,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for binding in bindings {
            help_text.push(Line::from(format!(
                "  {:<12}{}",
                format_shortcut(&binding.shortcut),
                binding.description
            )));
        }
    }

    let width = 44.min(area.width.saturating_sub(4));
    let height = (help_text.len() as u16 + 2).min(area.height.saturating_sub(2));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .style(Style::default().bg(Color::Black));
    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);
    frame.render_widget(Paragraph::new(help_text), inner);
}
