// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport display widget.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Gauge, Paragraph, Widget},
};

use super::TransportState;

/// Transport widget: play state, tempo, tempo slider and beat light
pub struct TransportWidget<'a> {
    state: &'a TransportState,
    block: Option<Block<'a>>,
    flash: bool,
}

impl<'a> TransportWidget<'a> {
    /// Create a new transport widget
    pub fn new(state: &'a TransportState) -> Self {
        Self {
            state,
            block: None,
            flash: false,
        }
    }

    /// Set the block wrapper
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    /// Light the beat indicator
    pub fn beat_flash(mut self, flash: bool) -> Self {
        self.flash = flash;
        self
    }
}

impl Widget for TransportWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Indicators
                Constraint::Length(1), // Spacer
                Constraint::Length(1), // Slider
                Constraint::Length(1), // Spacer
                Constraint::Min(0),    // Message
            ])
            .split(area);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(10), // Play/Stop indicator
                Constraint::Length(2),  // Spacer
                Constraint::Length(10), // Tempo
                Constraint::Length(2),  // Spacer
                Constraint::Length(14), // Interval
                Constraint::Length(2),  // Spacer
                Constraint::Length(5),  // Beat light
                Constraint::Min(0),     // Beat count
            ])
            .split(rows[0]);

        let (indicator, style) = if self.state.playing {
            ("▶ PLAY", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            ("■ STOP", Style::default().fg(Color::Yellow))
        };
        Paragraph::new(indicator).style(style).render(chunks[0], buf);

        Paragraph::new(format!("{} BPM", self.state.bpm))
            .style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
            .render(chunks[2], buf);

        Paragraph::new(format!("{:.1} ms", self.state.interval_ms))
            .style(Style::default().fg(Color::Cyan))
            .render(chunks[4], buf);

        let light = if self.flash {
            Span::styled(" ●  ", Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(" ○  ", Style::default().fg(Color::DarkGray))
        };
        Paragraph::new(light).render(chunks[6], buf);

        Paragraph::new(format!("beat {}", self.state.beats))
            .style(Style::default().fg(Color::DarkGray))
            .render(chunks[7], buf);

        // Tempo slider over the accepted range
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Magenta).bg(Color::Black))
            .ratio(self.state.range.ratio(self.state.bpm))
            .label(format!(
                "{} · {} · {}",
                self.state.range.min, self.state.bpm, self.state.range.max
            ))
            .render(rows[2], buf);

        if let Some(anomaly) = &self.state.anomaly {
            let line = Line::from(vec![
                Span::styled(
                    "timing error: ",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
                Span::styled(anomaly.as_str(), Style::default().fg(Color::Red)),
                Span::styled(", press space to restart", Style::default().fg(Color::Gray)),
            ]);
            Paragraph::new(line).render(rows[4], buf);
        }
    }
}
