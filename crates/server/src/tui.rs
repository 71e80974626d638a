use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};

use crate::server::{PlayerInfo, ServerStats};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

pub struct TuiState {
    log: VecDeque<(LogLevel, String)>,
    selected: usize,
    pending_kick: Option<usize>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            log: VecDeque::new(),
            selected: 0,
            pending_kick: None,
        }
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.log.len() >= MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, message));
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn select_next(&mut self, player_count: usize) {
        if player_count > 0 && self.selected + 1 < player_count {
            self.selected += 1;
        }
    }

    pub fn request_kick(&mut self, player_count: usize) {
        if self.selected < player_count {
            self.pending_kick = Some(self.selected);
        }
    }

    pub fn take_pending_kick(&mut self) -> Option<usize> {
        self.pending_kick.take()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn clamp_selection(&mut self, player_count: usize) {
        if player_count == 0 {
            self.selected = 0;
        } else if self.selected >= player_count {
            self.selected = player_count - 1;
        }
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &ServerStats, players: &[PlayerInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(players.len().max(1) as u16 + 2),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_capacity(frame, chunks[1], stats);
    render_players(frame, chunks[2], state, players);
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let uptime = format_duration(stats.uptime_secs);
    let block = Block::default()
        .title(format!(" Freeroam Server - Uptime: {} ", uptime))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let net = &stats.network;
    let text = format!(
        "Packets: {} sent / {} recv  |  Bytes: {} sent / {} recv",
        net.packets_sent,
        net.packets_received,
        format_bytes(net.bytes_sent),
        format_bytes(net.bytes_received)
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_capacity(frame: &mut Frame, area: Rect, stats: &ServerStats) {
    let block = Block::default()
        .title(" Players ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let ratio = if stats.max_players > 0 {
        stats.player_count as f64 / stats.max_players as f64
    } else {
        0.0
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{}", stats.player_count, stats.max_players));

    frame.render_widget(gauge, area);
}

fn render_players(frame: &mut Frame, area: Rect, state: &TuiState, players: &[PlayerInfo]) {
    let block = Block::default()
        .title(" Connected ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    if players.is_empty() {
        let paragraph = Paragraph::new("No players connected")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let line = format!(
                "{:>4}  {:<16} [{}]  {:>3} HP  {:>5.0}ms  ({:.0}, {:.0}, {:.0})",
                player.id,
                player.username,
                player.social_club_name,
                player.health,
                player.latency_ms,
                player.position.x,
                player.position.y,
                player.position.z
            );
            let style = if i == state.selected() {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(line).style(style)
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Log ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .rev()
        .take(visible)
        .rev()
        .map(|(level, message)| {
            let (prefix, color) = match level {
                LogLevel::Info => ("INFO ", Color::Gray),
                LogLevel::Warn => ("WARN ", Color::Yellow),
                LogLevel::Error => ("ERROR", Color::Red),
            };
            Line::from(vec![
                Span::styled(format!("{prefix} "), Style::default().fg(color)),
                Span::styled(message.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("q/ESC quit  |  Up/Down select player  |  k kick")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );
    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
