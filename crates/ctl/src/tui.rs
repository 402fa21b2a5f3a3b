use std::collections::VecDeque;
use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use lanlight::{Device, MacAddress, NetworkStats};

const MAX_LOG_LINES: usize = 200;

/// One row of the device table.
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub mac: MacAddress,
    pub label: String,
    pub product: String,
    pub lifecycle: &'static str,
    pub on: bool,
    pub addr: String,
}

impl DeviceRow {
    pub fn from_device(device: &Device) -> Self {
        Self {
            mac: device.mac(),
            label: device.label().unwrap_or("-").to_string(),
            product: device
                .state()
                .product
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |p| p.name.clone()),
            lifecycle: device.lifecycle().as_str(),
            on: device.is_on(),
            addr: device.addr().to_string(),
        }
    }
}

struct LogEntry {
    level: log::Level,
    message: String,
}

pub struct TuiState {
    started: Instant,
    selected: usize,
    log: VecDeque<LogEntry>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            selected: 0,
            log: VecDeque::new(),
        }
    }

    pub fn log(&mut self, level: log::Level, message: impl Into<String>) {
        if self.log.len() >= MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            level,
            message: message.into(),
        });
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.log(log::Level::Info, message);
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.log(log::Level::Warn, message);
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.log(log::Level::Error, message);
    }

    pub fn select_next(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + 1) % count;
        }
    }

    pub fn select_prev(&mut self, count: usize) {
        if count > 0 {
            self.selected = (self.selected + count - 1) % count;
        }
    }

    pub fn selected<'a>(&self, rows: &'a [DeviceRow]) -> Option<&'a DeviceRow> {
        rows.get(self.selected.min(rows.len().saturating_sub(1)))
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &NetworkStats, rows: &[DeviceRow]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], state, rows);
    render_devices(frame, chunks[1], state, rows);
    render_network(frame, chunks[2], stats);
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, state: &TuiState, rows: &[DeviceRow]) {
    let uptime = format_duration(state.started.elapsed().as_secs());
    let title = format!(" lanlight - Uptime: {} ", uptime);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let on = rows.iter().filter(|row| row.on).count();
    let text = format!("Devices: {}  |  On: {}", rows.len(), on);

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_devices(frame: &mut Frame, area: Rect, state: &TuiState, rows: &[DeviceRow]) {
    let block = Block::default()
        .title(" Devices ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let selected = state.selected(rows).map(|row| row.mac);
    let lines: Vec<Line> = rows
        .iter()
        .map(|row| {
            let power = if row.on {
                Span::styled(" on ", Style::default().fg(Color::Black).bg(Color::Yellow))
            } else {
                Span::styled(" off", Style::default().fg(Color::DarkGray))
            };
            let mut style = Style::default().fg(Color::White);
            if Some(row.mac) == selected {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Line::from(vec![
                power,
                Span::styled(
                    format!(
                        "  {}  {:<20} {:<28} {:<10} {}",
                        row.mac, row.label, row.product, row.lifecycle, row.addr
                    ),
                    style,
                ),
            ])
        })
        .collect();

    let paragraph = if lines.is_empty() {
        Paragraph::new("Waiting for devices...").style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(lines)
    };
    frame.render_widget(paragraph.block(block), area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &NetworkStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let timeouts = stats.timeout_percent();
    let lines = vec![
        Line::from(vec![
            Span::styled("Packets: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv / {} dropped",
                    stats.packets_sent, stats.packets_received, stats.packets_dropped
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(stats.bytes_sent),
                    format_bytes(stats.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("RTT: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.1}ms (+/- {:.1}ms)", stats.rtt_ms, stats.rtt_variance),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Timeouts: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ({:.1}%)", stats.timeouts, timeouts),
                Style::default().fg(if timeouts > 5.0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|entry| {
            let color = match entry.level {
                log::Level::Error => Color::Red,
                log::Level::Warn => Color::Yellow,
                _ => Color::White,
            };
            Line::from(Span::styled(entry.message.clone(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("q/ESC quit  |  Up/Down select  |  Space toggle power  |  r rescan  |  l reload")
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_wraps() {
        let mut state = TuiState::new();
        state.select_prev(3);
        assert_eq!(state.selected, 2);
        state.select_next(3);
        assert_eq!(state.selected, 0);
        state.select_next(0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..MAX_LOG_LINES + 5 {
            state.log_info(format!("line {}", i));
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().map(|e| e.message.as_str()), Some("line 5"));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
    }
}
