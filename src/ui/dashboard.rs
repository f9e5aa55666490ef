use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::{Phase, Progress};

const LOG_CAPACITY: usize = 200;

/// Everything the import screen shows, independent of the terminal
pub struct Dashboard {
    phase: Phase,
    /// Furthest stage entered, kept so a failure can be pinned to it
    reached: Option<usize>,
    info: String,
    progress: Option<Progress>,
    log: VecDeque<(Duration, String)>,
    started: Instant,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            reached: None,
            info: String::new(),
            progress: None,
            log: VecDeque::with_capacity(LOG_CAPACITY),
            started: Instant::now(),
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if let Some(index) = phase.stage_index() {
            self.reached = Some(index);
        }
        self.phase = phase;
    }

    pub fn set_info(&mut self, info: String) {
        self.info = info;
    }

    pub fn set_progress(&mut self, progress: Progress) {
        self.progress = Some(progress);
    }

    pub fn clear_progress(&mut self) {
        self.progress = None;
    }

    pub fn push_log(&mut self, message: String) {
        if self.log.len() == LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back((self.started.elapsed(), message));
    }

    pub fn render(&self, frame: &mut Frame) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(Phase::STAGES.len() as u16 + 2),
                Constraint::Length(3),
                Constraint::Min(4),
            ])
            .split(frame.area());
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(30), Constraint::Min(20)])
            .split(rows[0]);

        self.render_stages(frame, top[0]);
        self.render_status(frame, top[1]);
        self.render_progress(frame, rows[1]);
        self.render_log(frame, rows[2]);
    }

    fn stage_mark(&self, index: usize) -> (&'static str, Style) {
        let reached = self.reached.is_some_and(|r| index <= r);
        let current = self.reached == Some(index);

        match self.phase {
            Phase::Done => ("✓", Style::default().fg(Color::Green)),
            Phase::Failed if current => ("✗", Style::default().fg(Color::Red)),
            _ if current => (
                "▸",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            _ if reached => ("✓", Style::default().fg(Color::Green)),
            _ => ("·", Style::default().fg(Color::DarkGray)),
        }
    }

    fn render_stages(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = Phase::STAGES
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                let (mark, style) = self.stage_mark(index);
                Line::from(vec![
                    Span::styled(format!(" {} ", mark), style),
                    Span::styled(stage.to_string(), style),
                ])
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Stages ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let color = match self.phase {
            Phase::Done => Color::Green,
            Phase::Failed => Color::Red,
            _ => Color::Cyan,
        };
        let lines = vec![
            Line::from(Span::styled(
                self.phase.to_string(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(&self.info, Style::default().fg(Color::Gray))),
            Line::from(Span::styled(
                format!("elapsed {}", clock(self.started.elapsed())),
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" GeoLite2 Import ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_progress(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::LEFT | Borders::RIGHT)
            .border_style(Style::default().fg(Color::Blue));

        let Some(progress) = &self.progress else {
            frame.render_widget(block, area);
            return;
        };

        let label = match progress.total {
            0 => progress.label.clone(),
            _ => format!("{} ({:.0}%)", progress.label, progress.ratio() * 100.0),
        };
        let gauge = Gauge::default()
            .block(block)
            .gauge_style(Style::default().fg(Color::Cyan).bg(Color::DarkGray))
            .ratio(progress.ratio())
            .label(label);
        frame.render_widget(gauge, area);
    }

    fn render_log(&self, frame: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;
        let skip = self.log.len().saturating_sub(visible);
        let newest = self.log.len().saturating_sub(1);

        let items: Vec<ListItem> = self
            .log
            .iter()
            .enumerate()
            .skip(skip)
            .map(|(i, (at, message))| {
                let color = if i == newest { Color::White } else { Color::DarkGray };
                ListItem::new(Line::from(vec![
                    Span::styled(format!(" {} ", clock(*at)), Style::default().fg(Color::Blue)),
                    Span::styled(message.as_str(), Style::default().fg(color)),
                ]))
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Activity ")
            .border_style(Style::default().fg(Color::Blue));
        frame.render_widget(List::new(items).block(block), area);
    }
}

/// `mm:ss` since the dashboard was created
fn clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn screen(dashboard: &Dashboard) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|frame| dashboard.render(frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_failure_is_pinned_to_the_last_stage() {
        let mut dashboard = Dashboard::new();
        dashboard.set_phase(Phase::Downloading);
        dashboard.set_phase(Phase::Extracting);
        dashboard.set_phase(Phase::Failed);

        assert_eq!(dashboard.stage_mark(0).0, "✓");
        assert_eq!(dashboard.stage_mark(1).0, "✗");
        assert_eq!(dashboard.stage_mark(2).0, "·");
    }

    #[test]
    fn test_renders_phase_progress_and_log() {
        let mut dashboard = Dashboard::new();
        dashboard.set_phase(Phase::LoadingBlock);
        dashboard.set_info("identity 42, locale en".to_string());
        dashboard.set_progress(Progress::new(1, 4, "geoip_block 2000 rows"));
        dashboard.push_log("Archive contents confirmed".to_string());

        let text = screen(&dashboard);
        assert!(text.contains("Loading IP blocks"));
        assert!(text.contains("identity 42, locale en"));
        assert!(text.contains("(25%)"));
        assert!(text.contains("Archive contents confirmed"));
    }

    #[test]
    fn test_log_is_bounded() {
        let mut dashboard = Dashboard::new();
        for i in 0..LOG_CAPACITY + 5 {
            dashboard.push_log(format!("entry {}", i));
        }
        assert_eq!(dashboard.log.len(), LOG_CAPACITY);
        assert_eq!(dashboard.log.front().unwrap().1, "entry 5");
    }

    #[test]
    fn test_clock_format() {
        assert_eq!(clock(Duration::from_secs(0)), "00:00");
        assert_eq!(clock(Duration::from_secs(754)), "12:34");
    }
}
