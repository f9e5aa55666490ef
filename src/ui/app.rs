use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::time::Duration;

use super::{Dashboard, Phase, Progress, Ui};

/// Full-screen dashboard. Raw mode and the alternate screen stay active
/// until [`UiApp::finish`] or drop.
pub struct UiApp {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    dashboard: Dashboard,
    restored: bool,
}

impl UiApp {
    pub fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        stdout.execute(EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            dashboard: Dashboard::new(),
            restored: false,
        })
    }

    fn redraw(&mut self) {
        let dashboard = &self.dashboard;
        // A failed frame is dropped; the next update draws again
        let _ = self.terminal.draw(|frame| dashboard.render(frame));
    }

    /// Show `summary`, wait for a key press, then give the terminal back
    pub fn finish(mut self, summary: &str) -> Result<()> {
        self.dashboard.clear_progress();
        self.dashboard.push_log(summary.to_string());
        self.dashboard.push_log("Press any key to exit".to_string());
        self.redraw();

        loop {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }

        self.restore()
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        terminal::disable_raw_mode()?;
        self.terminal.backend_mut().execute(LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Ui for UiApp {
    fn set_phase(&mut self, phase: Phase) {
        self.dashboard.set_phase(phase);
        self.redraw();
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.dashboard.set_info(info.into());
        self.redraw();
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        self.dashboard
            .set_progress(Progress::new(current, total, label));
        self.redraw();
    }

    fn clear_progress(&mut self) {
        self.dashboard.clear_progress();
        self.redraw();
    }

    fn log(&mut self, message: impl Into<String>) {
        self.dashboard.push_log(message.into());
        self.redraw();
    }
}

impl Drop for UiApp {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
