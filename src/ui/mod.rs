//! Progress reporting for import runs.
//!
//! The pipeline talks to a [`Ui`]; [`SilentUi`] drops everything and
//! [`UiApp`] draws a ratatui dashboard on the alternate screen.

mod app;
mod dashboard;

use serde::Serialize;
use std::fmt;

pub use app::UiApp;
pub use dashboard::Dashboard;

/// Run states of the import pipeline.
///
/// Each state advances only when its stage succeeds; `Failed` is reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Downloading,
    Extracting,
    SchemaPreparing,
    LoadingLocation,
    LoadingBlock,
    CleaningUp,
    Done,
    Failed,
}

impl Phase {
    /// Stages of a successful run, in order
    pub const STAGES: [Phase; 6] = [
        Phase::Downloading,
        Phase::Extracting,
        Phase::SchemaPreparing,
        Phase::LoadingLocation,
        Phase::LoadingBlock,
        Phase::CleaningUp,
    ];

    fn stage_index(self) -> Option<usize> {
        Self::STAGES.iter().position(|s| *s == self)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Idle => "Preparing working directory",
            Phase::Downloading => "Downloading archive",
            Phase::Extracting => "Extracting CSV files",
            Phase::SchemaPreparing => "Preparing tables",
            Phase::LoadingLocation => "Loading locations",
            Phase::LoadingBlock => "Loading IP blocks",
            Phase::CleaningUp => "Cleaning up",
            Phase::Done => "Complete",
            Phase::Failed => "Failed",
        };
        f.write_str(text)
    }
}

/// Position within the current stage
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current: u64,
    /// Zero when the size is unknown
    pub total: u64,
    pub label: String,
}

impl Progress {
    pub fn new(current: u64, total: u64, label: impl Into<String>) -> Self {
        Self {
            current,
            total,
            label: label.into(),
        }
    }

    pub fn ratio(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => (self.current as f64 / total as f64).min(1.0),
        }
    }
}

/// Receiver of run progress
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
}

/// Discards all progress; used for plain console runs and tests
#[derive(Debug, Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_ratio() {
        assert_eq!(Progress::new(5, 0, "rows").ratio(), 0.0);
        assert_eq!(Progress::new(50, 200, "bytes").ratio(), 0.25);
        assert_eq!(Progress::new(300, 200, "bytes").ratio(), 1.0);
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::LoadingLocation).unwrap(),
            "\"loading_location\""
        );
        assert_eq!(Phase::SchemaPreparing.to_string(), "Preparing tables");
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Phase::Downloading.stage_index(), Some(0));
        assert_eq!(Phase::CleaningUp.stage_index(), Some(5));
        assert_eq!(Phase::Failed.stage_index(), None);
    }
}
