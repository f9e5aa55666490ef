pub mod cli;
pub mod download;
pub mod error;
pub mod logging;
pub mod parser;
pub mod pipeline;
pub mod schema;
pub mod ui;
pub mod writer;

pub use cli::{Cli, Commands};
pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use ui::{Phase, SilentUi, Ui, UiApp};
