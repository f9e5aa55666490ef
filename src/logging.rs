//! Logging setup.
//!
//! The binary installs one global `fmt` subscriber on stderr. A run may
//! additionally redirect its diagnostics to a file with [`scoped_file`]; the
//! returned guard restores the previous subscriber when dropped.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use crate::download::create_work_dir;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global console subscriber. `RUST_LOG` overrides `default_level`.
pub fn init(default_level: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Send this thread's log output to `path` (appending) until the guard drops
pub fn scoped_file(path: &Path) -> io::Result<DefaultGuard> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_work_dir(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();

    Ok(tracing::subscriber::set_default(subscriber))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_file_captures_events() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("logs/geoip.log");

        {
            let _guard = scoped_file(&log_path).unwrap();
            tracing::warn!("inside the scope");
        }
        tracing::warn!("outside the scope");

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("inside the scope"));
        assert!(!contents.contains("outside the scope"));
    }
}
