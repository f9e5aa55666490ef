//! Import run: fetch → extract → schema → load locations → load blocks → cleanup.
//!
//! Stages run strictly in sequence on the calling thread. Download, extract
//! and schema failures end the run; the working directory is removed on both
//! the success and the failure path.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::download::{
    default_base_dir, extract_archive, validate_locale, work_dir_for, Fetch, RunLock, WorkingSet,
    DEFAULT_URL,
};
use crate::error::{DownloadError, ExtractError, PipelineError, StoreError};
use crate::logging;
use crate::parser::{BlockRecord, LocationRecord};
use crate::schema::{BLOCKS, LOCATIONS};
use crate::ui::{Phase, Ui};
use crate::writer::{ensure_table, load_csv, LoadStats, Store, TableState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Archive location handed to the fetcher
    pub url: String,
    /// Parent of the per-identity working directories
    pub base_dir: PathBuf,
    pub identity: String,
    pub locale: String,
    pub location_batch_size: usize,
    pub block_batch_size: usize,
    pub time_limit_secs: u64,
    /// Diagnostic log destination for the duration of a run
    pub log_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            base_dir: default_base_dir(),
            identity: "default".to_string(),
            locale: "en".to_string(),
            location_batch_size: LOCATIONS.batch_size,
            block_batch_size: BLOCKS.batch_size,
            time_limit_secs: 600,
            log_file: None,
        }
    }
}

impl PipelineConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub identity: String,
    pub locale: String,
    pub location_table: TableState,
    pub block_table: TableState,
    pub location: LoadStats,
    pub block: LoadStats,
    pub elapsed_secs: f64,
}

impl RunReport {
    /// False when any batch failed and the tables have gaps
    pub fn is_complete(&self) -> bool {
        self.location.is_complete() && self.block.is_complete()
    }
}

/// Raises the store's time allowance and restores the previous value on drop
pub struct TimeLimitGuard<'s, S: Store> {
    store: &'s S,
    previous: Duration,
}

impl<'s, S: Store> TimeLimitGuard<'s, S> {
    pub fn install(store: &'s S, limit: Duration) -> Result<Self, StoreError> {
        let previous = store.time_limit()?;
        store.set_time_limit(limit)?;
        Ok(Self { store, previous })
    }
}

impl<S: Store> Drop for TimeLimitGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.set_time_limit(self.previous) {
            warn!(error = %e, "Failed to restore store time limit");
        }
    }
}

struct Transitions<'u, U: Ui> {
    phase: Phase,
    ui: &'u mut U,
}

impl<U: Ui> Transitions<'_, U> {
    fn enter(&mut self, next: Phase) {
        info!(from = ?self.phase, to = ?next, "{}", next);
        self.phase = next;
        self.ui.set_phase(next);
    }
}

pub struct Pipeline<F: Fetch> {
    config: PipelineConfig,
    fetcher: F,
}

impl<F: Fetch> Pipeline<F> {
    pub fn new(config: PipelineConfig, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    /// Working directory a run for the configured identity uses
    pub fn work_dir(&self) -> PathBuf {
        work_dir_for(&self.config.base_dir, &self.config.identity)
    }

    /// Run the whole import against `store`
    pub fn run<S: Store, U: Ui>(&self, store: &S, ui: &mut U) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let config = &self.config;

        let _log_guard = match &config.log_file {
            Some(path) => Some(logging::scoped_file(path).map_err(|source| {
                PipelineError::Workspace {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        info!(identity = %config.identity, locale = %config.locale, "Starting GeoIP CSV import");
        if let Some(path) = &config.log_file {
            info!(log_file = ?path, "Diagnostics redirected");
        }

        let lock_path = RunLock::path_for(&config.base_dir, &config.identity);
        let _lock = RunLock::acquire(lock_path.clone()).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                PipelineError::Busy(lock_path.clone())
            } else {
                PipelineError::Workspace {
                    path: lock_path.clone(),
                    source,
                }
            }
        })?;

        let _time_limit =
            TimeLimitGuard::install(store, config.time_limit()).map_err(PipelineError::TimeLimit)?;

        let working = WorkingSet::new(&config.base_dir, &config.identity);
        let mut state = Transitions {
            phase: Phase::Idle,
            ui,
        };
        state.ui.set_phase(Phase::Idle);
        state
            .ui
            .set_info(format!("identity {}, locale {}", config.identity, config.locale));

        let result = working
            .trash()
            .map_err(|source| PipelineError::Workspace {
                path: working.dir().to_path_buf(),
                source,
            })
            .and_then(|stale| {
                if stale {
                    info!(dir = ?working.dir(), "Removed leftovers of a previous run");
                }
                self.execute(store, &mut state, &working)
            });

        match result {
            Ok((location_table, block_table, location, block)) => {
                state.enter(Phase::CleaningUp);
                self.cleanup(&working);
                state.enter(Phase::Done);

                let report = RunReport {
                    identity: config.identity.clone(),
                    locale: config.locale.clone(),
                    location_table,
                    block_table,
                    location,
                    block,
                    elapsed_secs: start.elapsed().as_secs_f64(),
                };
                if report.is_complete() {
                    info!("Done importing GeoIP in {:.1}s", report.elapsed_secs);
                } else {
                    warn!(
                        failed_location_rows = report.location.failed_rows,
                        failed_block_rows = report.block.failed_rows,
                        "Import finished with failed batches"
                    );
                }
                Ok(report)
            }
            Err(e) => {
                error!(phase = ?state.phase, error = %e, "GeoIP import failed");
                state.ui.log(format!("Failed: {}", e));
                state.enter(Phase::Failed);
                self.cleanup(&working);
                Err(e)
            }
        }
    }

    fn execute<S: Store, U: Ui>(
        &self,
        store: &S,
        state: &mut Transitions<'_, U>,
        working: &WorkingSet,
    ) -> Result<(TableState, TableState, LoadStats, LoadStats), PipelineError> {
        let config = &self.config;
        validate_locale(&config.locale)?;

        state.enter(Phase::Downloading);
        let archive = self.fetcher.fetch(&config.url, working.dir(), &mut *state.ui)?;
        if !archive.is_file() {
            return Err(DownloadError::MissingOutput(archive).into());
        }
        info!(archive = ?archive, "Archive downloaded");

        state.enter(Phase::Extracting);
        let payload = extract_archive(&archive, &config.locale)?;
        if let Some(missing) = payload.missing() {
            return Err(ExtractError::MissingPayload(missing.to_path_buf()).into());
        }
        state.ui.log("Archive contents confirmed");

        state.enter(Phase::SchemaPreparing);
        let location_table = ensure_table(store, &LOCATIONS)?;
        let block_table = ensure_table(store, &BLOCKS)?;

        state.enter(Phase::LoadingLocation);
        let location = load_csv::<LocationRecord>(
            store,
            &payload.location_file,
            config.location_batch_size,
            &mut *state.ui,
        )?;

        state.enter(Phase::LoadingBlock);
        let block = load_csv::<BlockRecord>(
            store,
            &payload.block_file,
            config.block_batch_size,
            &mut *state.ui,
        )?;

        Ok((location_table, block_table, location, block))
    }

    fn cleanup(&self, working: &WorkingSet) {
        match working.trash() {
            Ok(_) => info!(dir = ?working.dir(), "Working directory removed"),
            Err(e) => error!(dir = ?working.dir(), error = %e, "Failed to remove working directory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::SqliteStore;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.locale, "en");
        assert_eq!(config.location_batch_size, 500);
        assert_eq!(config.block_batch_size, 2000);
        assert_eq!(config.time_limit(), Duration::from_secs(600));
        assert!(config.url.ends_with("GeoLite2-City-CSV.zip"));
    }

    #[test]
    fn test_time_limit_guard_restores() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_time_limit(Duration::from_millis(250)).unwrap();

        {
            let _guard = TimeLimitGuard::install(&store, Duration::from_secs(600)).unwrap();
            assert_eq!(store.time_limit().unwrap(), Duration::from_secs(600));
        }
        assert_eq!(store.time_limit().unwrap(), Duration::from_millis(250));
    }
}
