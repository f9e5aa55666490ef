use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::sqlite::{quote_ident, Store};
use crate::error::LoadError;
use crate::parser::{SourceRecord, SqlValue};
use crate::schema::TableSchema;
use crate::ui::Ui;

/// Counters for one file load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStats {
    pub rows_loaded: u64,
    /// Rows dropped by validation (empty or malformed key)
    pub rows_skipped: u64,
    /// Insert statements issued, successful or not
    pub batches: u64,
    pub failed_batches: u64,
    pub failed_rows: u64,
    pub elapsed_secs: f64,
}

impl LoadStats {
    /// True when every valid row landed
    pub fn is_complete(&self) -> bool {
        self.failed_batches == 0
    }
}

/// SQLite's default limit on bound parameters per statement
pub const MAX_BOUND_PARAMS: usize = 32766;

/// Rows per insert for `schema`: `requested`, at least 1, capped so one
/// statement stays within [`MAX_BOUND_PARAMS`]
pub fn effective_batch_size(schema: &TableSchema, requested: usize) -> usize {
    let limit = (MAX_BOUND_PARAMS / schema.columns.len().max(1)).max(1);
    if requested > limit {
        warn!(
            table = schema.name,
            requested,
            limit,
            "Batch size exceeds the statement parameter limit, clamping"
        );
    }
    requested.clamp(1, limit)
}

/// Build a multi-row INSERT for `rows` records
pub fn generate_insert(schema: &TableSchema, rows: usize) -> String {
    let columns: Vec<String> = schema.columns.iter().map(|c| quote_ident(c.name)).collect();
    let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(schema.name),
        columns.join(", "),
        vec![placeholders.as_str(); rows].join(", ")
    )
}

/// Stream a CSV file into `R::schema()` in batches of `batch_size` rows.
///
/// Only failing to open or read the file is an error. A failed batch is
/// logged and counted, then loading continues with the next batch.
pub fn load_csv<R: SourceRecord>(
    store: &impl Store,
    path: &Path,
    batch_size: usize,
    ui: &mut impl Ui,
) -> Result<LoadStats, LoadError> {
    let schema = R::schema();
    let batch_size = effective_batch_size(schema, batch_size);
    let start = Instant::now();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    info!(table = schema.name, file = ?path, batch_size, "Loading CSV");

    let mut stats = LoadStats::default();
    let mut values: Vec<SqlValue> = Vec::with_capacity(batch_size * schema.columns.len());
    let mut pending = 0usize;

    for result in reader.deserialize::<R::Raw>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => {
                return Err(LoadError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => {
                debug!(table = schema.name, error = %e, "Skipping unreadable row");
                stats.rows_skipped += 1;
                continue;
            }
        };

        let Some(record) = R::from_raw(raw) else {
            stats.rows_skipped += 1;
            continue;
        };

        record.push_values(&mut values);
        pending += 1;

        if pending >= batch_size {
            insert_batch(store, schema, &mut values, pending, &mut stats);
            pending = 0;
            ui.set_progress(
                stats.rows_loaded + stats.failed_rows,
                0,
                format!("{}: {} rows", schema.name, stats.rows_loaded),
            );
        }
    }

    // Insert remaining batch
    if pending > 0 {
        insert_batch(store, schema, &mut values, pending, &mut stats);
    }

    stats.elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        table = schema.name,
        rows = stats.rows_loaded,
        skipped = stats.rows_skipped,
        failed_batches = stats.failed_batches,
        "Loaded in {:.1}s",
        stats.elapsed_secs
    );
    ui.log(format!(
        "{}: {} rows in {:.1}s",
        schema.name, stats.rows_loaded, stats.elapsed_secs
    ));

    Ok(stats)
}

/// Insert a batch of rows; failures are recorded, not returned
fn insert_batch(
    store: &impl Store,
    schema: &TableSchema,
    values: &mut Vec<SqlValue>,
    rows: usize,
    stats: &mut LoadStats,
) {
    let sql = generate_insert(schema, rows);
    stats.batches += 1;

    match store.execute(&sql, values) {
        Ok(_) => stats.rows_loaded += rows as u64,
        Err(e) => {
            error!(
                table = schema.name,
                batch = stats.batches,
                rows,
                error = %e,
                "Batch insert failed"
            );
            stats.failed_batches += 1;
            stats.failed_rows += rows as u64;
        }
    }

    values.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{BlockRecord, LocationRecord};
    use crate::schema::{BLOCKS, LOCATIONS};
    use crate::ui::SilentUi;
    use crate::writer::{ensure_table, SqliteStore};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const LOCATION_HEADER: &str = "geoname_id,locale_code,continent_code,continent_name,country_iso_code,country_name,subdivision_1_iso_code,subdivision_1_name,subdivision_2_iso_code,subdivision_2_name,city_name,metro_code,time_zone";

    fn write_csv(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_generate_insert() {
        let sql = generate_insert(&BLOCKS, 2);
        assert!(sql.starts_with("INSERT INTO \"geoip_block\" (\"network\", \"range_start\""));
        assert_eq!(sql.matches('?').count(), 2 * BLOCKS.columns.len());
        assert_eq!(sql.matches("), (").count(), 1);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let lines = vec![
            LOCATION_HEADER.to_string(),
            "5128581,en,NA,\"North America\",US,\"United States\",NY,\"New York\",,,\"New York\",501,America/New_York".to_string(),
            ",en,NA,,,,,,,,,,".to_string(),
            "abc,en,NA,,,,,,,,,,".to_string(),
            "2988507,en,EU,Europe,FR,France,IDF,\"Île-de-France\",75,Paris,Paris,,Europe/Paris".to_string(),
            "trailer".to_string(),
        ];
        let file = write_csv(&lines);

        let store = SqliteStore::open_in_memory().unwrap();
        ensure_table(&store, &LOCATIONS).unwrap();

        let stats =
            load_csv::<LocationRecord>(&store, file.path(), 500, &mut SilentUi::new()).unwrap();
        assert_eq!(stats.rows_loaded, 2);
        assert_eq!(stats.rows_skipped, 3);
        assert_eq!(stats.batches, 1);
        assert!(stats.is_complete());
        assert_eq!(store.count_rows("geoip_location").unwrap(), 2);

        let (city, metro): (String, i64) = store
            .connection()
            .query_row(
                "SELECT city_name, metro_code FROM geoip_location WHERE geoname_id = 5128581",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(city, "New York");
        assert_eq!(metro, 501);
    }

    #[test]
    fn test_duplicate_key_fails_only_its_batch() {
        let header = "network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude";
        let lines = vec![
            header.to_string(),
            "1.0.0.0/24,1,1,,0,0,,1.0,2.0".to_string(),
            "1.0.1.0/24,1,1,,0,0,,1.0,2.0".to_string(),
            // second batch collides with the first
            "1.0.0.0/24,1,1,,0,0,,1.0,2.0".to_string(),
            "1.0.2.0/24,1,1,,0,0,,1.0,2.0".to_string(),
            "1.0.3.0/24,1,1,,0,0,,1.0,2.0".to_string(),
        ];
        let file = write_csv(&lines);

        let store = SqliteStore::open_in_memory().unwrap();
        ensure_table(&store, &BLOCKS).unwrap();

        let stats =
            load_csv::<BlockRecord>(&store, file.path(), 2, &mut SilentUi::new()).unwrap();
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.failed_batches, 1);
        assert_eq!(stats.failed_rows, 2);
        assert_eq!(stats.rows_loaded, 3);
        assert!(!stats.is_complete());
        assert_eq!(store.count_rows("geoip_block").unwrap(), 3);
    }

    #[test]
    fn test_effective_batch_size() {
        assert_eq!(effective_batch_size(&BLOCKS, 0), 1);
        assert_eq!(effective_batch_size(&BLOCKS, 2000), 2000);
        let limit = MAX_BOUND_PARAMS / BLOCKS.columns.len();
        assert_eq!(effective_batch_size(&BLOCKS, 3000), limit);
        assert!(limit * BLOCKS.columns.len() <= MAX_BOUND_PARAMS);
    }

    #[test]
    fn test_oversized_batch_is_clamped() {
        let header = "network,geoname_id,registered_country_geoname_id,represented_country_geoname_id,is_anonymous_proxy,is_satellite_provider,postal_code,latitude,longitude";
        let mut lines = vec![header.to_string()];
        for i in 0..3000u32 {
            lines.push(format!("10.{}.{}.0/24,1,1,,0,0,,1.0,2.0", i / 256, i % 256));
        }
        let file = write_csv(&lines);

        let store = SqliteStore::open_in_memory().unwrap();
        ensure_table(&store, &BLOCKS).unwrap();

        let stats =
            load_csv::<BlockRecord>(&store, file.path(), 3000, &mut SilentUi::new()).unwrap();
        assert_eq!(stats.failed_batches, 0);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.rows_loaded, 3000);
        assert_eq!(store.count_rows("geoip_block").unwrap(), 3000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = load_csv::<LocationRecord>(
            &store,
            Path::new("/nonexistent/GeoLite2-City-Locations-en.csv"),
            500,
            &mut SilentUi::new(),
        );
        assert!(matches!(result, Err(LoadError::Open { .. })));
    }
}
