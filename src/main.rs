use anyhow::{bail, Context, Result};
use geolite2_import::{
    cli::{Cli, Commands},
    download::{default_base_dir, extract_archive, Fetch, HttpFetcher, LocalFetcher},
    logging,
    parser::{BlockRecord, LocationRecord},
    pipeline::{Pipeline, PipelineConfig, RunReport},
    schema::{get_table, table_names, ALL_TABLES, BLOCKS, LOCATIONS},
    ui::{SilentUi, UiApp},
    writer::{ensure_table, generate_create_table, load_csv, LoadStats, SqliteStore},
};
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Import {
            db,
            url,
            archive,
            locale,
            identity,
            base_dir,
            log_file,
            time_limit,
            batch,
            tui,
            json,
        } => {
            // The terminal UI owns the screen; console logging would garble it
            if !tui {
                logging::init(&cli.log_level)?;
            }

            let config = PipelineConfig {
                url: match &archive {
                    Some(path) => path.to_string_lossy().into_owned(),
                    None => url,
                },
                base_dir: base_dir.unwrap_or_else(default_base_dir),
                identity,
                locale,
                location_batch_size: batch.location_batch_size,
                block_batch_size: batch.block_batch_size,
                time_limit_secs: time_limit,
                log_file,
            };

            let store = SqliteStore::open(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;

            let report = if archive.is_some() {
                run_pipeline(&Pipeline::new(config, LocalFetcher), &store, tui)?
            } else {
                let fetcher = HttpFetcher::new(config.time_limit())?;
                run_pipeline(&Pipeline::new(config, fetcher), &store, tui)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_stats(LOCATIONS.name, &report.location);
                print_stats(BLOCKS.name, &report.block);
                println!(
                    "\nImported into {:?} in {:.1}s",
                    db, report.elapsed_secs
                );
            }

            if !report.is_complete() {
                eprintln!("warning: some batches failed; tables are incomplete");
            }
        }

        Commands::Download {
            output,
            url,
            locale,
            time_limit,
        } => {
            logging::init(&cli.log_level)?;

            let fetcher = HttpFetcher::new(Duration::from_secs(time_limit))?;
            let archive = fetcher.fetch(&url, &output, &mut SilentUi::new())?;
            let files = extract_archive(&archive, &locale)?;
            if let Some(missing) = files.missing() {
                bail!("Archive did not contain {:?}", missing);
            }

            println!("Location file: {:?}", files.location_file);
            println!("Block file:    {:?}", files.block_file);
        }

        Commands::Load {
            db,
            location_csv,
            block_csv,
            batch,
        } => {
            logging::init(&cli.log_level)?;
            let start = Instant::now();

            let store = SqliteStore::open(&db)
                .with_context(|| format!("Failed to open database {:?}", db))?;
            let mut ui = SilentUi::new();

            ensure_table(&store, &LOCATIONS)?;
            ensure_table(&store, &BLOCKS)?;

            let location = load_csv::<LocationRecord>(
                &store,
                &location_csv,
                batch.location_batch_size,
                &mut ui,
            )?;
            let block =
                load_csv::<BlockRecord>(&store, &block_csv, batch.block_batch_size, &mut ui)?;

            print_stats(LOCATIONS.name, &location);
            print_stats(BLOCKS.name, &block);
            println!(
                "\nLoaded into {:?} in {:.1}s",
                db,
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Schema { table } => {
            let tables = match table.as_deref() {
                None => ALL_TABLES.to_vec(),
                Some(name) => match get_table(name) {
                    Some(schema) => vec![schema],
                    None => bail!(
                        "Unknown table {:?}, expected one of {}",
                        name,
                        table_names().join(", ")
                    ),
                },
            };
            for schema in tables {
                println!("{};\n", generate_create_table(schema));
            }
        }
    }

    Ok(())
}

fn run_pipeline<F: Fetch>(
    pipeline: &Pipeline<F>,
    store: &SqliteStore,
    tui: bool,
) -> Result<RunReport> {
    if !tui {
        return pipeline
            .run(store, &mut SilentUi::new())
            .context("GeoIP import failed");
    }

    let mut ui = UiApp::new()?;
    let result = pipeline.run(store, &mut ui);
    let summary = match &result {
        Ok(report) => format!(
            "Loaded {} locations and {} blocks in {:.1}s",
            report.location.rows_loaded, report.block.rows_loaded, report.elapsed_secs
        ),
        Err(e) => format!("Import failed: {}", e),
    };
    ui.finish(&summary)?;

    result.context("GeoIP import failed")
}

fn print_stats(table: &str, stats: &LoadStats) {
    println!(
        "{:16} {:>10} rows  {:>6} skipped  {:>4} batches ({} failed)  {:.1}s",
        table,
        stats.rows_loaded,
        stats.rows_skipped,
        stats.batches,
        stats.failed_batches,
        stats.elapsed_secs
    );
}
