use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::ExtractError;

/// Locales the dataset publishes location files for
pub const LOCALES: &[&str] = &["de", "en", "es", "fr", "ja", "pt-BR", "ru", "zh-CN"];

pub const BLOCK_FILE: &str = "GeoLite2-City-Blocks-IPv4.csv";

pub fn location_file_name(locale: &str) -> String {
    format!("GeoLite2-City-Locations-{}.csv", locale)
}

pub fn validate_locale(locale: &str) -> Result<(), ExtractError> {
    if LOCALES.contains(&locale) {
        Ok(())
    } else {
        Err(ExtractError::UnsupportedLocale(locale.to_string()))
    }
}

/// The two CSV files a run loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadFiles {
    pub location_file: PathBuf,
    pub block_file: PathBuf,
}

impl PayloadFiles {
    /// First payload path that is not a regular file
    pub fn missing(&self) -> Option<&Path> {
        [&self.location_file, &self.block_file]
            .into_iter()
            .find(|p| !p.is_file())
            .map(PathBuf::as_path)
    }
}

/// Extract a zip archive next to itself and resolve the payload files.
///
/// Missing payload files are logged here; callers check
/// [`PayloadFiles::missing`]. The archive is deleted afterwards.
pub fn extract_archive(zip_path: &Path, locale: &str) -> Result<PayloadFiles, ExtractError> {
    let base_dir = zip_path.parent().unwrap_or_else(|| Path::new("."));

    let file = File::open(zip_path).map_err(|source| ExtractError::Io {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|source| ExtractError::Archive {
            path: zip_path.to_path_buf(),
            source,
        })?;

    info!(archive = ?zip_path, entries = archive.len(), "Extracting");
    archive
        .extract(base_dir)
        .map_err(|source| ExtractError::Archive {
            path: zip_path.to_path_buf(),
            source,
        })?;
    drop(archive);

    let payload_dir = locate_payload_dir(base_dir)?;
    info!(dir = ?payload_dir, "Payload directory");

    let files = PayloadFiles {
        location_file: payload_dir.join(location_file_name(locale)),
        block_file: payload_dir.join(BLOCK_FILE),
    };

    for path in [&files.location_file, &files.block_file] {
        if !path.is_file() {
            warn!(file = ?path, "Payload file not found in archive");
        }
    }

    if let Err(e) = fs::remove_file(zip_path) {
        warn!(archive = ?zip_path, error = %e, "Failed to delete downloaded archive");
    }

    Ok(files)
}

/// The single directory the archive unpacked into.
///
/// Its name is versioned, so it is found by listing rather than by name.
/// Zero or several candidate directories is an error.
pub fn locate_payload_dir(base_dir: &Path) -> Result<PathBuf, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: base_dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(base_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_type().map_err(io_err)?.is_dir() {
            dirs.push(entry.path());
        }
    }

    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        found => Err(ExtractError::PayloadDirectory {
            dir: base_dir.to_path_buf(),
            found,
        }),
    }
}
