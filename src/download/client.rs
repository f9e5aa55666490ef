use reqwest::blocking::Client;
use reqwest::Url;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::workdir::create_work_dir;
use crate::error::DownloadError;
use crate::ui::Ui;

/// GeoLite2 City CSV archive
pub const DEFAULT_URL: &str =
    "http://geolite.maxmind.com/download/geoip/database/GeoLite2-City-CSV.zip";

/// Retrieves the archive into a directory, returning the written file.
pub trait Fetch {
    fn fetch(
        &self,
        source: &str,
        dest_dir: &Path,
        ui: &mut impl Ui,
    ) -> Result<PathBuf, DownloadError>;
}

pub struct HttpFetcher {
    client: Client,
}

/// Limit on establishing the connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

impl HttpFetcher {
    /// `idle_timeout` bounds each wait on the server (response head, then
    /// every body read). The transfer as a whole has no deadline.
    pub fn new(idle_timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(concat!("geolite2-import/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(idle_timeout)
            .build()
            .map_err(DownloadError::Client)?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    /// Stream the archive at `source` to `dest_dir`, following redirects
    fn fetch(
        &self,
        source: &str,
        dest_dir: &Path,
        ui: &mut impl Ui,
    ) -> Result<PathBuf, DownloadError> {
        let dest = dest_dir.join(file_name_from_url(source)?);
        create_work_dir(dest_dir).map_err(|source| DownloadError::Io {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        info!(url = source, dest = ?dest, "Downloading archive");
        let http_err = |e: reqwest::Error| DownloadError::Http {
            url: source.to_string(),
            source: e,
        };
        let io_err = |e: std::io::Error| DownloadError::Io {
            path: dest.clone(),
            source: e,
        };

        let response = self
            .client
            .get(source)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;

        let total_size = response.content_length().unwrap_or(0);

        let mut file = File::create(&dest).map_err(io_err)?;

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; 8192];
        let mut reader = response;

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(io_err)?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(&buffer[..bytes_read]).map_err(io_err)?;

            downloaded += bytes_read as u64;
            ui.set_progress(downloaded, total_size, format_bytes(downloaded, total_size));
        }

        file.flush().map_err(io_err)?;
        ui.clear_progress();
        ui.log(format!("Downloaded {}", format_bytes(downloaded, total_size)));
        Ok(dest)
    }
}

/// Uses an archive already on disk. The file is copied so the working set
/// can be removed without touching the original.
pub struct LocalFetcher;

impl Fetch for LocalFetcher {
    fn fetch(
        &self,
        source: &str,
        dest_dir: &Path,
        ui: &mut impl Ui,
    ) -> Result<PathBuf, DownloadError> {
        let source_path = Path::new(source);
        let name = source_path
            .file_name()
            .ok_or_else(|| DownloadError::InvalidUrl(source.to_string()))?;
        let dest = dest_dir.join(name);

        create_work_dir(dest_dir).map_err(|e| DownloadError::Io {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        info!(source = ?source_path, dest = ?dest, "Copying local archive");
        let copied = fs::copy(source_path, &dest).map_err(|e| DownloadError::Io {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        ui.log(format!("Copied {}", format_bytes(copied, 0)));
        Ok(dest)
    }
}

/// Name of the final path segment, used as the local file name
pub fn file_name_from_url(url: &str) -> Result<String, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::InvalidUrl(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::InvalidUrl(url.to_string()))
}

/// Format bytes as human-readable string
fn format_bytes(current: u64, total: u64) -> String {
    fn fmt(bytes: u64) -> String {
        if bytes >= 1_000_000_000 {
            format!("{:.1} GB", bytes as f64 / 1_000_000_000.0)
        } else if bytes >= 1_000_000 {
            format!("{:.1} MB", bytes as f64 / 1_000_000.0)
        } else if bytes >= 1_000 {
            format!("{:.1} KB", bytes as f64 / 1_000.0)
        } else {
            format!("{} B", bytes)
        }
    }
    if total == 0 {
        return fmt(current);
    }
    format!("{} / {}", fmt(current), fmt(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::SilentUi;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500, 999), "500 B / 999 B");
        assert_eq!(format_bytes(1500, 3000), "1.5 KB / 3.0 KB");
        assert_eq!(format_bytes(1_500_000, 3_000_000), "1.5 MB / 3.0 MB");
        assert_eq!(format_bytes(2_000_000_000, 0), "2.0 GB");
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url(DEFAULT_URL).unwrap(),
            "GeoLite2-City-CSV.zip"
        );
        assert_eq!(
            file_name_from_url("https://example.com/a/b/data.zip?token=1").unwrap(),
            "data.zip"
        );
        assert!(file_name_from_url("https://example.com/").is_err());
        assert!(file_name_from_url("not a url").is_err());
    }

    /// Serve `chunks` pieces of `body` with `gap` between them
    fn trickle_server(body: &'static [u8], chunks: usize, gap: Duration) -> String {
        use std::io::BufRead;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 2 {
                line.clear();
            }

            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
            for piece in body.chunks(body.len().div_ceil(chunks)) {
                std::thread::sleep(gap);
                stream.write_all(piece).unwrap();
                stream.flush().unwrap();
            }
        });

        format!("http://{}/data/GeoLite2-City-CSV.zip", addr)
    }

    #[test]
    fn test_slow_transfer_outlasts_idle_timeout() {
        let body: &'static [u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        // 6 gaps of 400ms: the transfer takes longer than the 1s idle limit
        let url = trickle_server(body, 6, Duration::from_millis(400));
        let tmp = tempfile::tempdir().unwrap();

        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
        let path = fetcher.fetch(&url, tmp.path(), &mut SilentUi::new()).unwrap();

        assert_eq!(path, tmp.path().join("GeoLite2-City-CSV.zip"));
        assert_eq!(fs::read(&path).unwrap(), body);
    }

    #[test]
    fn test_local_fetcher_copies_into_work_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("archive.zip");
        fs::write(&source, b"PK").unwrap();

        let dest_dir = tmp.path().join("nested/work");
        let fetched = LocalFetcher
            .fetch(source.to_str().unwrap(), &dest_dir, &mut SilentUi::new())
            .unwrap();

        assert_eq!(fetched, dest_dir.join("archive.zip"));
        assert!(fetched.is_file());
        assert!(source.is_file());
    }

    #[test]
    fn test_local_fetcher_missing_source() {
        let tmp = tempfile::tempdir().unwrap();
        let result = LocalFetcher.fetch(
            tmp.path().join("missing.zip").to_str().unwrap(),
            tmp.path(),
            &mut SilentUi::new(),
        );
        assert!(matches!(result, Err(DownloadError::Io { .. })));
    }
}
