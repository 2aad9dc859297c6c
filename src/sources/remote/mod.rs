//! Downloading archives over HTTP, skipping ones that have not changed.
//!
//! Every download records the server's caching metadata (`ETag`,
//! `Last-Modified`, `Content-Length`) in a [`MetadataStore`]. On the next
//! run a `HEAD` request is compared against that record and the download is
//! skipped when nothing changed.

mod store;

pub use store::{MetadataStore, METADATA_FILE};

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderName, CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::util::config::NetConfig;
use crate::util::shell::{Progress, Shell, Status};

/// Errors while inspecting or downloading a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch `{url}`")]
    TransferFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to fetch `{url}`: server answered {status}")]
    HttpStatus { url: String, status: StatusCode },

    #[error("connection to `{url}` failed during transfer")]
    Interrupted {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("checksum mismatch for `{url}`: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to write `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The caching metadata a server reports for a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceMetadata {
    /// Opaque validator tag.
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_length: Option<u64>,
}

impl ResourceMetadata {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

        ResourceMetadata {
            etag: header(ETAG).map(str::to_string),
            last_modified: header(LAST_MODIFIED).and_then(parse_http_date),
            content_length: header(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok()),
        }
    }
}

/// Parse an HTTP-date such as `Wed, 21 Oct 2015 07:28:00 GMT`.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// A URL and what its server last told us about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub url: Url,
    pub metadata: ResourceMetadata,
}

/// Whether a resource must be downloaded again.
///
/// A matching validator tag means unchanged. Otherwise the resource is only
/// considered unchanged when both its modification time and length are
/// known and equal to the recorded ones.
pub fn needs_refetch(current: &ResourceMetadata, previous: Option<&ResourceMetadata>) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if let (Some(old), Some(new)) = (&previous.etag, &current.etag) {
        if old == new {
            return false;
        }
    }

    let (Some(modified), Some(length)) = (current.last_modified, current.content_length) else {
        return true;
    };

    previous.last_modified != Some(modified) || previous.content_length != Some(length)
}

/// Per-download switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadOptions<'a> {
    /// Download even if the recorded metadata says nothing changed.
    pub force: bool,
    /// Expected SHA-256 of the downloaded file, lowercase hex.
    pub sha256: Option<&'a str>,
}

/// What [`Fetcher::download`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The local copy is current.
    Fresh,
    Downloaded(ResourceMetadata),
}

/// Blocking HTTP client for archive downloads.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    shell: Shell,
}

const CHUNK_SIZE: usize = 64 * 1024;

impl Fetcher {
    pub fn new(net: &NetConfig, shell: Shell) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(net.connect_timeout())
            .timeout(net.timeout())
            .user_agent(net.user_agent())
            .build()
            .context("failed to create HTTP client")?;

        Ok(Fetcher { client, shell })
    }

    fn check_status(url: &Url, response: Response) -> Result<Response, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(response)
    }

    /// Ask the server for the resource's current metadata without
    /// downloading it.
    pub fn inspect(&self, url: &Url) -> Result<RemoteResource, FetchError> {
        tracing::debug!("HEAD {}", url);
        let response = self
            .client
            .head(url.as_str())
            .send()
            .map_err(|source| FetchError::TransferFailed {
                url: url.to_string(),
                source,
            })?;
        let response = Self::check_status(url, response)?;

        Ok(RemoteResource {
            url: url.clone(),
            metadata: ResourceMetadata::from_headers(response.headers()),
        })
    }

    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// The body goes to `<dest>.part` first and is renamed into place once
    /// complete. The file's modification time is set from `Last-Modified`.
    pub fn fetch(&self, url: &Url, dest: &Path) -> Result<ResourceMetadata, FetchError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|source| FetchError::TransferFailed {
                url: url.to_string(),
                source,
            })?;
        let mut response = Self::check_status(url, response)?;
        let metadata = ResourceMetadata::from_headers(response.headers());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let part = part_path(dest);
        let mut progress = self.shell.bytes_progress(file_name(dest), metadata.content_length);
        write_part(url, &mut response, &part, &mut progress)?;

        fs::rename(&part, dest).map_err(io_error(dest))?;

        if let Some(modified) = metadata.last_modified {
            let mtime: SystemTime = modified.into();
            if let Err(e) = crate::util::fs::set_mtime(dest, mtime) {
                tracing::warn!("{:#}", e);
            }
        }

        tracing::info!("downloaded {} ({} bytes)", url, progress.position());
        Ok(metadata)
    }

    /// Download `url` to `target` unless the local copy is still current.
    ///
    /// The metadata of a completed download is recorded in `store`; saving
    /// the store is left to the caller.
    pub fn download(
        &self,
        url: &Url,
        target: &Path,
        store: &mut MetadataStore,
        opts: DownloadOptions<'_>,
    ) -> Result<DownloadOutcome, FetchError> {
        if target.exists() && !opts.force {
            let current = self.inspect(url)?;
            if !needs_refetch(&current.metadata, store.get(url.as_str())) {
                tracing::info!("{} is up to date", target.display());
                self.shell.status(Status::Fresh, file_name(target));
                return Ok(DownloadOutcome::Fresh);
            }
        }

        self.shell.status(Status::Fetching, url);
        let metadata = self.fetch(url, target)?;

        if let Some(expected) = opts.sha256 {
            let actual = crate::util::hash::sha256_file(target).map_err(|e| FetchError::Io {
                path: target.to_path_buf(),
                source: io::Error::other(format!("{:#}", e)),
            })?;
            if !crate::util::hash::digest_matches(&actual, expected) {
                let _ = fs::remove_file(target);
                store.forget(url.as_str());
                return Err(FetchError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            tracing::debug!("checksum verified: {}", &actual[..16]);
        }

        store.record(url.as_str(), metadata.clone());
        Ok(DownloadOutcome::Downloaded(metadata))
    }
}

/// Stream `body` into `part`, removing the file again if anything fails.
fn write_part<R: Read>(
    url: &Url,
    body: &mut R,
    part: &Path,
    progress: &mut Progress,
) -> Result<(), FetchError> {
    let result = File::create(part).map_err(io_error(part)).and_then(|mut file| {
        copy_body(url, body, &mut file, part, progress)?;
        file.flush().map_err(io_error(part))
    });
    progress.finish();

    if result.is_err() {
        let _ = fs::remove_file(part);
    }
    result
}

fn copy_body<R: Read, W: Write>(
    url: &Url,
    body: &mut R,
    out: &mut W,
    part: &Path,
    progress: &mut Progress,
) -> Result<(), FetchError> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FetchError::Interrupted {
                    url: url.to_string(),
                    source,
                })
            }
        };
        out.write_all(&buf[..n]).map_err(io_error(part))?;
        progress.inc(n as u64);
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> FetchError + '_ {
    move |source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const BODY: &[u8] = b"pretend this is a tarball";
    const LAST_MODIFIED_DATE: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

    fn metadata(etag: Option<&str>, modified: Option<i64>, length: Option<u64>) -> ResourceMetadata {
        ResourceMetadata {
            etag: etag.map(str::to_string),
            last_modified: modified.map(|secs| Utc.timestamp_opt(secs, 0).unwrap()),
            content_length: length,
        }
    }

    #[test]
    fn test_no_previous_record_refetches() {
        assert!(needs_refetch(&metadata(Some("\"a\""), Some(10), Some(5)), None));
    }

    #[test]
    fn test_matching_etag_is_fresh() {
        let previous = metadata(Some("\"a\""), Some(10), Some(5));
        // etag wins even when the rest changed or is missing
        assert!(!needs_refetch(&metadata(Some("\"a\""), None, None), Some(&previous)));
        assert!(!needs_refetch(&metadata(Some("\"a\""), Some(99), Some(1)), Some(&previous)));
    }

    #[test]
    fn test_incomplete_metadata_refetches() {
        let previous = metadata(None, Some(10), Some(5));
        assert!(needs_refetch(&metadata(None, Some(10), None), Some(&previous)));
        assert!(needs_refetch(&metadata(None, None, Some(5)), Some(&previous)));
    }

    #[test]
    fn test_time_and_length_comparison() {
        let previous = metadata(Some("\"old\""), Some(10), Some(5));
        assert!(!needs_refetch(&metadata(Some("\"new\""), Some(10), Some(5)), Some(&previous)));
        assert!(needs_refetch(&metadata(None, Some(11), Some(5)), Some(&previous)));
        assert!(needs_refetch(&metadata(None, Some(10), Some(6)), Some(&previous)));
    }

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date(LAST_MODIFIED_DATE).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap());
        assert!(parse_http_date("yesterday").is_none());
    }

    /// Serves `BODY` at every path except `/missing`, counting GETs.
    fn serve() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let gets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&gets);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => break,
                        Ok(_) if line == "\r\n" || line == "\n" => break,
                        Ok(_) => continue,
                        Err(_) => break,
                    }
                }

                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or("");
                let path = parts.next().unwrap_or("");

                let response = if path == "/missing" {
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec()
                } else {
                    let mut head = format!(
                        "HTTP/1.1 200 OK\r\nETag: \"v1\"\r\nLast-Modified: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        LAST_MODIFIED_DATE,
                        BODY.len()
                    )
                    .into_bytes();
                    if method == "GET" {
                        counter.fetch_add(1, Ordering::SeqCst);
                        head.extend_from_slice(BODY);
                    }
                    head
                };
                let _ = stream.write_all(&response);
                let _ = stream.flush();
            }
        });

        (base, gets)
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(&NetConfig::default(), Shell::quiet()).unwrap()
    }

    #[test]
    fn test_fetch_record_recheck() {
        let (base, gets) = serve();
        let tmp = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/dl/pkg-1.0.tar.gz", base)).unwrap();
        let target = tmp.path().join("dl").join("pkg-1.0.tar.gz");
        let mut store = MetadataStore::in_cache_dir(tmp.path()).unwrap();
        let fetcher = fetcher();

        let first = fetcher
            .download(&url, &target, &mut store, DownloadOptions::default())
            .unwrap();
        let DownloadOutcome::Downloaded(recorded) = first else {
            panic!("expected a download");
        };
        assert_eq!(recorded.etag.as_deref(), Some("\"v1\""));
        assert_eq!(recorded.content_length, Some(BODY.len() as u64));
        assert_eq!(fs::read(&target).unwrap(), BODY);
        assert!(!part_path(&target).exists());

        let expected_mtime: SystemTime = parse_http_date(LAST_MODIFIED_DATE).unwrap().into();
        assert_eq!(fs::metadata(&target).unwrap().modified().unwrap(), expected_mtime);

        let second = fetcher
            .download(&url, &target, &mut store, DownloadOptions::default())
            .unwrap();
        assert_eq!(second, DownloadOutcome::Fresh);
        assert_eq!(gets.load(Ordering::SeqCst), 1);

        let forced = fetcher
            .download(
                &url,
                &target,
                &mut store,
                DownloadOptions {
                    force: true,
                    ..DownloadOptions::default()
                },
            )
            .unwrap();
        assert!(matches!(forced, DownloadOutcome::Downloaded(_)));
        assert_eq!(gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_inspect_reads_headers() {
        let (base, gets) = serve();
        let url = Url::parse(&format!("{}/file.zip", base)).unwrap();

        let resource = fetcher().inspect(&url).unwrap();
        assert_eq!(resource.metadata.etag.as_deref(), Some("\"v1\""));
        assert_eq!(resource.metadata.content_length, Some(BODY.len() as u64));
        assert!(resource.metadata.last_modified.is_some());
        assert_eq!(gets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_http_error_status() {
        let (base, _) = serve();
        let tmp = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/missing", base)).unwrap();

        let err = fetcher().fetch(&url, &tmp.path().join("missing")).unwrap_err();
        match err {
            FetchError::HttpStatus { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!tmp.path().join("missing").exists());
    }

    /// A URL on a port nothing listens on.
    fn unreachable_url() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{}/pkg-2.0.tar.gz", addr)).unwrap()
    }

    #[test]
    fn test_unreachable_server_is_fatal() {
        let url = unreachable_url();
        let tmp = TempDir::new().unwrap();
        let fetcher = fetcher();

        match fetcher.inspect(&url).unwrap_err() {
            FetchError::TransferFailed { url: failed, .. } => assert_eq!(failed, url.to_string()),
            other => panic!("unexpected error: {}", other),
        }

        let target = tmp.path().join("pkg-2.0.tar.gz");
        match fetcher.fetch(&url, &target).unwrap_err() {
            FetchError::TransferFailed { url: failed, .. } => assert_eq!(failed, url.to_string()),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    #[test]
    fn test_unreachable_server_keeps_existing_download() {
        let url = unreachable_url();
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("pkg-2.0.tar.gz");
        fs::write(&target, b"from last time").unwrap();

        let mut store = MetadataStore::in_cache_dir(tmp.path()).unwrap();
        let previous = metadata(Some("\"old\""), Some(10), Some(14));
        store.record(url.as_str(), previous.clone());

        let err = fetcher()
            .download(&url, &target, &mut store, DownloadOptions::default())
            .unwrap_err();
        assert!(matches!(err, FetchError::TransferFailed { .. }));
        assert!(err.to_string().contains(url.as_str()));

        assert_eq!(store.get(url.as_str()), Some(&previous));
        assert_eq!(fs::read(&target).unwrap(), b"from last time");
    }

    struct BrokenBody;

    impl Read for BrokenBody {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
        }
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_body_removes_part_file() {
        let tmp = TempDir::new().unwrap();
        let url = Url::parse("http://example.invalid/pkg.tar.gz").unwrap();
        let part = part_path(&tmp.path().join("pkg.tar.gz"));
        let mut progress = Shell::quiet().bytes_progress("pkg.tar.gz", None);

        let err = write_part(&url, &mut BrokenBody, &part, &mut progress).unwrap_err();
        assert!(matches!(err, FetchError::Interrupted { .. }));
        assert!(!part.exists());

        write_part(&url, &mut &BODY[..], &part, &mut progress).unwrap();
        assert_eq!(fs::read(&part).unwrap(), BODY);
    }

    #[test]
    fn test_write_failure_is_an_io_error() {
        let url = Url::parse("http://example.invalid/pkg.tar.gz").unwrap();
        let part = Path::new("pkg.tar.gz.part");
        let mut progress = Shell::quiet().bytes_progress("pkg.tar.gz", None);

        let err = copy_body(&url, &mut &BODY[..], &mut FullDisk, part, &mut progress).unwrap_err();
        match err {
            FetchError::Io { path, .. } => assert_eq!(path, part),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(progress.position(), 0);
    }

    #[test]
    fn test_checksum_mismatch_discards_file() {
        let (base, _) = serve();
        let tmp = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/pkg.zip", base)).unwrap();
        let target = tmp.path().join("pkg.zip");
        let mut store = MetadataStore::in_cache_dir(tmp.path()).unwrap();

        let wrong = "0".repeat(64);
        let err = fetcher()
            .download(
                &url,
                &target,
                &mut store,
                DownloadOptions {
                    force: false,
                    sha256: Some(&wrong),
                },
            )
            .unwrap_err();
        assert!(matches!(err, FetchError::ChecksumMismatch { .. }));
        assert!(!target.exists());
        assert!(store.get(url.as_str()).is_none());

        let right = crate::util::hash::sha256_bytes(BODY);
        fetcher()
            .download(
                &url,
                &target,
                &mut store,
                DownloadOptions {
                    force: false,
                    sha256: Some(&right),
                },
            )
            .unwrap();
        assert!(target.exists());
    }
}
