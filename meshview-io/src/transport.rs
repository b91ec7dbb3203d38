//! Byte transport for model sources
//!
//! Loaders never touch the filesystem or network directly; they ask a
//! [`Transport`] for the bytes behind a URL. [`DefaultTransport`] handles
//! plain paths, `file://` URLs, `http(s)://` URLs and `data:` URIs.

use crate::error::{LoadError, Result};
use crate::progress::LoadProgress;
use base64::Engine as _;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Fetches the bytes behind a URL, reporting progress as chunks arrive
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>>;
}

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct DefaultTransport {
    chunk_size: usize,
}

impl DefaultTransport {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Progress granularity in bytes
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    fn fetch_file(&self, path: &Path, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => LoadError::Io(e),
        })?;
        let total = file.metadata().ok().map(|m| m.len());
        read_with_progress(&mut file, total, self.chunk_size, progress)
    }

    fn fetch_http(&self, url: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        log::debug!("GET {}", url);
        let response = ureq::get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => LoadError::Http {
                url: url.to_string(),
                status,
            },
            other => LoadError::Transport {
                url: url.to_string(),
                message: other.to_string(),
            },
        })?;
        let total = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        let mut reader = response.into_reader();
        read_with_progress(&mut reader, total, self.chunk_size, progress)
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for DefaultTransport {
    fn fetch(&self, url: &str, progress: &mut dyn FnMut(LoadProgress)) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            let bytes = decode_data_uri(url)?;
            let len = bytes.len() as u64;
            progress(LoadProgress::new(len, Some(len)));
            return Ok(bytes);
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url, progress);
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        self.fetch_file(Path::new(path), progress)
    }
}

/// Read to the end in `chunk_size` pieces, reporting after every piece
pub fn read_with_progress(
    reader: &mut dyn Read,
    total: Option<u64>,
    chunk_size: usize,
    progress: &mut dyn FnMut(LoadProgress),
) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(total.unwrap_or(0).min(1 << 28) as usize);
    let mut chunk = vec![0u8; chunk_size.max(1)];
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(LoadError::Io(e)),
        };
        data.extend_from_slice(&chunk[..n]);
        progress(LoadProgress::new(data.len() as u64, total));
    }
    if data.is_empty() {
        progress(LoadProgress::new(0, total));
    }
    Ok(data)
}

/// Report a follow-up fetch on top of `done` bytes already reported, so
/// `loaded` keeps growing across the resources of one model
pub fn chain_progress(
    done: u64,
    progress: &mut dyn FnMut(LoadProgress),
) -> impl FnMut(LoadProgress) + '_ {
    move |p: LoadProgress| progress(LoadProgress::new(done + p.loaded, p.total.map(|t| done + t)))
}

/// Decode a `data:[<mediatype>][;base64],<payload>` URI
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let invalid = |message: &str| LoadError::Transport {
        url: truncate_for_display(uri),
        message: message.to_string(),
    };
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("missing ',' separator"))?;
    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| invalid(&e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Resolve `relative` against the directory of `base`. Absolute URLs,
/// absolute paths and `data:` URIs are returned unchanged.
pub fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("data:") || relative.contains("://") || relative.starts_with('/') {
        return relative.to_string();
    }
    let base = base.split(['?', '#']).next().unwrap_or(base);
    match base.rfind(['/', '\\']) {
        Some(i) => format!("{}{}", &base[..=i], relative),
        None => relative.to_string(),
    }
}

fn truncate_for_display(uri: &str) -> String {
    match uri.char_indices().nth(48) {
        Some((i, _)) => format!("{}...", &uri[..i]),
        None => uri.to_string(),
    }
}
