//! Acquisition of the uploaded report: a local file or an HTTP download.

use std::{fs, path::Path};

use log::{debug, info};

use crate::error::{IngestError, IngestResult};

const URL_FALLBACK_NAME: &str = "download";

/// Raw bytes of one uploaded report plus the file name used for format
/// detection and table naming.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        SourceFile {
            name: name.into(),
            bytes,
        }
    }
}

/// Chooses between a direct upload and a URL; exactly one must be supplied.
pub fn acquire(file: Option<&Path>, url: Option<&str>) -> IngestResult<SourceFile> {
    let url = url.map(str::trim).filter(|u| !u.is_empty());
    match (file, url) {
        (Some(_), Some(_)) => Err(IngestError::Input(
            "Please remove either the url or the uploaded file.".to_string(),
        )),
        (None, None) => Err(IngestError::Input(
            "Provide a report with --file or --url.".to_string(),
        )),
        (Some(path), None) => read_file(path),
        (None, Some(url)) => fetch_url(url),
    }
}

pub fn read_file(path: &Path) -> IngestResult<SourceFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = fs::read(path).map_err(|err| IngestError::parse(&name, err))?;
    debug!("Read {} byte(s) from {:?}", bytes.len(), path);
    Ok(SourceFile::new(name, bytes))
}

pub fn fetch_url(url: &str) -> IngestResult<SourceFile> {
    let network = |reason: String| IngestError::Network {
        url: url.to_string(),
        reason,
    };
    info!("Fetching report from {url}");
    let response = reqwest::blocking::get(url).map_err(|err| network(err.to_string()))?;
    let response = response
        .error_for_status()
        .map_err(|err| network(err.to_string()))?;
    let bytes = response
        .bytes()
        .map_err(|err| network(err.to_string()))?
        .to_vec();
    let name = file_name_from_url(url);
    debug!("Fetched {} byte(s) as '{name}'", bytes.len());
    Ok(SourceFile::new(name, bytes))
}

/// Last non-empty path segment of a URL, ignoring query and fragment.
pub fn file_name_from_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let mut segments = path.split('/');
    // host
    segments.next();
    segments
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
        .unwrap_or_else(|| URL_FALLBACK_NAME.to_string())
}
