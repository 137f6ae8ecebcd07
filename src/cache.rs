//! Fetch-cache layer.
//!
//! A cache entry moves `Absent -> Downloading -> Complete`. A forced repull
//! marks a complete entry `Invalidated` and downloads again. Bytes are
//! written to a temp file beside the target and renamed into place, so an
//! entry is either complete or absent on disk.

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::DatasetClient;
use crate::error::GeodataError;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Absent,
    Downloading,
    Complete,
    Invalidated,
}

impl CacheState {
    pub fn inspect(path: &Utf8Path, force: bool) -> Self {
        match (path.as_std_path().is_file(), force) {
            (false, _) => CacheState::Absent,
            (true, true) => CacheState::Invalidated,
            (true, false) => CacheState::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheAction {
    Hit,
    Downloaded,
    Refreshed,
}

impl CacheAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheAction::Hit => "hit",
            CacheAction::Downloaded => "downloaded",
            CacheAction::Refreshed => "refreshed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheOutcome {
    pub action: CacheAction,
    pub bytes: Option<u64>,
}

/// Makes sure `path` holds the content at `url`. Without `force`, an
/// existing file is trusted and the network is not touched.
pub fn ensure_local<C: DatasetClient + ?Sized>(
    client: &C,
    path: &Utf8Path,
    url: &str,
    force: bool,
) -> Result<CacheOutcome, GeodataError> {
    let initial = CacheState::inspect(path, force);
    let action = match initial {
        CacheState::Complete => {
            debug!(path = %path, "cache hit");
            return Ok(CacheOutcome {
                action: CacheAction::Hit,
                bytes: None,
            });
        }
        CacheState::Invalidated => CacheAction::Refreshed,
        CacheState::Absent | CacheState::Downloading => CacheAction::Downloaded,
    };

    debug!(path = %path, from = ?initial, to = ?CacheState::Downloading, "cache transition");
    info!(url, path = %path, "downloading");
    let bytes = Store::write_atomic(path, |file| client.download(url, file))?;
    debug!(path = %path, bytes, to = ?CacheState::Complete, "cache transition");

    Ok(CacheOutcome {
        action,
        bytes: Some(bytes),
    })
}
