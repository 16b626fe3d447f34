// src/store.rs
//
// Discovery session cache. A scan of the directory page is saved as JSON
// under .store/sessions/<session-id>.json so a later invocation can resume
// from the discovered links without re-fetching the directory. Entries
// expire after SESSION_TTL_SECS (enforced on load via file mtime) and
// expired files are swept opportunistically.

use std::time::Duration;
use std::{fs, io, path::Path, path::PathBuf};

use log::{debug, warn};
use uuid::Uuid;

use crate::config::consts::{SESSIONS_SUBDIR, SESSION_TTL_SECS, STORE_DIR};
use crate::data::DirectoryScan;
use crate::error::ScrapeError;

fn sessions_dir() -> PathBuf {
    PathBuf::from(STORE_DIR).join(SESSIONS_SUBDIR)
}

/// Session ids come from us (UUIDs), but they also arrive on the command
/// line, so keep them path-safe.
fn valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Persist a scan and return its fresh session id.
pub fn save_scan(scan: &DirectoryScan) -> Result<String, ScrapeError> {
    save_scan_in(&sessions_dir(), scan)
}

/// Load a cached scan. Returns None for unknown, expired or unreadable
/// sessions; the caller re-scans in all three cases.
pub fn load_scan(id: &str) -> Result<Option<DirectoryScan>, ScrapeError> {
    load_scan_in(&sessions_dir(), id)
}

/// Sweep expired session files. Best effort; returns how many went away.
pub fn clear_expired() -> usize {
    clear_expired_in(&sessions_dir())
}

/* ---------------- directory-explicit variants ---------------- */

pub fn save_scan_in(dir: &Path, scan: &DirectoryScan) -> Result<String, ScrapeError> {
    fs::create_dir_all(dir).map_err(|e| ScrapeError::io(dir, e))?;

    let id = Uuid::new_v4().to_string();
    let path = dir.join(format!("{id}.json"));
    let json = serde_json::to_string_pretty(scan)
        .map_err(|e| ScrapeError::io(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    fs::write(&path, json).map_err(|e| ScrapeError::io(&path, e))?;

    clear_expired_in(dir);
    Ok(id)
}

pub fn load_scan_in(dir: &Path, id: &str) -> Result<Option<DirectoryScan>, ScrapeError> {
    if !valid_id(id) {
        warn!("invalid session id: {id:?}");
        return Ok(None);
    }
    let path = dir.join(format!("{id}.json"));
    if !path.exists() {
        return Ok(None);
    }
    if is_expired(&path) {
        debug!("session {id} expired");
        let _ = fs::remove_file(&path);
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| ScrapeError::io(&path, e))?;
    match serde_json::from_str(&text) {
        Ok(scan) => Ok(Some(scan)),
        Err(e) => {
            warn!("session {id} unreadable: {e}");
            Ok(None)
        }
    }
}

pub fn clear_expired_in(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else { return 0 };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if is_expired(&path) && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!("cleared {removed} expired session(s)");
    }
    removed
}

fn is_expired(path: &Path) -> bool {
    let ttl = Duration::from_secs(SESSION_TTL_SECS);
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => mtime.elapsed().map(|age| age > ttl).unwrap_or(false),
        Err(_) => false, // unreadable mtime: let the load attempt decide
    }
}
