//! Session persistence.
//!
//! File format: JSONL in `~/.chatmem/sessions/{safe_id}.jsonl`
//! - Line 1: `{"_type":"metadata","id":"...","strategy":{...},"summary":"...","clearCount":0,"createdAt":"...","updatedAt":"..."}`
//! - Line 2+: `{"human":"...","ai":"...","timestamp":"..."}`

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::memory::{Exchange, MemoryStrategy, SessionSnapshot};
use crate::utils;

const METADATA_TYPE: &str = "metadata";

// ─────────────────────────────────────────────
// Session metadata (first line of JSONL)
// ─────────────────────────────────────────────

/// Metadata header written as the first line of each JSONL session file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionMetadata {
    #[serde(rename = "_type")]
    record_type: String,
    id: String,
    strategy: MemoryStrategy,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    clear_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionMetadata {
    fn parse(line: &str) -> Option<Self> {
        serde_json::from_str::<SessionMetadata>(line)
            .ok()
            .filter(|meta| meta.record_type == METADATA_TYPE)
    }
}

// ─────────────────────────────────────────────
// SessionStore
// ─────────────────────────────────────────────

/// Reads and writes memory session snapshots as JSONL files.
///
/// The store holds no state of its own; every call goes to disk.
#[derive(Clone, Debug)]
pub struct SessionStore {
    /// Directory where `.jsonl` session files are stored.
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Create a new session store.
    ///
    /// `sessions_dir` defaults to `~/.chatmem/sessions/` if `None`.
    /// The directory is created if it doesn't exist.
    pub fn new(sessions_dir: Option<PathBuf>) -> std::io::Result<Self> {
        let dir = sessions_dir.unwrap_or_else(utils::get_sessions_path);
        std::fs::create_dir_all(&dir)?;
        Ok(SessionStore { sessions_dir: dir })
    }

    pub fn dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Write a snapshot, replacing any previous file for the same id.
    pub fn save(&self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        let path = self.session_path(&snapshot.id);
        let tmp = path.with_extension("jsonl.tmp");

        {
            let mut file = std::io::BufWriter::new(std::fs::File::create(&tmp)?);

            let meta = SessionMetadata {
                record_type: METADATA_TYPE.to_string(),
                id: snapshot.id.clone(),
                strategy: snapshot.strategy,
                summary: snapshot.summary.clone(),
                clear_count: snapshot.clear_count,
                created_at: snapshot.created_at,
                updated_at: snapshot.updated_at,
            };
            writeln!(file, "{}", serde_json::to_string(&meta)?)?;

            for exchange in &snapshot.exchanges {
                writeln!(file, "{}", serde_json::to_string(exchange)?)?;
            }
            file.flush()?;
        }
        std::fs::rename(&tmp, &path)?;

        debug!(
            "Saved session '{}' ({} exchanges) to {}",
            snapshot.id,
            snapshot.exchanges.len(),
            path.display()
        );
        Ok(())
    }

    /// Load one session. `None` if it was never saved, the file is
    /// unreadable, or the file belongs to a different id.
    pub fn load(&self, id: &str) -> Option<SessionSnapshot> {
        let path = self.session_path(id);
        if !path.exists() {
            return None;
        }
        Self::read_file(&path).filter(|snapshot| Self::owned_by(&path, &snapshot.id, id))
    }

    /// Delete a session file.
    ///
    /// Returns `true` if the session file existed on disk. A file whose
    /// metadata names another id is left alone.
    pub fn delete(&self, id: &str) -> bool {
        let path = self.session_path(id);
        if !path.exists() {
            return false;
        }
        match Self::read_metadata(&path) {
            Some(meta) if Self::owned_by(&path, &meta.id, id) => {}
            Some(_) => return false,
            None => warn!("Deleting session file with bad metadata: {}", path.display()),
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted session file: {}", path.display());
                true
            }
            Err(e) => {
                warn!("Failed to delete session file: {}", e);
                false
            }
        }
    }

    /// List all sessions on disk, newest first.
    ///
    /// Only the metadata line of each file is read.
    pub fn list(&self) -> Vec<StoredSessionSummary> {
        let mut summaries: Vec<StoredSessionSummary> = self
            .session_files()
            .into_iter()
            .filter_map(|path| {
                let Some(meta) = Self::read_metadata(&path) else {
                    warn!("Skipping session file with bad metadata: {}", path.display());
                    return None;
                };
                Some(StoredSessionSummary {
                    id: meta.id,
                    strategy: meta.strategy,
                    created_at: meta.created_at,
                    updated_at: meta.updated_at,
                    path,
                })
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Load every readable session on disk.
    pub fn load_all(&self) -> Vec<SessionSnapshot> {
        self.session_files()
            .iter()
            .filter_map(|path| Self::read_file(path))
            .collect()
    }

    /// Get the JSONL file path for a session id.
    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir
            .join(format!("{}.jsonl", utils::safe_filename(id)))
    }

    /// Read only the metadata line of a session file.
    fn read_metadata(path: &Path) -> Option<SessionMetadata> {
        let file = std::fs::File::open(path).ok()?;
        let first = std::io::BufReader::new(file).lines().next()?.ok()?;
        SessionMetadata::parse(&first)
    }

    fn owned_by(path: &Path, stored_id: &str, id: &str) -> bool {
        if stored_id == id {
            return true;
        }
        warn!(
            "Session file {} holds '{}', not '{}'",
            path.display(),
            stored_id,
            id
        );
        false
    }

    fn session_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read sessions directory: {}", e);
                return Vec::new();
            }
        };

        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
            .collect()
    }

    /// Parse one JSONL file. Unparseable exchange lines are skipped; a file
    /// without a metadata header is rejected.
    fn read_file(path: &Path) -> Option<SessionSnapshot> {
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open session file {}: {}", path.display(), e);
                return None;
            }
        };

        let mut lines = std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.trim().is_empty());

        let Some(meta) = lines.next().as_deref().and_then(SessionMetadata::parse) else {
            warn!("Skipping session file with bad metadata: {}", path.display());
            return None;
        };

        let mut exchanges = Vec::new();
        for (n, line) in lines.enumerate() {
            match serde_json::from_str::<Exchange>(&line) {
                Ok(exchange) => exchanges.push(exchange),
                Err(e) => warn!(
                    "Skipping bad exchange on line {} of {}: {}",
                    n + 2,
                    path.display(),
                    e
                ),
            }
        }

        debug!(
            "Loaded session '{}' with {} exchanges from disk",
            meta.id,
            exchanges.len()
        );
        Some(SessionSnapshot {
            id: meta.id,
            strategy: meta.strategy,
            exchanges,
            summary: meta.summary,
            clear_count: meta.clear_count,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        })
    }
}

/// Summary of a stored session for listing purposes.
#[derive(Clone, Debug)]
pub struct StoredSessionSummary {
    /// Session id (e.g. `"noc-shift"`).
    pub id: String,
    pub strategy: MemoryStrategy,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Path to the JSONL file.
    pub path: PathBuf,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
