//! High-score persistence, keyed by origin (the coordinator URL)

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum HighScoreError {
    #[error("Could not determine data directory")]
    NoDataDir,

    #[error("High score file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("High score file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One stored best score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighScoreRecord {
    pub score: u32,
    pub achieved_at: DateTime<Utc>,
}

/// Storage for the best score seen per origin
pub trait HighScoreStore: Send + Sync {
    /// Stored best for `origin`, `None` if nothing was ever saved
    fn load(&self, origin: &str) -> Result<Option<HighScoreRecord>, HighScoreError>;

    fn save(&self, origin: &str, record: HighScoreRecord) -> Result<(), HighScoreError>;
}

/// Stored score for `origin`; failures are logged and read as zero
pub fn load_or_zero(store: &dyn HighScoreStore, origin: &str) -> u32 {
    match store.load(origin) {
        Ok(Some(record)) => record.score,
        Ok(None) => 0,
        Err(e) => {
            warn!(origin, error = %e, "Failed to load high score, starting from 0");
            0
        }
    }
}

/// Write `score` if it beats the stored value. Returns the best score after
/// the call. Failures are logged and leave the stored value untouched.
pub fn record_if_higher(store: &dyn HighScoreStore, origin: &str, score: u32) -> u32 {
    let stored = load_or_zero(store, origin);
    if score <= stored {
        return stored;
    }

    let record = HighScoreRecord {
        score,
        achieved_at: Utc::now(),
    };
    match store.save(origin, record) {
        Ok(()) => {
            info!(origin, score, previous = stored, "New high score saved");
            score
        }
        Err(e) => {
            warn!(origin, score, error = %e, "Failed to save high score");
            stored
        }
    }
}

type ScoreMap = BTreeMap<String, HighScoreRecord>;

/// JSON file of `{ origin: { score, achieved_at } }`
#[derive(Debug, Clone)]
pub struct FileHighScoreStore {
    path: PathBuf,
}

impl FileHighScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the per-user data directory
    pub fn default_location() -> Result<Self, HighScoreError> {
        let dirs = ProjectDirs::from("", "", "flappy-arena").ok_or(HighScoreError::NoDataDir)?;
        Ok(Self::new(dirs.data_dir().join("highscores.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<ScoreMap, HighScoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(ScoreMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(ScoreMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl HighScoreStore for FileHighScoreStore {
    fn load(&self, origin: &str) -> Result<Option<HighScoreRecord>, HighScoreError> {
        Ok(self.read_all()?.get(origin).copied())
    }

    fn save(&self, origin: &str, record: HighScoreRecord) -> Result<(), HighScoreError> {
        let mut scores = self.read_all()?;
        scores.insert(origin.to_string(), record);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&scores)?)?;
        debug!(path = %self.path.display(), origin, "High score file written");
        Ok(())
    }
}

/// In-process store, used when no file should be touched
#[derive(Debug, Default)]
pub struct MemoryHighScoreStore {
    scores: Mutex<ScoreMap>,
}

impl MemoryHighScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HighScoreStore for MemoryHighScoreStore {
    fn load(&self, origin: &str) -> Result<Option<HighScoreRecord>, HighScoreError> {
        Ok(self.scores.lock().get(origin).copied())
    }

    fn save(&self, origin: &str, record: HighScoreRecord) -> Result<(), HighScoreError> {
        self.scores.lock().insert(origin.to_string(), record);
        Ok(())
    }
}
