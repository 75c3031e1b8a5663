//! Suspension checkpoint
//!
//! Persisted as a flat string map so any key-value backend can hold it:
//!
//! | key                        | value                           |
//! |----------------------------|---------------------------------|
//! | `resume_instructor_folder` | privileged destination root id  |
//! | `resume_public_folder`     | public destination root id      |
//! | `resume_source_folder`     | source root id                  |
//! | `resume_processed_count`   | completed top-level folders     |
//! | `resume_timestamp`         | suspension time, RFC 3339       |

use super::StateStore;
use crate::error::{DualCopyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Key of the privileged root id
pub const KEY_INSTRUCTOR_FOLDER: &str = "resume_instructor_folder";
/// Key of the public root id
pub const KEY_PUBLIC_FOLDER: &str = "resume_public_folder";
/// Key of the source root id
pub const KEY_SOURCE_FOLDER: &str = "resume_source_folder";
/// Key of the completed unit count
pub const KEY_PROCESSED_COUNT: &str = "resume_processed_count";
/// Key of the suspension time
pub const KEY_TIMESTAMP: &str = "resume_timestamp";

/// Every key a checkpoint occupies
pub const CHECKPOINT_KEYS: [&str; 5] = [
    KEY_INSTRUCTOR_FOLDER,
    KEY_PUBLIC_FOLDER,
    KEY_SOURCE_FOLDER,
    KEY_PROCESSED_COUNT,
    KEY_TIMESTAMP,
];

/// Progress of a suspended run.
///
/// The first `processed_count` top-level folders of the source root are fully
/// replicated under both destination roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Privileged destination root
    pub instructor_root_id: String,
    /// Public destination root
    pub public_root_id: String,
    /// Source root
    pub source_root_id: String,
    /// Leading top-level folders already done
    pub processed_count: usize,
    /// When the run was suspended
    pub suspended_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Checkpoint stamped with the current time
    pub fn new(
        instructor_root_id: impl Into<String>,
        public_root_id: impl Into<String>,
        source_root_id: impl Into<String>,
        processed_count: usize,
    ) -> Self {
        Self {
            instructor_root_id: instructor_root_id.into(),
            public_root_id: public_root_id.into(),
            source_root_id: source_root_id.into(),
            processed_count,
            suspended_at: Utc::now(),
        }
    }

    /// Key-value form
    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (KEY_INSTRUCTOR_FOLDER, self.instructor_root_id.clone()),
            (KEY_PUBLIC_FOLDER, self.public_root_id.clone()),
            (KEY_SOURCE_FOLDER, self.source_root_id.clone()),
            (KEY_PROCESSED_COUNT, self.processed_count.to_string()),
            (KEY_TIMESTAMP, self.suspended_at.to_rfc3339()),
        ]
    }

    /// Rebuild from stored values looked up through `get`.
    ///
    /// Returns `Ok(None)` when no key is present and
    /// [`DualCopyError::InvalidCheckpoint`] when only some are, or a value
    /// does not parse.
    pub fn from_entries<F>(mut get: F) -> Result<Option<Self>>
    where
        F: FnMut(&str) -> Result<Option<String>>,
    {
        let mut values = Vec::with_capacity(CHECKPOINT_KEYS.len());
        for key in CHECKPOINT_KEYS {
            values.push(get(key)?);
        }
        if values.iter().all(Option::is_none) {
            return Ok(None);
        }

        let required = |index: usize| -> Result<String> {
            values[index]
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DualCopyError::InvalidCheckpoint(format!("missing {}", CHECKPOINT_KEYS[index])))
        };

        let instructor_root_id = required(0)?;
        let public_root_id = required(1)?;
        let source_root_id = required(2)?;
        let processed_count = required(3)?.parse::<usize>().map_err(|e| {
            DualCopyError::InvalidCheckpoint(format!("{}: {}", KEY_PROCESSED_COUNT, e))
        })?;
        let suspended_at = DateTime::parse_from_rfc3339(&required(4)?)
            .map_err(|e| DualCopyError::InvalidCheckpoint(format!("{}: {}", KEY_TIMESTAMP, e)))?
            .with_timezone(&Utc);

        Ok(Some(Self {
            instructor_root_id,
            public_root_id,
            source_root_id,
            processed_count,
            suspended_at,
        }))
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source {} -> ({}, {}), {} folders done, suspended {}",
            self.source_root_id,
            self.instructor_root_id,
            self.public_root_id,
            self.processed_count,
            self.suspended_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Reads and writes the checkpoint through a [`StateStore`]
#[derive(Clone)]
pub struct CheckpointManager {
    state: Arc<dyn StateStore>,
}

impl CheckpointManager {
    /// Manage the checkpoint held in `state`
    pub fn new(state: Arc<dyn StateStore>) -> Self {
        Self { state }
    }

    /// Saved checkpoint, if any
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        Checkpoint::from_entries(|key| self.state.get(key))
    }

    /// Persist `checkpoint` as one update, replacing any previous one
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.state.set_many(&checkpoint.to_entries())?;
        tracing::info!("Checkpoint saved: {}", checkpoint);
        Ok(())
    }

    /// Remove the checkpoint
    pub fn clear(&self) -> Result<()> {
        self.state.delete_many(&CHECKPOINT_KEYS)?;
        tracing::debug!("Checkpoint cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryStateStore;

    fn manager() -> (Arc<MemoryStateStore>, CheckpointManager) {
        let state = Arc::new(MemoryStateStore::new());
        let manager = CheckpointManager::new(state.clone());
        (state, manager)
    }

    #[test]
    fn test_save_load_clear() {
        let (state, manager) = manager();
        assert!(manager.load().unwrap().is_none());

        let checkpoint = Checkpoint::new("i1", "p1", "s1", 3);
        manager.save(&checkpoint).unwrap();

        let entries = state.entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[KEY_PROCESSED_COUNT], "3");
        assert_eq!(entries[KEY_SOURCE_FOLDER], "s1");

        let loaded = manager.load().unwrap().unwrap();
        assert_eq!(loaded.processed_count, 3);
        assert_eq!(loaded.instructor_root_id, "i1");
        assert_eq!(loaded.suspended_at.timestamp(), checkpoint.suspended_at.timestamp());

        manager.clear().unwrap();
        assert!(manager.load().unwrap().is_none());
        assert!(state.entries().is_empty());
    }

    #[test]
    fn test_partial_checkpoint_is_invalid() {
        let (state, manager) = manager();
        state
            .set_many(&[(KEY_INSTRUCTOR_FOLDER, "i1".into()), (KEY_PUBLIC_FOLDER, "p1".into())])
            .unwrap();

        assert!(matches!(manager.load(), Err(DualCopyError::InvalidCheckpoint(_))));
    }

    #[test]
    fn test_bad_count_is_invalid() {
        let (state, manager) = manager();
        let mut entries = Checkpoint::new("i", "p", "s", 0).to_entries();
        entries[3].1 = "three".into();
        state.set_many(&entries).unwrap();

        assert!(matches!(manager.load(), Err(DualCopyError::InvalidCheckpoint(_))));
    }

    #[test]
    fn test_unrelated_keys_survive_clear() {
        let (state, manager) = manager();
        state.set_many(&[("translation_cursor", "42".into())]).unwrap();
        manager.save(&Checkpoint::new("i", "p", "s", 1)).unwrap();

        manager.clear().unwrap();
        assert_eq!(state.get("translation_cursor").unwrap().as_deref(), Some("42"));
    }
}
