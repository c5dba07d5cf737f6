//! JSON-backed preference store.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{DEFAULT_MARKER_COLOR, DEFAULT_SEPARATOR};

/// Telegram user identifier.
pub type UserId = i64;

/// Errors raised by the preference store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access preferences file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preferences file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Choices of a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Marker color whose markers become chapters.
    pub marker_color: String,

    /// Text placed between chapter time and title.
    pub separator: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            marker_color: DEFAULT_MARKER_COLOR.to_owned(),
            separator: DEFAULT_SEPARATOR.to_owned(),
        }
    }
}

/// Preferences of all users, persisted after every change.
#[derive(Debug)]
pub struct PreferenceStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<UserId, Preferences>>,
}

impl PreferenceStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No preferences file at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!("Loaded preferences for {} users", entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Registers a user with default preferences unless already known.
    ///
    /// Returns `true` if the user was new.
    pub async fn ensure_user(&self, user_id: UserId) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&user_id) {
            return Ok(false);
        }

        self.commit(&mut entries, user_id, Preferences::default())?;
        debug!("Registered user {}", user_id);
        Ok(true)
    }

    /// Returns the preferences of a user, or the defaults if unknown.
    pub async fn get(&self, user_id: UserId) -> Preferences {
        self.entries
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the marker color of a user.
    pub async fn set_marker_color(&self, user_id: UserId, color: &str) -> Result<(), StoreError> {
        self.update(user_id, |prefs| color.clone_into(&mut prefs.marker_color))
            .await
    }

    /// Sets the chapter separator of a user.
    pub async fn set_separator(&self, user_id: UserId, separator: &str) -> Result<(), StoreError> {
        self.update(user_id, |prefs| separator.clone_into(&mut prefs.separator))
            .await
    }

    /// Returns the number of known users.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if no user is known.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn update(
        &self,
        user_id: UserId,
        apply: impl FnOnce(&mut Preferences),
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let mut prefs = entries.get(&user_id).cloned().unwrap_or_default();
        apply(&mut prefs);
        self.commit(&mut entries, user_id, prefs)
    }

    /// Stores `prefs` for `user_id` and persists the map.
    ///
    /// The in-memory map is left as it was if the file cannot be written.
    fn commit(
        &self,
        entries: &mut BTreeMap<UserId, Preferences>,
        user_id: UserId,
        prefs: Preferences,
    ) -> Result<(), StoreError> {
        let previous = entries.insert(user_id, prefs);

        if let Err(e) = self.save(entries) {
            match previous {
                Some(prefs) => entries.insert(user_id, prefs),
                None => entries.remove(&user_id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Writes the map to a sibling temporary file and renames it over the
    /// preferences file.
    fn save(&self, entries: &BTreeMap<UserId, Preferences>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;

        let directory = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut file = tempfile::NamedTempFile::new_in(directory)?;
        file.write_all(json.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, PreferenceStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("prefs.json")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_unknown_user_gets_defaults() {
        let (_dir, store) = temp_store();
        let prefs = store.get(42).await;
        assert_eq!(prefs.marker_color, "Blue");
        assert_eq!(prefs.separator, "-");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let (_dir, store) = temp_store();
        assert!(store.ensure_user(7).await.unwrap());
        store.set_separator(7, "|").await.unwrap();

        assert!(!store.ensure_user(7).await.unwrap());
        assert_eq!(store.get(7).await.separator, "|");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        {
            let store = PreferenceStore::open(&path).unwrap();
            store.ensure_user(1).await.unwrap();
            store.set_marker_color(1, "Mint").await.unwrap();
            store.set_separator(2, " :: ").await.unwrap();
        }

        let store = PreferenceStore::open(&path).unwrap();
        assert_eq!(
            store.get(1).await,
            Preferences {
                marker_color: "Mint".to_owned(),
                separator: "-".to_owned(),
            }
        );
        assert_eq!(store.get(2).await.separator, " :: ");
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(PreferenceStore::open(&path), Err(StoreError::Parse(_))));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_preferences_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::open(dir.path().join("missing").join("prefs.json")).unwrap();

        assert!(matches!(store.ensure_user(1).await, Err(StoreError::Io(_))));
        assert!(store.is_empty().await);

        assert!(store.set_marker_color(1, "Red").await.is_err());
        assert!(store.set_separator(1, "|").await.is_err());
        assert_eq!(store.get(1).await, Preferences::default());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("data");
        std::fs::create_dir(&sub).unwrap();

        let store = PreferenceStore::open(sub.join("prefs.json")).unwrap();
        store.set_marker_color(1, "Mint").await.unwrap();

        std::fs::remove_dir_all(&sub).unwrap();
        assert!(store.set_marker_color(1, "Red").await.is_err());
        assert_eq!(store.get(1).await.marker_color, "Mint");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_replaces_file_without_leftovers() {
        let (dir, store) = temp_store();
        store.set_separator(3, "::").await.unwrap();
        store.set_separator(3, "|").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("prefs.json")]);

        let reopened = PreferenceStore::open(dir.path().join("prefs.json")).unwrap();
        assert_eq!(reopened.get(3).await.separator, "|");
    }

    #[test]
    fn test_open_accepts_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "").unwrap();

        assert!(PreferenceStore::open(&path).is_ok());
    }
}
