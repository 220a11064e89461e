use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use super::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::ClientError;

/// A store persisted as a flat JSON object on disk, keyed by
/// `APP_ACCESS_TOKEN` and `APP_REFRESH_TOKEN`. An absent key means no value.
///
/// Values are cached in memory; every mutation rewrites the file through a
/// temporary sibling and a rename. On unix the file is created `0600`. A failed write is logged and the in-memory
/// value still wins for the rest of the process.
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing file is an empty store. A file that is not a JSON object of
    /// strings is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(
                        "Token file '{}' is corrupt, starting without a session: {}",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Token file '{}' not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(FileTokenStore {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// Applies `change` and persists the result while still holding the lock,
    /// so the file never lags behind a concurrent writer.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) {
        let mut entries = self.entries();
        change(&mut entries);
        if let Err(e) = self.persist(&entries) {
            error!("Failed to persist tokens to '{}': {}", self.path.display(), e);
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), ClientError> {
        let serialized = serde_json::to_string_pretty(entries)?;
        let tmp = self.tmp_path();
        if let Err(e) = write_private(&tmp, serialized.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// Writes `contents` to a fresh file readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    // The mode only applies on creation, so never reuse a leftover file.
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

impl TokenStore for FileTokenStore {
    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN_KEY)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN_KEY)
    }

    fn set_access_token(&self, token: &str) {
        self.update(|e| {
            e.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        });
    }

    fn set_refresh_token(&self, token: &str) {
        self.update(|e| {
            e.insert(REFRESH_TOKEN_KEY.to_string(), token.to_string());
        });
    }

    fn clear_access_token(&self) {
        self.update(|e| {
            e.remove(ACCESS_TOKEN_KEY);
        });
    }

    fn clear_refresh_token(&self) {
        self.update(|e| {
            e.remove(REFRESH_TOKEN_KEY);
        });
    }

    fn store_pair(&self, access: &str, refresh: &str) {
        self.update(|e| {
            e.insert(ACCESS_TOKEN_KEY.to_string(), access.to_string());
            e.insert(REFRESH_TOKEN_KEY.to_string(), refresh.to_string());
        });
    }

    fn clear(&self) {
        self.update(|e| {
            e.remove(ACCESS_TOKEN_KEY);
            e.remove(REFRESH_TOKEN_KEY);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.store_pair("A1", "R1");
        drop(store);

        let reopened = FileTokenStore::open(&path).unwrap();
        assert_eq!(reopened.access_token().as_deref(), Some("A1"));
        assert_eq!(reopened.refresh_token().as_deref(), Some("R1"));
    }

    #[test]
    fn clear_removes_keys_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.store_pair("A1", "R1");
        store.clear();

        let raw = fs::read_to_string(&path).unwrap();
        let on_disk: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn uses_fixed_key_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.store_pair("A1", "R1");

        let raw = fs::read_to_string(&path).unwrap();
        let on_disk: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk.get("APP_ACCESS_TOKEN").map(String::as_str), Some("A1"));
        assert_eq!(on_disk.get("APP_REFRESH_TOKEN").map(String::as_str), Some("R1"));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileTokenStore::open(&path).unwrap();
        assert_eq!(store.access_token(), None);
    }

    #[cfg(unix)]
    #[test]
    fn token_file_is_private_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.store_pair("A1", "R1");

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        // A directory in the file's place makes the final rename fail.
        fs::create_dir(&path).unwrap();
        store.store_pair("A1", "R1");

        assert!(!store.tmp_path().exists());
        assert_eq!(store.access_token().as_deref(), Some("A1"));
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileTokenStore::open(&path).unwrap();
        store.set_access_token("A1");
        assert!(path.exists());
    }
}
