use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// String key-value port for client-side state, shaped after browser local
/// storage. Writes never fail from the caller's point of view.
pub trait StreakStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    // Several values in one go; stores with a write cost override this
    fn set_many(&self, entries: &[(&str, &str)]) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }
}

fn lock(map: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreakStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        lock(&self.values).insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        lock(&self.values).remove(key);
    }
}

// Flat JSON object on disk, replaced atomically on every change
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    // A missing, unreadable or malformed file opens as empty
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed streak store");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) {
        if let Err(e) = self.write_atomic(values) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write streak store");
        }
    }

    // written next to the target and renamed over it, so readers never see a partial file
    fn write_atomic(&self, values: &BTreeMap<String, String>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(values).map_err(io::Error::other)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl StreakStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.flush(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.flush(&values);
        }
    }

    fn set_many(&self, entries: &[(&str, &str)]) {
        let mut values = lock(&self.values);
        for (key, value) in entries {
            values.insert(key.to_string(), value.to_string());
        }
        self.flush(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_get_set_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("a"), None);
        storage.set("a", "1");
        assert_eq!(storage.get("a").as_deref(), Some("1"));
        storage.remove("a");
        assert_eq!(storage.get("a"), None);
    }

    #[test]
    fn file_storage_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streak.json");

        let storage = JsonFileStorage::open(&path);
        storage.set("openbook_streak_count", "4");
        storage.set("other", "x");
        storage.remove("other");
        drop(storage);

        let reopened = JsonFileStorage::open(&path);
        assert_eq!(reopened.get("openbook_streak_count").as_deref(), Some("4"));
        assert_eq!(reopened.get("other"), None);
    }

    #[test]
    fn malformed_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streak.json");
        fs::write(&path, "not json {").unwrap();

        let storage = JsonFileStorage::open(&path);
        assert_eq!(storage.get("openbook_streak_count"), None);

        storage.set("openbook_streak_count", "1");
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("openbook_streak_count"));
    }

    #[test]
    fn set_many_writes_every_entry_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streak.json");
        fs::write(&path, r#"{"openbook_streak_count":"2"}"#).unwrap();

        let storage = JsonFileStorage::open(&path);
        storage.set_many(&[
            ("openbook_streak_count", "3"),
            ("openbook_streak_lastVisit", "2024-03-10T14:30:00.000Z"),
        ]);

        let on_disk: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.get("openbook_streak_count").map(String::as_str), Some("3"));
        assert_eq!(
            on_disk.get("openbook_streak_lastVisit").map(String::as_str),
            Some("2024-03-10T14:30:00.000Z")
        );

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn memory_storage_set_many() {
        let storage = MemoryStorage::new();
        storage.set_many(&[("a", "1"), ("b", "2")]);
        assert_eq!(storage.get("a").as_deref(), Some("1"));
        assert_eq!(storage.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("nope.json"));
        assert_eq!(storage.get("anything"), None);
    }
}
