use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{AnalysisResult, ImageHashes, MetadataResult, error::Result};

pub const DEFAULT_MAX_ITEMS: usize = 100;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub file_name: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub analysis_result: AnalysisResult,
    #[serde(default)]
    pub metadata: MetadataResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<ImageHashes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An entry as submitted by a client; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub file_name: String,
    pub file_size: u64,
    #[serde(default)]
    pub preview: Option<String>,
    pub analysis_result: AnalysisResult,
    #[serde(default)]
    pub metadata: MetadataResult,
    #[serde(default)]
    pub hashes: Option<ImageHashes>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Past analyses, newest first, kept as one JSON array on disk.
pub struct HistoryStore {
    path: PathBuf,
    max_items: usize,
    lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_items: DEFAULT_MAX_ITEMS,
            lock: Mutex::new(()),
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }

    pub fn save(&self, entry: NewHistoryEntry) -> Result<String> {
        let now = chrono::Utc::now().timestamp_millis();
        let id = generate_id(now, &mut rand::thread_rng());

        let _guard = self.lock.lock();
        let mut entries = self.read();
        entries.insert(
            0,
            HistoryEntry {
                id: id.clone(),
                timestamp: now,
                file_name: entry.file_name,
                file_size: entry.file_size,
                preview: entry.preview,
                analysis_result: entry.analysis_result,
                metadata: entry.metadata,
                hashes: entry.hashes,
                notes: entry.notes,
            },
        );
        entries.truncate(self.max_items);
        self.write(&entries)?;

        log::debug!("saved history entry {} ({} stored)", id, entries.len());
        Ok(id)
    }

    pub fn list(&self) -> Vec<HistoryEntry> {
        let _guard = self.lock.lock();
        self.read()
    }

    pub fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.list().into_iter().find(|e| e.id == id)
    }

    /// Returns whether an entry was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read();
        let before = entries.len();
        entries.retain(|e| e.id != id);

        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn update_notes(&self, id: &str, notes: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read();

        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        entry.notes = Some(notes.to_string());
        self.write(&entries)?;
        Ok(true)
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.list())?)
    }

    fn read(&self) -> Vec<HistoryEntry> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("could not read history {}: {}", self.path.display(), err);
                }
                return Vec::new();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|err| {
            log::warn!("ignoring malformed history {}: {}", self.path.display(), err);
            Vec::new()
        })
    }

    fn write(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(entries)?)?;
        Ok(())
    }
}

/// `analysis-<millis>-<9 base36 chars>`
pub fn generate_id<R: Rng + ?Sized>(millis: i64, rng: &mut R) -> String {
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("analysis-{}-{}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn entry(name: &str, overall: u32) -> NewHistoryEntry {
        NewHistoryEntry {
            file_name: name.into(),
            file_size: 1234,
            preview: None,
            analysis_result: AnalysisResult {
                overall,
                ..AnalysisResult::default()
            },
            metadata: MetadataResult::default(),
            hashes: None,
            notes: None,
        }
    }

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        (dir, store)
    }

    #[test]
    fn test_id_format() {
        let id = generate_id(1_700_000_000_000, &mut StdRng::seed_from_u64(1));
        let suffix = id.strip_prefix("analysis-1700000000000-").unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_newest_first() {
        let (_dir, store) = store();
        let first = store.save(entry("a.jpg", 10)).unwrap();
        let second = store.save(entry("b.jpg", 20)).unwrap();

        let list = store.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, second);
        assert_eq!(list[1].id, first);
        assert_eq!(store.get(&first).unwrap().file_name, "a.jpg");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json")).with_max_items(3);
        let ids: Vec<_> = (0..5)
            .map(|i| store.save(entry(&format!("{}.png", i), i)).unwrap())
            .collect();

        let list = store.list();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, ids[4]);
        assert!(store.get(&ids[0]).is_none());
    }

    #[test]
    fn test_delete_and_notes() {
        let (_dir, store) = store();
        let id = store.save(entry("a.jpg", 10)).unwrap();

        assert!(store.update_notes(&id, "checked by hand").unwrap());
        assert_eq!(store.get(&id).unwrap().notes.as_deref(), Some("checked by hand"));
        assert!(!store.update_notes("missing", "x").unwrap());

        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_clear_and_unreadable_storage() {
        let (dir, store) = store();
        store.save(entry("a.jpg", 10)).unwrap();
        store.clear().unwrap();
        assert!(store.list().is_empty());
        store.clear().unwrap();

        std::fs::write(dir.path().join("history.json"), "[{").unwrap();
        assert!(store.list().is_empty());
        assert_eq!(store.export_json().unwrap(), "[]");
    }
}
