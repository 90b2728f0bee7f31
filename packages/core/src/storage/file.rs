//! File-backed key store
//!
//! Один JSON файл `{ "entries": { "<store key>": "<base64>" } }`.
//! Содержимое держится в памяти для чтений; каждая запись переписывает
//! файл целиком через временный файл + rename, так что после сбоя на диске
//! остаётся либо старая, либо новая версия.

use crate::error::{CryptoError, Result};
use crate::storage::traits::{KeyStore, StoreKey};
use crate::utils::b64;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

#[derive(Default, Serialize, Deserialize)]
struct KeyStoreFile {
    entries: BTreeMap<String, String>,
}

pub struct FileKeyStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<StoreKey, Zeroizing<Vec<u8>>>>,
}

impl FileKeyStore {
    /// Открыть хранилище, создав пустое, если файла ещё нет.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = BTreeMap::new();

        if path.exists() {
            let raw = Zeroizing::new(fs::read(&path)?);
            let file: KeyStoreFile = serde_json::from_slice(&raw).map_err(|e| {
                CryptoError::Storage(format!("Corrupted key store {}: {}", path.display(), e))
            })?;

            for (name, encoded) in &file.entries {
                let key: StoreKey = name.parse()?;
                entries.insert(key, Zeroizing::new(b64::decode(encoded)?));
            }
        }

        info!(
            target: "storage::file",
            path = %path.display(),
            entries = entries.len(),
            "Opened file key store"
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<StoreKey, Zeroizing<Vec<u8>>>) -> Result<()> {
        let file = KeyStoreFile {
            entries: entries
                .iter()
                .map(|(key, value)| (key.to_string(), b64::encode(value)))
                .collect(),
        };
        let json = Zeroizing::new(serde_json::to_vec(&file)?);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = fs::File::create(&tmp_path)?;
            tmp.write_all(&json)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        debug!(
            target: "storage::file",
            entries = entries.len(),
            "Persisted key store"
        );
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        let previous = entries.insert(key.clone(), Zeroizing::new(value.to_vec()));

        if let Err(e) = self.persist(&entries) {
            // Откатываем in-memory состояние, чтобы память не расходилась с диском
            match previous {
                Some(old) => entries.insert(key.clone(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> Result<()> {
        let mut entries = self.entries.write();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.insert(key.clone(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoreKey>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::{ConversationId, UserId};
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        let identity = StoreKey::Identity(UserId::new("alice"));
        let ephemeral = StoreKey::Ephemeral(ConversationId::new("conv-1"));

        {
            let store = FileKeyStore::open(&path).unwrap();
            store.set(&identity, b"secret-a").unwrap();
            store.set(&ephemeral, b"secret-b").unwrap();
        }

        let reopened = FileKeyStore::open(&path).unwrap();
        assert_eq!(reopened.get(&identity).unwrap().unwrap().as_slice(), b"secret-a");
        assert_eq!(reopened.list().unwrap().len(), 2);

        reopened.delete(&identity).unwrap();
        let reopened = FileKeyStore::open(&path).unwrap();
        assert!(reopened.get(&identity).unwrap().is_none());
        assert!(reopened.get(&ephemeral).unwrap().is_some());
    }

    #[test]
    fn test_file_store_write_failure_is_storage_error() {
        let dir = tempdir().unwrap();
        // Путь к "файлу" занят каталогом: rename не сможет его заменить
        let path = dir.path().join("occupied");
        fs::create_dir_all(path.join("inner")).unwrap();

        let store = FileKeyStore {
            path: path.clone(),
            entries: RwLock::new(BTreeMap::new()),
        };
        let key = StoreKey::Identity(UserId::new("alice"));

        assert!(matches!(store.set(&key, b"x"), Err(CryptoError::Storage(_))));
        // Неудачная запись не остаётся в памяти
        assert!(store.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_file_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys.json");
        fs::write(&path, b"{not json").unwrap();

        assert!(matches!(FileKeyStore::open(&path), Err(CryptoError::Storage(_))));
    }
}
