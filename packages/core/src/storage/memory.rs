// In-memory хранилища для тестов и встраивания
//
// MemoryKeyStore: локальное хранилище ключей; MemoryProfileDirectory и
// MemoryMessageStore: дубли внешних коллабораторов (профили и сообщения).

use crate::api::contacts::ProfileDirectory;
use crate::api::messaging::MessageStore;
use crate::error::{CryptoError, Result};
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::models::StoredMessage;
use crate::storage::traits::{ConversationId, KeyStore, StoreKey, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use zeroize::Zeroizing;

/// In-memory хранилище ключей
pub struct MemoryKeyStore {
    entries: RwLock<BTreeMap<StoreKey, Zeroizing<Vec<u8>>>>,
    /// Максимум записей (имитация квоты платформенного хранилища)
    quota: Option<usize>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: None,
        }
    }

    /// Хранилище, отклоняющее запись новых ключей сверх `max_entries`
    pub fn with_quota(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            quota: Some(max_entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write();
        if let Some(quota) = self.quota {
            if !entries.contains_key(key) && entries.len() >= quota {
                return Err(CryptoError::Storage(format!(
                    "Key store quota exceeded ({} entries)",
                    quota
                )));
            }
        }
        entries.insert(key.clone(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &StoreKey) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn list(&self) -> Result<Vec<StoreKey>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// In-memory каталог профилей (публичные ключи пользователей)
#[derive(Default)]
pub struct MemoryProfileDirectory {
    profiles: RwLock<HashMap<UserId, PublicKeyBundle>>,
}

impl MemoryProfileDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileDirectory for MemoryProfileDirectory {
    fn fetch_public_keys(&self, user_id: &UserId) -> Result<Option<PublicKeyBundle>> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    fn publish_public_keys(&self, user_id: &UserId, bundle: &PublicKeyBundle) -> Result<()> {
        self.profiles.write().insert(user_id.clone(), bundle.clone());
        Ok(())
    }
}

/// In-memory хранилище сообщений
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Подменить содержимое сообщения (для тестов повреждённых данных)
    pub fn replace_content(&self, message_id: &str, content: String) -> bool {
        let mut messages = self.messages.write();
        match messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.content = content;
                true
            }
            None => false,
        }
    }
}

impl MessageStore for MemoryMessageStore {
    fn append(&self, message: StoredMessage) -> Result<()> {
        self.messages.write().push(message);
        Ok(())
    }

    fn list(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredMessage>> {
        let mut messages: Vec<StoredMessage> = self
            .messages
            .read()
            .iter()
            .filter(|m| &m.conversation_id == conversation_id)
            .cloned()
            .collect();

        // Сортировка по timestamp
        messages.sort_by_key(|m| m.timestamp);

        // Пагинация
        Ok(messages.into_iter().skip(offset).take(limit).collect())
    }
}
