//! Storage traits
//!
//! Абстракция локального хранилища ключей. KeyManager и всё, что выше,
//! работают только через [`KeyStore`], поэтому реальное хранилище
//! (файл, зашифрованный файл, keychain, in-memory дубль для тестов)
//! подменяется без изменений в логике согласования ключей и шифрования.

use crate::error::{CryptoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Идентификатор пользователя (UUID от сервера или любой стабильный id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Идентификатор беседы
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Типизированный ключ записи в хранилище
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    /// Приватные половины identity ключей пользователя (обе пары одной записью)
    Identity(UserId),
    /// Эфемерный X25519 ключ беседы (legacy forward-secrecy режим)
    Ephemeral(ConversationId),
    /// Служебная запись обёрток хранилища (например, соль SealedKeyStore)
    Meta(String),
}

const IDENTITY_PREFIX: &str = "identity:";
const EPHEMERAL_PREFIX: &str = "ephemeral:";
const META_PREFIX: &str = "meta:";

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Identity(user_id) => write!(f, "{}{}", IDENTITY_PREFIX, user_id),
            StoreKey::Ephemeral(conversation_id) => {
                write!(f, "{}{}", EPHEMERAL_PREFIX, conversation_id)
            }
            StoreKey::Meta(name) => write!(f, "{}{}", META_PREFIX, name),
        }
    }
}

impl FromStr for StoreKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix(IDENTITY_PREFIX) {
            Ok(StoreKey::Identity(UserId::new(rest)))
        } else if let Some(rest) = s.strip_prefix(EPHEMERAL_PREFIX) {
            Ok(StoreKey::Ephemeral(ConversationId::new(rest)))
        } else if let Some(rest) = s.strip_prefix(META_PREFIX) {
            Ok(StoreKey::Meta(rest.to_string()))
        } else {
            Err(CryptoError::Storage(format!("Unknown store key: {}", s)))
        }
    }
}

/// Персистентная key-value поверхность для секретного материала.
///
/// Требования к реализациям:
/// - `get` не должен брать эксклюзивную блокировку (параллельные чтения)
/// - `set`/`delete` для одного ключа: last-writer-wins
/// - `delete` отсутствующего ключа не ошибка
/// - значения не логируются и не покидают хранилище иначе как через `get`
pub trait KeyStore: Send + Sync {
    fn get(&self, key: &StoreKey) -> Result<Option<Zeroizing<Vec<u8>>>>;

    /// Записать значение, перезаписав существующее.
    ///
    /// # Errors
    /// `CryptoError::Storage`, если персистентный слой отклонил запись.
    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<()>;

    fn delete(&self, key: &StoreKey) -> Result<()>;

    fn list(&self) -> Result<Vec<StoreKey>>;
}

impl<S: KeyStore + ?Sized> KeyStore for std::sync::Arc<S> {
    fn get(&self, key: &StoreKey) -> Result<Option<Zeroizing<Vec<u8>>>> {
        (**self).get(key)
    }

    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &StoreKey) -> Result<()> {
        (**self).delete(key)
    }

    fn list(&self) -> Result<Vec<StoreKey>> {
        (**self).list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_key_string_roundtrip() {
        let keys = [
            StoreKey::Identity(UserId::new("user:with:colons")),
            StoreKey::Ephemeral(ConversationId::new("conv-1")),
            StoreKey::Meta("sealed-salt".to_string()),
        ];

        for key in keys {
            let parsed: StoreKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn test_unknown_store_key_prefix() {
        assert!("session:abc".parse::<StoreKey>().is_err());
    }
}
