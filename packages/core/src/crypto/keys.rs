// Управление ключами
// Генерация, хранение и удаление identity и эфемерных ключей

use crate::crypto::provider::CryptoProvider;
use crate::error::{CryptoError, Result};
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::models::StoredIdentityKeys;
use crate::storage::traits::{ConversationId, KeyStore, StoreKey, UserId};
use crate::utils::time::current_timestamp;
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Классическая пара ключей (X25519)
#[derive(Clone)]
pub struct ClassicalKeyPair {
    pub public: Vec<u8>,
    private: Zeroizing<Vec<u8>>,
}

impl ClassicalKeyPair {
    pub fn generate<P: CryptoProvider>() -> Result<Self> {
        let (private, public) = P::generate_classical_keys()?;
        Ok(Self { public, private })
    }

    /// Восстановить пару из приватной половины
    pub fn from_private<P: CryptoProvider>(private: &[u8]) -> Result<Self> {
        let public = P::classical_public_from_private(private)?;
        Ok(Self {
            public,
            private: Zeroizing::new(private.to_vec()),
        })
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private
    }
}

impl fmt::Debug for ClassicalKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassicalKeyPair")
            .field("public", &hex::encode(&self.public))
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Пост-квантовая пара ключей (ML-KEM-768)
#[derive(Clone)]
pub struct PqKeyPair {
    pub public: Vec<u8>,
    private: Zeroizing<Vec<u8>>,
}

impl PqKeyPair {
    pub fn generate<P: CryptoProvider>() -> Result<Self> {
        let (private, public) = P::generate_kem_keys()?;
        Ok(Self { public, private })
    }

    pub fn from_private<P: CryptoProvider>(private: &[u8]) -> Result<Self> {
        let public = P::kem_public_from_private(private)?;
        Ok(Self {
            public,
            private: Zeroizing::new(private.to_vec()),
        })
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private
    }
}

impl fmt::Debug for PqKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PqKeyPair")
            .field("public_len", &self.public.len())
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Identity = классическая пара + PQ пара
#[derive(Clone, Debug)]
pub struct IdentityKeyPair {
    pub classical: ClassicalKeyPair,
    pub pq: PqKeyPair,
}

impl IdentityKeyPair {
    pub fn generate<P: CryptoProvider>() -> Result<Self> {
        Ok(Self {
            classical: ClassicalKeyPair::generate::<P>()?,
            pq: PqKeyPair::generate::<P>()?,
        })
    }

    pub fn public_keys(&self) -> PublicKeyBundle {
        PublicKeyBundle::new(self.classical.public.clone(), self.pq.public.clone())
    }

    pub fn fingerprint(&self) -> String {
        self.public_keys().fingerprint()
    }
}

/// Менеджер криптографических ключей
///
/// Все операции явно принимают `UserId`: один KeyManager обслуживает
/// несколько аккаунтов на устройстве.
pub struct KeyManager<S: KeyStore, P: CryptoProvider> {
    store: S,
    _phantom: PhantomData<P>,
}

impl<S: KeyStore, P: CryptoProvider> KeyManager<S, P> {
    /// Создать KeyManager поверх хранилища
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Сгенерировать новую identity пару (X25519 + ML-KEM-768).
    ///
    /// CPU-bound (генерация решёточных ключей); из интерактивного потока
    /// вызывать через `crypto::worker`.
    pub fn generate_identity_key_pair() -> Result<IdentityKeyPair> {
        IdentityKeyPair::generate::<P>()
    }

    /// Сохранить приватные половины identity ключей, перезаписав существующие
    pub fn store_identity_private_keys(
        &self,
        user_id: &UserId,
        classical_private: &[u8],
        pq_private: &[u8],
    ) -> Result<()> {
        if classical_private.is_empty() {
            return Err(CryptoError::MissingParameter(
                "classical private key".to_string(),
            ));
        }
        if pq_private.is_empty() {
            return Err(CryptoError::MissingParameter(
                "post-quantum private key".to_string(),
            ));
        }

        let record = StoredIdentityKeys {
            classical_private: classical_private.to_vec(),
            pq_private: pq_private.to_vec(),
            created_at: current_timestamp(),
        };
        let encoded = Zeroizing::new(bincode::serialize(&record)?);

        self.store
            .set(&StoreKey::Identity(user_id.clone()), &encoded)?;

        info!(
            target: "crypto::keys",
            user_id = %user_id,
            "Stored identity private keys"
        );
        Ok(())
    }

    /// Сохранить всю identity пару (удобная обёртка)
    pub fn store_identity(&self, user_id: &UserId, identity: &IdentityKeyPair) -> Result<()> {
        self.store_identity_private_keys(
            user_id,
            identity.classical.private_key(),
            identity.pq.private_key(),
        )
    }

    /// Обе приватные половины одним чтением записи.
    ///
    /// Повреждённая или неполная запись считается отсутствием ключей:
    /// `has_keys`, `load_identity` и расшифровка видят одно и то же состояние.
    /// Ошибки самого хранилища пробрасываются как есть.
    pub fn load_private_pair(&self, user_id: &UserId) -> Result<Option<StoredIdentityKeys>> {
        let Some(raw) = self.store.get(&StoreKey::Identity(user_id.clone()))? else {
            return Ok(None);
        };

        match bincode::deserialize::<StoredIdentityKeys>(&raw) {
            Ok(record) if !record.classical_private.is_empty() && !record.pq_private.is_empty() => {
                Ok(Some(record))
            }
            Ok(_) => {
                warn!(
                    target: "crypto::keys",
                    user_id = %user_id,
                    "Identity record is incomplete, treating as missing keys"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(
                    target: "crypto::keys",
                    user_id = %user_id,
                    error = %e,
                    "Identity record is corrupted, treating as missing keys"
                );
                Ok(None)
            }
        }
    }

    pub fn get_classical_private_key(&self, user_id: &UserId) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self
            .load_private_pair(user_id)?
            .map(|r| Zeroizing::new(r.classical_private.clone())))
    }

    pub fn get_pq_private_key(&self, user_id: &UserId) -> Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self
            .load_private_pair(user_id)?
            .map(|r| Zeroizing::new(r.pq_private.clone())))
    }

    /// true только если обе приватные половины на месте
    pub fn has_keys(&self, user_id: &UserId) -> bool {
        match self.load_private_pair(user_id) {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!(
                    target: "crypto::keys",
                    user_id = %user_id,
                    error = %e,
                    "Failed to read identity record"
                );
                false
            }
        }
    }

    /// Загрузить полную identity пару.
    ///
    /// # Errors
    /// `KeyNotFound`, если у пользователя нет локальных ключей
    /// (в том числе если запись повреждена).
    pub fn load_identity(&self, user_id: &UserId) -> Result<IdentityKeyPair> {
        let record = self
            .load_private_pair(user_id)?
            .ok_or_else(|| CryptoError::KeyNotFound(user_id.to_string()))?;

        Ok(IdentityKeyPair {
            classical: ClassicalKeyPair::from_private::<P>(&record.classical_private)?,
            pq: PqKeyPair::from_private::<P>(&record.pq_private)?,
        })
    }

    /// Удалить обе половины. Отсутствие ключей не считается ошибкой.
    pub fn clear_keys(&self, user_id: &UserId) -> Result<()> {
        self.store.delete(&StoreKey::Identity(user_id.clone()))?;
        info!(
            target: "crypto::keys",
            user_id = %user_id,
            "Cleared identity keys"
        );
        Ok(())
    }

    /// Все пользователи, для которых на устройстве есть identity ключи
    pub fn list_users_with_stored_keys(&self) -> Result<BTreeSet<UserId>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter_map(|key| match key {
                StoreKey::Identity(user_id) => Some(user_id),
                _ => None,
            })
            .collect())
    }

    /// Стабильная X25519 пара беседы (legacy forward-secrecy режим).
    ///
    /// При первом обращении генерируется и сохраняется; дальше публичная
    /// половина выводится из сохранённой приватной.
    pub fn derive_or_create_ephemeral_key_pair(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<ClassicalKeyPair> {
        let key = StoreKey::Ephemeral(conversation_id.clone());

        if let Some(private) = self.store.get(&key)? {
            debug!(
                target: "crypto::keys",
                conversation_id = %conversation_id,
                "Derived conversation key pair from stored private key"
            );
            return ClassicalKeyPair::from_private::<P>(&private);
        }

        let pair = ClassicalKeyPair::generate::<P>()?;
        self.store.set(&key, pair.private_key())?;

        info!(
            target: "crypto::keys",
            conversation_id = %conversation_id,
            "Created conversation key pair"
        );
        Ok(pair)
    }
}
