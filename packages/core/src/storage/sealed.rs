// Шифрование содержимого хранилища ключей мастер-паролем
// PBKDF2 для деривации ключа + AES-256-GCM для шифрования каждого значения

use crate::config::Config;
use crate::error::{CryptoError, Result};
use crate::storage::traits::{KeyStore, StoreKey};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};
use zeroize::Zeroizing;

const SALT_LENGTH: usize = 32;
const KEY_LENGTH: usize = 32;
// Фиксированы AES-256-GCM (96-битный nonce, 128-битный тег)
const AES_NONCE_LENGTH: usize = 12;
const GCM_TAG_LENGTH: usize = 16;

const PARAMS_ENTRY: &str = "sealed-params";
const VERIFIER_PLAINTEXT: &[u8] = b"construct-hybrid-keystore";

/// Параметры хранилища: пишутся одной записью, поэтому инициализация
/// либо проходит целиком, либо не оставляет следов.
#[derive(Serialize, Deserialize)]
struct SealedParams {
    salt: Vec<u8>,
    iterations: u32,
    verifier: Vec<u8>,
}

/// Деривировать мастер-ключ из пароля с использованием PBKDF2
///
/// # Arguments
/// * `password` - Пользовательский пароль
/// * `salt` - Соль (32 байта)
/// * `iterations` - Количество итераций PBKDF2
///
/// # Returns
/// 256-битный ключ для AES-256-GCM
pub fn derive_master_key(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    if salt.len() != SALT_LENGTH {
        return Err(CryptoError::InvalidInput(format!(
            "Invalid salt length: expected {}, got {}",
            SALT_LENGTH,
            salt.len()
        )));
    }

    if password.is_empty() {
        return Err(CryptoError::MissingParameter("password".to_string()));
    }

    let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut *key);
    Ok(key)
}

/// Генерировать случайную соль
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Декоратор над любым [`KeyStore`], шифрующий значения at-rest.
///
/// Соль, число итераций PBKDF2 и проверочное значение пароля хранятся во
/// внутреннем хранилище под служебным ключом (`StoreKey::Meta`) и не видны
/// через `list()`.
/// Имя записи используется как associated data: значение, переставленное
/// под другой ключ, не расшифруется.
pub struct SealedKeyStore<S: KeyStore> {
    inner: S,
    cipher: Aes256Gcm,
}

impl<S: KeyStore> SealedKeyStore<S> {
    /// Открыть (или инициализировать) зашифрованное хранилище
    pub fn open(inner: S, password: &str) -> Result<Self> {
        Self::open_with_iterations(inner, password, Config::global().pbkdf2_iterations)
    }

    /// `iterations` применяется только при инициализации; существующее
    /// хранилище открывается с сохранённым в нём числом итераций.
    ///
    /// # Errors
    /// `AuthenticationFailure` при неверном пароле.
    pub fn open_with_iterations(inner: S, password: &str, iterations: u32) -> Result<Self> {
        let params_key = StoreKey::Meta(PARAMS_ENTRY.to_string());

        match inner.get(&params_key)? {
            Some(raw) => {
                let params: SealedParams = bincode::deserialize(&raw).map_err(|e| {
                    CryptoError::Storage(format!("Corrupted sealed key store parameters: {}", e))
                })?;
                if params.iterations != iterations {
                    warn!(
                        target: "storage::sealed",
                        stored = params.iterations,
                        requested = iterations,
                        "Using stored PBKDF2 iteration count"
                    );
                }

                let store = Self::with_key(inner, password, &params.salt, params.iterations)?;
                let opened = store.unseal(&params_key, &params.verifier).map_err(|_| {
                    CryptoError::AuthenticationFailure("Wrong key store password".to_string())
                })?;
                if opened.as_slice() != VERIFIER_PLAINTEXT {
                    return Err(CryptoError::AuthenticationFailure(
                        "Wrong key store password".to_string(),
                    ));
                }
                Ok(store)
            }
            None => {
                let salt = generate_salt();
                let store = Self::with_key(inner, password, &salt, iterations)?;
                let params = SealedParams {
                    salt: salt.to_vec(),
                    iterations,
                    verifier: store.seal(&params_key, VERIFIER_PLAINTEXT)?,
                };
                store.inner.set(&params_key, &bincode::serialize(&params)?)?;

                info!(
                    target: "storage::sealed",
                    iterations = iterations,
                    "Initialized sealed key store"
                );
                Ok(store)
            }
        }
    }

    fn with_key(inner: S, password: &str, salt: &[u8], iterations: u32) -> Result<Self> {
        let master_key = derive_master_key(password, salt, iterations)?;
        let cipher = Aes256Gcm::new(master_key.as_ref().into());
        Ok(Self { inner, cipher })
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// nonce || ciphertext+tag
    fn seal(&self, key: &StoreKey, data: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let aad = key.to_string();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: data,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::Storage(format!("Encryption failed: {}", e)))?;

        let mut result = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn unseal(&self, key: &StoreKey, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if data.len() < AES_NONCE_LENGTH + GCM_TAG_LENGTH {
            return Err(CryptoError::Storage("Invalid sealed value: too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
        let aad = key.to_string();
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::Storage(format!("Failed to unseal entry {}", key)))?;

        Ok(Zeroizing::new(plaintext))
    }

    fn is_internal(key: &StoreKey) -> bool {
        matches!(key, StoreKey::Meta(name) if name == PARAMS_ENTRY)
    }
}

impl<S: KeyStore> KeyStore for SealedKeyStore<S> {
    fn get(&self, key: &StoreKey) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match self.inner.get(key)? {
            Some(sealed) => Ok(Some(self.unseal(key, &sealed)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &StoreKey, value: &[u8]) -> Result<()> {
        if Self::is_internal(key) {
            return Err(CryptoError::InvalidInput(format!("Reserved store key: {}", key)));
        }
        let sealed = self.seal(key, value)?;
        self.inner.set(key, &sealed)
    }

    fn delete(&self, key: &StoreKey) -> Result<()> {
        if Self::is_internal(key) {
            return Err(CryptoError::InvalidInput(format!("Reserved store key: {}", key)));
        }
        self.inner.delete(key)
    }

    fn list(&self) -> Result<Vec<StoreKey>> {
        Ok(self
            .inner
            .list()?
            .into_iter()
            .filter(|key| !Self::is_internal(key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryKeyStore;
    use crate::storage::traits::UserId;
    use std::sync::Arc;

    const TEST_ITERATIONS: u32 = 1_000;

    #[test]
    fn test_derive_master_key() {
        let salt = generate_salt();
        let password = "test_password_123";

        let key1 = derive_master_key(password, &salt, TEST_ITERATIONS).unwrap();
        let key2 = derive_master_key(password, &salt, TEST_ITERATIONS).unwrap();

        // Одинаковый пароль и соль должны давать одинаковый ключ
        assert_eq!(&*key1, &*key2);
    }

    #[test]
    fn test_derive_master_key_different_salt() {
        let key1 = derive_master_key("test_password_123", &generate_salt(), TEST_ITERATIONS).unwrap();
        let key2 = derive_master_key("test_password_123", &generate_salt(), TEST_ITERATIONS).unwrap();

        // Разные соли должны давать разные ключи
        assert_ne!(&*key1, &*key2);
    }

    #[test]
    fn test_derive_master_key_rejects_empty_password() {
        let result = derive_master_key("", &generate_salt(), TEST_ITERATIONS);
        assert!(matches!(result, Err(CryptoError::MissingParameter(_))));
    }

    #[test]
    fn test_values_are_encrypted_at_rest() {
        let inner = Arc::new(MemoryKeyStore::new());
        let sealed =
            SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
        let key = StoreKey::Identity(UserId::new("alice"));

        sealed.set(&key, b"private key bytes").unwrap();

        let raw = inner.get(&key).unwrap().unwrap();
        assert_ne!(raw.as_slice(), b"private key bytes");
        assert_eq!(sealed.get(&key).unwrap().unwrap().as_slice(), b"private key bytes");

        // Служебные записи не видны наружу
        assert_eq!(sealed.list().unwrap(), vec![key]);
    }

    #[test]
    fn test_reopen_with_correct_and_wrong_password() {
        let inner = Arc::new(MemoryKeyStore::new());
        let key = StoreKey::Identity(UserId::new("alice"));
        {
            let sealed =
                SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
            sealed.set(&key, b"secret").unwrap();
        }

        let reopened =
            SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
        assert_eq!(reopened.get(&key).unwrap().unwrap().as_slice(), b"secret");

        let wrong = SealedKeyStore::open_with_iterations(inner, "wrong5678", TEST_ITERATIONS);
        assert!(matches!(wrong, Err(CryptoError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_value_moved_to_other_key_does_not_open() {
        let inner = Arc::new(MemoryKeyStore::new());
        let sealed =
            SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
        let alice = StoreKey::Identity(UserId::new("alice"));
        let mallory = StoreKey::Identity(UserId::new("mallory"));

        sealed.set(&alice, b"alice secret").unwrap();
        let raw = inner.get(&alice).unwrap().unwrap();
        inner.set(&mallory, &raw).unwrap();

        assert!(matches!(sealed.get(&mallory), Err(CryptoError::Storage(_))));
    }

    #[test]
    fn test_sealed_value_layout() {
        let sealed =
            SealedKeyStore::open_with_iterations(MemoryKeyStore::new(), "pass1234", TEST_ITERATIONS)
                .unwrap();
        let key = StoreKey::Identity(UserId::new("alice"));

        let raw = sealed.seal(&key, b"twelve bytes").unwrap();
        assert_eq!(raw.len(), AES_NONCE_LENGTH + 12 + GCM_TAG_LENGTH);
        assert!(matches!(
            sealed.unseal(&key, &raw[..AES_NONCE_LENGTH + GCM_TAG_LENGTH - 1]),
            Err(CryptoError::Storage(_))
        ));
    }

    #[test]
    fn test_stored_iterations_win_on_reopen() {
        let inner = Arc::new(MemoryKeyStore::new());
        let key = StoreKey::Identity(UserId::new("alice"));
        {
            let sealed =
                SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
            sealed.set(&key, b"secret").unwrap();
        }

        // Изменённое значение по умолчанию не делает хранилище нечитаемым
        let reopened =
            SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS * 2).unwrap();
        assert_eq!(reopened.get(&key).unwrap().unwrap().as_slice(), b"secret");

        let wrong = SealedKeyStore::open_with_iterations(inner, "wrong5678", TEST_ITERATIONS * 2);
        assert!(matches!(wrong, Err(CryptoError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_failed_initialization_leaves_store_untouched() {
        let inner = Arc::new(MemoryKeyStore::with_quota(0));

        let first = SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS);
        assert!(matches!(first, Err(CryptoError::Storage(_))));
        assert!(inner.is_empty());

        // Повторная попытка снова инициализирует, а не ищет потерянные параметры
        let again = SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS);
        match again {
            Err(CryptoError::Storage(message)) => assert!(message.contains("quota")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_initialization_needs_single_entry() {
        let inner = Arc::new(MemoryKeyStore::with_quota(1));

        SealedKeyStore::open_with_iterations(inner.clone(), "pass1234", TEST_ITERATIONS).unwrap();
        assert_eq!(inner.len(), 1);

        let reopened = SealedKeyStore::open_with_iterations(inner, "pass1234", TEST_ITERATIONS);
        assert!(reopened.is_ok());
    }
}
