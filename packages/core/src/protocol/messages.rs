// Типы профиля, которыми ядро обменивается с удалённым хранилищем
// Соответствуют полям профиля `classicalPublicKey` / `pqPublicKey`

use crate::config::Config;
use crate::error::{CryptoError, Result};
use crate::utils::b64::serde_b64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Публичные ключи пользователя, как они лежат в удалённом профиле
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyBundle {
    /// X25519 public key (32 bytes, base64 на проводе)
    #[serde(with = "serde_b64")]
    pub classical_public_key: Vec<u8>,
    /// ML-KEM-768 encapsulation key (1184 bytes, base64 на проводе)
    #[serde(with = "serde_b64")]
    pub pq_public_key: Vec<u8>,
}

impl PublicKeyBundle {
    pub fn new(classical_public_key: Vec<u8>, pq_public_key: Vec<u8>) -> Self {
        Self {
            classical_public_key,
            pq_public_key,
        }
    }

    /// Проверить, что bundle пригоден для шифрования.
    ///
    /// # Errors
    /// `MissingParameter` для пустых полей, `InvalidInput` для неверных размеров.
    pub fn validate(&self) -> Result<()> {
        if self.classical_public_key.is_empty() {
            return Err(CryptoError::MissingParameter(
                "classical public key".to_string(),
            ));
        }
        if self.pq_public_key.is_empty() {
            return Err(CryptoError::MissingParameter("post-quantum public key".to_string()));
        }

        let cfg = Config::global();
        if self.classical_public_key.len() != cfg.classical_key_size {
            return Err(CryptoError::InvalidInput(format!(
                "Classical public key must be {} bytes, got {}",
                cfg.classical_key_size,
                self.classical_public_key.len()
            )));
        }
        if self.pq_public_key.len() != cfg.pq_public_key_size {
            return Err(CryptoError::InvalidInput(format!(
                "Post-quantum public key must be {} bytes, got {}",
                cfg.pq_public_key_size,
                self.pq_public_key.len()
            )));
        }
        Ok(())
    }

    /// Короткий отпечаток (hex первых 8 байт SHA-256 обоих ключей) для логов и UI
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.classical_public_key);
        hasher.update(&self.pq_public_key);
        hex::encode(&hasher.finalize()[..8])
    }
}
