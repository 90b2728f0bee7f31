//! Hybrid Key Agreement
//!
//! Одноразовое согласование 32-байтового ключа сообщения между отправителем
//! и identity ключами получателя. Безопасность держится, пока не сломан хотя бы
//! один из примитивов: ML-KEM-768 или X25519.
//!
//! ## Dataflow
//! ```text
//! Alice (отправитель)                        Bob (получатель)
//! ===================                        ================
//!
//! 1. Генерирует одноразовую X25519 пару (e_priv, e_pub)
//! 2. (capsule, pq_ss) = ML-KEM.Encaps(bob_pq_pub)
//! 3. dh_ss = DH(e_priv, bob_classical_pub)
//! 4. final_key = combine(pq_ss, dh_ss)
//! 5. Отправляет (capsule, e_pub) в конверте
//!
//!                                            1. pq_ss = ML-KEM.Decaps(bob_pq_priv, capsule)
//!                                            2. dh_ss = DH(bob_classical_priv, e_pub)
//!                                            3. final_key = combine(pq_ss, dh_ss) (тот же!)
//! ```
//!
//! ## Combiner
//! `SecretCombiner::Xor` совместим с уже сохранёнными сообщениями.
//! `SecretCombiner::HkdfSha256` пропускает оба секрета через HKDF с привязкой
//! к ephemeral ключу и метке протокола.

use crate::config::Config;
use crate::crypto::provider::CryptoProvider;
use crate::error::{CryptoError, Result};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const SESSION_KEY_LEN: usize = 32;

/// Метка контекста для HKDF combiner
pub const HKDF_COMBINER_INFO: &[u8] = b"construct-hybrid/v2 ML-KEM-768+X25519 message key";

/// Способ объединения PQ и классического секретов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretCombiner {
    /// Побайтовый XOR (исходный формат)
    Xor,
    /// HKDF-SHA256(salt = ephemeral_public, ikm = pq_ss || dh_ss, info = метка)
    HkdfSha256,
}

/// Итоговый ключ сообщения. Затирается при drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidInput(format!(
                "Invalid session key length: expected {}, got {}",
                SESSION_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Результат encapsulate: ключ остаётся у отправителя, capsule и
/// ephemeral_public уходят в конверт.
#[derive(Debug)]
pub struct Encapsulation {
    pub final_key: SessionKey,
    pub capsule: Vec<u8>,
    pub ephemeral_public: Vec<u8>,
}

/// Гибридное согласование ключа поверх произвольного CryptoProvider
pub struct HybridKeyAgreement<P: CryptoProvider> {
    combiner: SecretCombiner,
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider> HybridKeyAgreement<P> {
    pub fn new(combiner: SecretCombiner) -> Self {
        Self {
            combiner,
            _phantom: PhantomData,
        }
    }

    pub fn combiner(&self) -> SecretCombiner {
        self.combiner
    }

    /// Сторона отправителя. Каждый вызов генерирует свежую ephemeral пару.
    pub fn encapsulate(
        &self,
        recipient_pq_public: &[u8],
        recipient_classical_public: &[u8],
    ) -> Result<Encapsulation> {
        if recipient_pq_public.is_empty() {
            return Err(CryptoError::MissingParameter(
                "recipient post-quantum public key".to_string(),
            ));
        }
        if recipient_classical_public.is_empty() {
            return Err(CryptoError::MissingParameter(
                "recipient classical public key".to_string(),
            ));
        }

        let (ephemeral_private, ephemeral_public) = P::generate_classical_keys()?;
        let (capsule, pq_secret) = P::kem_encapsulate(recipient_pq_public)?;
        let dh_secret = P::diffie_hellman(&ephemeral_private, recipient_classical_public)?;

        let final_key = self.combine(&pq_secret, &dh_secret, &ephemeral_public)?;

        debug!(
            target: "crypto::handshake",
            combiner = ?self.combiner,
            capsule_len = capsule.len(),
            "Encapsulated message key"
        );

        Ok(Encapsulation {
            final_key,
            capsule,
            ephemeral_public,
        })
    }

    /// Сторона получателя.
    ///
    /// # Errors
    /// `Decapsulation`, если capsule или ключи имеют неверную форму.
    /// Чужой приватный ключ при корректных длинах даёт другой ключ
    /// (implicit rejection ML-KEM), что проявится на уровне AEAD.
    pub fn decapsulate(
        &self,
        capsule: &[u8],
        sender_ephemeral_public: &[u8],
        own_pq_private: &[u8],
        own_classical_private: &[u8],
    ) -> Result<SessionKey> {
        if own_pq_private.is_empty() || own_classical_private.is_empty() {
            return Err(CryptoError::MissingParameter("own private key".to_string()));
        }

        let pq_secret = P::kem_decapsulate(own_pq_private, capsule)?;
        let dh_secret = P::diffie_hellman(own_classical_private, sender_ephemeral_public)
            .map_err(|e| CryptoError::Decapsulation(format!("Classical agreement failed: {}", e)))?;

        let final_key = self.combine(&pq_secret, &dh_secret, sender_ephemeral_public)?;

        debug!(
            target: "crypto::handshake",
            combiner = ?self.combiner,
            "Decapsulated message key"
        );
        Ok(final_key)
    }

    fn combine(
        &self,
        pq_secret: &[u8],
        dh_secret: &[u8],
        ephemeral_public: &[u8],
    ) -> Result<SessionKey> {
        let expected = Config::global().shared_secret_size;
        if pq_secret.len() != expected || dh_secret.len() != expected {
            return Err(CryptoError::InvalidInput(format!(
                "Shared secrets must be {} bytes, got {} and {}",
                expected,
                pq_secret.len(),
                dh_secret.len()
            )));
        }

        match self.combiner {
            SecretCombiner::Xor => {
                let mut key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
                for (out, (a, b)) in key.iter_mut().zip(pq_secret.iter().zip(dh_secret)) {
                    *out = a ^ b;
                }
                Ok(SessionKey(*key))
            }
            SecretCombiner::HkdfSha256 => {
                let mut ikm = Zeroizing::new(Vec::with_capacity(pq_secret.len() + dh_secret.len()));
                ikm.extend_from_slice(pq_secret);
                ikm.extend_from_slice(dh_secret);

                let okm =
                    P::hkdf_derive_key(ephemeral_public, &ikm, HKDF_COMBINER_INFO, SESSION_KEY_LEN)?;
                SessionKey::from_bytes(&okm)
            }
        }
    }
}

impl<P: CryptoProvider> Default for HybridKeyAgreement<P> {
    fn default() -> Self {
        Self::new(SecretCombiner::Xor)
    }
}
