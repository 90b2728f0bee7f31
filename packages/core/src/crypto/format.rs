//! Format Compatibility Layer
//!
//! Каждый конверт несёт (или, для старых данных, не несёт) номер формата.
//! Формат определяет и combiner, и симметричную конструкцию:
//!
//! | version | формат          | combiner | конструкция          | запись |
//! |---------|-----------------|----------|----------------------|--------|
//! | 0       | `LegacyStream`  | XOR      | XChaCha20            | нет    |
//! | 1       | `SecretBox`     | XOR      | XChaCha20-Poly1305   | да     |
//! | 2       | `SecretBoxHkdf` | HKDF     | XChaCha20-Poly1305   | да     |
//! | нет     | untagged        | XOR      | SecretBox → Legacy   | нет    |
//!
//! Тегированный конверт открывается ровно одной конструкцией. Перебор
//! допускается только для untagged данных, и порядок фиксирован.
//!
//! Legacy чтение не аутентифицировано. Тот, кто может переписать
//! сохранённый контент, может снять `version`, отрезать тег и подбирать
//! байты, пока результат не станет валидным UTF-8. Поэтому такой plaintext
//! всегда помечен `Provenance::Legacy`, и вызывающий код обязан показывать
//! его иначе, чем `Authenticated`.

use crate::config::Config;
use crate::crypto::handshake::{SecretCombiner, SessionKey};
use crate::crypto::messaging::MessageCipher;
use crate::crypto::provider::CryptoProvider;
use crate::error::{CryptoError, Result};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Версия формата конверта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeFormat {
    LegacyStream = 0,
    SecretBox = 1,
    SecretBoxHkdf = 2,
}

/// Порядок попыток для конверта без тега
const UNTAGGED_ATTEMPTS: [EnvelopeFormat; 2] =
    [EnvelopeFormat::SecretBox, EnvelopeFormat::LegacyStream];

impl EnvelopeFormat {
    pub fn from_version(version: u8) -> Result<Self> {
        match version {
            0 => Ok(Self::LegacyStream),
            1 => Ok(Self::SecretBox),
            2 => Ok(Self::SecretBoxHkdf),
            other => Err(CryptoError::InvalidInput(format!(
                "Unknown envelope format version: {}",
                other
            ))),
        }
    }

    pub fn version(self) -> u8 {
        self as u8
    }

    pub fn combiner(self) -> SecretCombiner {
        match self {
            Self::LegacyStream | Self::SecretBox => SecretCombiner::Xor,
            Self::SecretBoxHkdf => SecretCombiner::HkdfSha256,
        }
    }

    /// Можно ли создавать новые конверты в этом формате
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::LegacyStream)
    }

    /// Формат записи из глобальной конфигурации
    pub fn configured() -> Result<Self> {
        let format = Self::from_version(Config::global().default_envelope_format)?;
        format.ensure_writable()?;
        Ok(format)
    }

    pub fn ensure_writable(self) -> Result<()> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(CryptoError::InvalidInput(format!(
                "Envelope format {:?} is read-only",
                self
            )))
        }
    }

    /// Какие форматы пробовать при чтении, в каком порядке
    pub fn attempt_order(version: Option<u8>) -> Result<Vec<Self>> {
        match version {
            Some(version) => Ok(vec![Self::from_version(version)?]),
            None => Ok(UNTAGGED_ATTEMPTS.to_vec()),
        }
    }
}

impl Default for EnvelopeFormat {
    fn default() -> Self {
        Self::SecretBox
    }
}

/// Откуда получен plaintext
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Открыт AEAD конструкцией
    Authenticated,
    /// Восстановлен legacy stream конструкцией (целостность не проверена)
    Legacy,
    /// Хранился открытым текстом
    Unencrypted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    pub plaintext: String,
    pub provenance: Provenance,
}

impl DecryptedMessage {
    pub fn is_authenticated(&self) -> bool {
        self.provenance == Provenance::Authenticated
    }
}

/// Машина состояний расшифровки: первый успех завершает перебор.
pub struct FormatCompatibilityLayer<P: CryptoProvider> {
    _phantom: PhantomData<P>,
}

impl<P: CryptoProvider> FormatCompatibilityLayer<P> {
    /// Открыть payload конверта.
    ///
    /// `derive_key` вызывается не более одного раза на combiner; ошибки
    /// деривации (`Decapsulation`, `KeyNotFound`) не зависят от формата
    /// и возвращаются сразу.
    pub fn open<F>(
        version: Option<u8>,
        ciphertext: &[u8],
        nonce: &[u8],
        mut derive_key: F,
    ) -> Result<DecryptedMessage>
    where
        F: FnMut(SecretCombiner) -> Result<SessionKey>,
    {
        let attempts = EnvelopeFormat::attempt_order(version)?;
        let mut cached: Option<(SecretCombiner, SessionKey)> = None;
        let mut last_error = None;

        for format in attempts {
            let combiner = format.combiner();
            let key = match cached.take() {
                Some((cached_combiner, key)) if cached_combiner == combiner => key,
                _ => derive_key(combiner)?,
            };

            match Self::open_as(format, ciphertext, nonce, &key) {
                Ok(message) => {
                    if message.provenance == Provenance::Legacy {
                        warn!(
                            target: "crypto::format",
                            "Recovered message via unauthenticated legacy stream construction"
                        );
                    }
                    return Ok(message);
                }
                Err(CryptoError::AuthenticationFailure(reason)) => {
                    debug!(
                        target: "crypto::format",
                        format = ?format,
                        reason = %reason,
                        "Envelope did not open"
                    );
                    last_error = Some(reason);
                }
                Err(other) => return Err(other),
            }

            cached = Some((combiner, key));
        }

        Err(CryptoError::AuthenticationFailure(match (version, last_error) {
            (None, _) => "Envelope did not open under any known construction".to_string(),
            (Some(_), Some(reason)) => reason,
            (Some(_), None) => "Envelope did not open".to_string(),
        }))
    }

    fn open_as(
        format: EnvelopeFormat,
        ciphertext: &[u8],
        nonce: &[u8],
        key: &SessionKey,
    ) -> Result<DecryptedMessage> {
        match format {
            EnvelopeFormat::SecretBox | EnvelopeFormat::SecretBoxHkdf => {
                let plaintext = MessageCipher::<P>::open(ciphertext, nonce, key)?;
                let plaintext = String::from_utf8(plaintext.to_vec()).map_err(|_| {
                    CryptoError::InvalidInput("Decrypted message is not valid UTF-8".to_string())
                })?;
                Ok(DecryptedMessage {
                    plaintext,
                    provenance: Provenance::Authenticated,
                })
            }
            EnvelopeFormat::LegacyStream => Ok(DecryptedMessage {
                plaintext: MessageCipher::<P>::open_legacy(ciphertext, nonce, key)?,
                provenance: Provenance::Legacy,
            }),
        }
    }
}
