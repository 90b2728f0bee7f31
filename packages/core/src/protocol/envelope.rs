// Формат конвертов на проводе и в удалённом хранилище
//
// HybridEnvelope = { ciphertext, nonce, ephemeralPublicKey, kemCapsule, version? }
// DualEnvelope   = { forRecipient: HybridEnvelope, forSender: HybridEnvelope }
//
// Бинарные поля: base64 в JSON.

use crate::crypto::format::EnvelopeFormat;
use crate::error::{CryptoError, Result};
use crate::utils::b64::serde_b64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Один конверт: одно сообщение для одной пары публичных ключей
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridEnvelope {
    #[serde(with = "serde_b64")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "serde_b64")]
    pub nonce: Vec<u8>,
    #[serde(with = "serde_b64")]
    pub ephemeral_public_key: Vec<u8>,
    #[serde(with = "serde_b64")]
    pub kem_capsule: Vec<u8>,
    /// Номер формата; отсутствует у конвертов, созданных до версионирования
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
}

impl HybridEnvelope {
    /// Формат, если конверт тегирован
    pub fn format(&self) -> Result<Option<EnvelopeFormat>> {
        self.version.map(EnvelopeFormat::from_version).transpose()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Какую половину DualEnvelope открывает читатель
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeRole {
    /// Автор сообщения перечитывает свою историю
    Sender,
    Recipient,
}

/// Представление одного сообщения: два независимо зашифрованных конверта
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualEnvelope {
    pub for_recipient: HybridEnvelope,
    pub for_sender: HybridEnvelope,
}

impl DualEnvelope {
    pub fn envelope_for(&self, role: EnvelopeRole) -> &HybridEnvelope {
        match role {
            EnvelopeRole::Sender => &self.for_sender,
            EnvelopeRole::Recipient => &self.for_recipient,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Содержимое поля `content` сохранённого сообщения.
///
/// Текущие сообщения хранятся как `Dual`. Старые данные бывают одиночным конвертом
/// (в том числе `{ forRecipient }` без `forSender`) или открытым текстом.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredContent {
    Dual(DualEnvelope),
    Single(HybridEnvelope),
    Plaintext(String),
}

impl StoredContent {
    /// Классифицировать сохранённую строку.
    ///
    /// # Errors
    /// `Serialization`, если строка похожа на конверт (объект с
    /// `forRecipient` или `ciphertext`), но не разбирается как конверт.
    /// Такой контент не выдаётся за открытый текст.
    pub fn parse(content: &str) -> Result<Self> {
        let value = match serde_json::from_str::<Value>(content) {
            Ok(value) => value,
            Err(_) => return Ok(Self::Plaintext(content.to_string())),
        };

        let (has_recipient, has_sender, has_ciphertext) = match &value {
            Value::Object(map) => (
                map.contains_key("forRecipient"),
                map.contains_key("forSender"),
                map.contains_key("ciphertext"),
            ),
            _ => (false, false, false),
        };

        match value {
            value @ Value::Object(_) if has_recipient && has_sender => {
                Ok(Self::Dual(Self::typed(value, "dual envelope")?))
            }
            Value::Object(mut map) if has_recipient => {
                let recipient = map.remove("forRecipient").unwrap_or(Value::Null);
                Ok(Self::Single(Self::typed(recipient, "recipient envelope")?))
            }
            value @ Value::Object(_) if has_ciphertext => {
                Ok(Self::Single(Self::typed(value, "hybrid envelope")?))
            }
            Value::String(text) => Ok(Self::Plaintext(text)),
            _ => Ok(Self::Plaintext(content.to_string())),
        }
    }

    fn typed<T: for<'de> Deserialize<'de>>(value: Value, what: &str) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| CryptoError::Serialization(format!("Malformed {}: {}", what, e)))
    }
}
