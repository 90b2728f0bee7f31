//! Dual Envelope Protocol
//!
//! Один send = два независимых гибридных конверта:
//!
//! ```text
//! DualEnvelope
//!   ├── forRecipient  - encapsulate + seal под ключами получателя
//!   └── forSender     - encapsulate + seal под собственными ключами
//! ```
//!
//! Автор перечитывает свою историю через `forSender`, не храня plaintext.
//! Транзиентный кэш только что отправленных сообщений экономит повторную
//! декапсуляцию, но промах кэша всегда разрешается через `forSender`.
//!
//! ## Ответственность
//! - Сборка DualEnvelope (обе половины или ничего)
//! - Выбор половины по роли читателя
//! - Чтение legacy контента (одиночный конверт, открытый текст)
//!
//! ## Не отвечает за
//! - Хранение сообщений и профилей (внешние коллабораторы, см. `api`)
//! - Генерацию identity ключей (это делает KeyManager)

use crate::config::Config;
use crate::crypto::format::{DecryptedMessage, EnvelopeFormat, FormatCompatibilityLayer, Provenance};
use crate::crypto::handshake::HybridKeyAgreement;
use crate::crypto::keys::KeyManager;
use crate::crypto::messaging::MessageCipher;
use crate::crypto::provider::CryptoProvider;
use crate::error::{CryptoError, Result};
use crate::protocol::envelope::{DualEnvelope, HybridEnvelope, StoredContent};
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::traits::{ConversationId, KeyStore, UserId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};
use zeroize::Zeroizing;

pub use crate::protocol::envelope::EnvelopeRole;

/// Ограниченный кэш plaintext собственных отправленных сообщений
struct SentMessageCache {
    capacity: usize,
    conversations: HashMap<ConversationId, VecDeque<(String, Zeroizing<String>)>>,
}

impl SentMessageCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            conversations: HashMap::new(),
        }
    }

    fn insert(&mut self, conversation_id: &ConversationId, message_id: &str, plaintext: &str) {
        if self.capacity == 0 {
            return;
        }
        let entries = self
            .conversations
            .entry(conversation_id.clone())
            .or_default();

        entries.retain(|(id, _)| id != message_id);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((message_id.to_string(), Zeroizing::new(plaintext.to_string())));
    }

    fn get(&self, conversation_id: &ConversationId, message_id: &str) -> Option<String> {
        self.conversations
            .get(conversation_id)?
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, plaintext)| plaintext.as_str().to_owned())
    }
}

/// Протокол двойного конверта поверх KeyManager
pub struct DualEnvelopeProtocol<S: KeyStore, P: CryptoProvider> {
    keys: Arc<KeyManager<S, P>>,
    format: EnvelopeFormat,
    sent_cache: Mutex<SentMessageCache>,
}

impl<S: KeyStore, P: CryptoProvider> DualEnvelopeProtocol<S, P> {
    /// Протокол с форматом записи из глобальной конфигурации
    pub fn new(keys: Arc<KeyManager<S, P>>) -> Result<Self> {
        Self::with_format(keys, EnvelopeFormat::configured()?)
    }

    /// # Errors
    /// `InvalidInput`, если формат доступен только для чтения.
    pub fn with_format(keys: Arc<KeyManager<S, P>>, format: EnvelopeFormat) -> Result<Self> {
        format.ensure_writable()?;
        Ok(Self {
            keys,
            format,
            sent_cache: Mutex::new(SentMessageCache::new(Config::global().sent_cache_capacity)),
        })
    }

    pub fn key_manager(&self) -> &Arc<KeyManager<S, P>> {
        &self.keys
    }

    pub fn format(&self) -> EnvelopeFormat {
        self.format
    }

    /// Один конверт для одной пары публичных ключей, свежий ephemeral и nonce
    pub fn seal_envelope(&self, plaintext: &str, recipient: &PublicKeyBundle) -> Result<HybridEnvelope> {
        recipient.validate()?;

        let agreement = HybridKeyAgreement::<P>::new(self.format.combiner());
        let encapsulation =
            agreement.encapsulate(&recipient.pq_public_key, &recipient.classical_public_key)?;
        let sealed = MessageCipher::<P>::seal(plaintext.as_bytes(), &encapsulation.final_key)?;

        Ok(HybridEnvelope {
            ciphertext: sealed.ciphertext,
            nonce: sealed.nonce,
            ephemeral_public_key: encapsulation.ephemeral_public,
            kem_capsule: encapsulation.capsule,
            version: Some(self.format.version()),
        })
    }

    /// Зашифровать сообщение для получателя и для себя.
    ///
    /// Ошибка любой половины прерывает отправку целиком.
    pub fn package_for_send(
        &self,
        plaintext: &str,
        own_keys: &PublicKeyBundle,
        recipient_keys: &PublicKeyBundle,
    ) -> Result<DualEnvelope> {
        let for_recipient = self.seal_envelope(plaintext, recipient_keys)?;
        let for_sender = self.seal_envelope(plaintext, own_keys)?;

        debug!(
            target: "crypto::session",
            format = ?self.format,
            recipient = %recipient_keys.fingerprint(),
            sender = %own_keys.fingerprint(),
            "Packaged dual envelope"
        );

        Ok(DualEnvelope {
            for_recipient,
            for_sender,
        })
    }

    /// Открыть одиночный конверт приватными ключами `user_id`.
    ///
    /// # Errors
    /// `KeyNotFound`, если у пользователя нет локальных ключей. Подстановки
    /// ключа или placeholder-а не бывает.
    pub fn open_envelope(&self, envelope: &HybridEnvelope, user_id: &UserId) -> Result<DecryptedMessage> {
        let Some(record) = self.keys.load_private_pair(user_id)? else {
            return Err(CryptoError::KeyNotFound(user_id.to_string()));
        };

        FormatCompatibilityLayer::<P>::open(
            envelope.version,
            &envelope.ciphertext,
            &envelope.nonce,
            |combiner| {
                HybridKeyAgreement::<P>::new(combiner).decapsulate(
                    &envelope.kem_capsule,
                    &envelope.ephemeral_public_key,
                    &record.pq_private,
                    &record.classical_private,
                )
            },
        )
    }

    /// Открыть половину DualEnvelope, выбранную ролью читателя
    pub fn unpackage_for_read(
        &self,
        envelope: &DualEnvelope,
        role: EnvelopeRole,
        user_id: &UserId,
    ) -> Result<DecryptedMessage> {
        trace!(
            target: "crypto::session",
            role = ?role,
            user_id = %user_id,
            "Opening dual envelope"
        );
        self.open_envelope(envelope.envelope_for(role), user_id)
    }

    /// Прочитать поле `content` сохранённого сообщения любого поколения.
    ///
    /// Одиночный конверт открывается ключами читателя вне зависимости от роли;
    /// открытый текст возвращается с `Provenance::Unencrypted`.
    pub fn read_stored_content(
        &self,
        content: &str,
        role: EnvelopeRole,
        user_id: &UserId,
    ) -> Result<DecryptedMessage> {
        match StoredContent::parse(content)? {
            StoredContent::Dual(envelope) => self.unpackage_for_read(&envelope, role, user_id),
            StoredContent::Single(envelope) => self.open_envelope(&envelope, user_id),
            StoredContent::Plaintext(text) => Ok(DecryptedMessage {
                plaintext: text,
                provenance: Provenance::Unencrypted,
            }),
        }
    }

    /// Запомнить plaintext только что отправленного сообщения
    pub fn remember_sent(&self, conversation_id: &ConversationId, message_id: &str, plaintext: &str) {
        self.sent_cache
            .lock()
            .insert(conversation_id, message_id, plaintext);
    }

    pub fn cached_sent(&self, conversation_id: &ConversationId, message_id: &str) -> Option<String> {
        self.sent_cache.lock().get(conversation_id, message_id)
    }

    pub fn forget_conversation(&self, conversation_id: &ConversationId) {
        self.sent_cache.lock().conversations.remove(conversation_id);
    }
}
