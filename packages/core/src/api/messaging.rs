// API для отправки и чтения сообщений
//
// Удалённое хранилище видит только непрозрачную строку `content`
// (JSON DualEnvelope). Расшифровка идёт по одному сообщению: ошибка одного
// не прерывает загрузку беседы, а превращается в placeholder.

use crate::api::contacts::{require_public_keys, ProfileDirectory};
use crate::api::Messenger;
use crate::config::Config;
use crate::crypto::format::{DecryptedMessage, Provenance};
use crate::crypto::provider::CryptoProvider;
use crate::crypto::session_api::EnvelopeRole;
#[cfg(feature = "desktop")]
use crate::crypto::worker;
use crate::error::{CryptoError, Result};
use crate::protocol::envelope::DualEnvelope;
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::models::{MessageStatus, StoredMessage};
use crate::storage::traits::{ConversationId, KeyStore, UserId};
use crate::utils::time::current_timestamp_millis;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
#[cfg(feature = "desktop")]
use zeroize::Zeroizing;

/// Внешнее хранилище сообщений (группировка по беседе)
pub trait MessageStore: Send + Sync {
    fn append(&self, message: StoredMessage) -> Result<()>;

    /// Страница сообщений беседы в порядке timestamp
    fn list(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredMessage>>;
}

impl<M: MessageStore + ?Sized> MessageStore for Arc<M> {
    fn append(&self, message: StoredMessage) -> Result<()> {
        (**self).append(message)
    }

    fn list(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<StoredMessage>> {
        (**self).list(conversation_id, limit, offset)
    }
}

/// Почему сообщение не удалось показать
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecryptFailure {
    /// Нет локальных ключей читателя
    MissingKeys,
    /// PQ декапсуляция не удалась
    Decapsulation,
    /// Повреждено, подделано или зашифровано не для этих ключей
    Authentication,
    /// Контент не разбирается как конверт
    Malformed,
    Other,
}

impl From<&CryptoError> for DecryptFailure {
    fn from(error: &CryptoError) -> Self {
        match error {
            CryptoError::KeyNotFound(_) => Self::MissingKeys,
            CryptoError::Decapsulation(_) => Self::Decapsulation,
            CryptoError::AuthenticationFailure(_) => Self::Authentication,
            CryptoError::Serialization(_) | CryptoError::InvalidInput(_) => Self::Malformed,
            _ => Self::Other,
        }
    }
}

/// Тело сообщения для UI.
///
/// `provenance` обязателен к показу: текст из `Provenance::Legacy` прочитан
/// без проверки целостности (его можно было подменить по битам), а
/// `Provenance::Unencrypted` никогда не был зашифрован.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text { text: String, provenance: Provenance },
    /// Placeholder "не удалось расшифровать"
    Undecryptable(DecryptFailure),
}

impl MessageBody {
    /// Текст независимо от происхождения
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Undecryptable(_) => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Self::Text { provenance, .. } => Some(*provenance),
            Self::Undecryptable(_) => None,
        }
    }

    /// Текст, только если AEAD тег проверен
    pub fn authenticated_text(&self) -> Option<&str> {
        match self {
            Self::Text {
                text,
                provenance: Provenance::Authenticated,
            } => Some(text),
            _ => None,
        }
    }

    /// Текст показан, но его целостность не проверялась
    pub fn is_unverified(&self) -> bool {
        matches!(
            self.provenance(),
            Some(Provenance::Legacy | Provenance::Unencrypted)
        )
    }
}

/// Сообщение беседы глазами конкретного пользователя
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub id: String,
    pub from: UserId,
    pub to: UserId,
    pub timestamp: i64,
    pub status: MessageStatus,
    pub body: MessageBody,
}

impl ConversationMessage {
    fn new(message: &StoredMessage, body: MessageBody) -> Self {
        Self {
            id: message.id.clone(),
            from: message.from.clone(),
            to: message.to.clone(),
            timestamp: message.timestamp,
            status: message.status,
            body,
        }
    }
}

fn role_for(message: &StoredMessage, reader: &UserId) -> EnvelopeRole {
    if &message.from == reader {
        EnvelopeRole::Sender
    } else {
        EnvelopeRole::Recipient
    }
}

fn body_from(result: Result<DecryptedMessage>, message_id: &str) -> MessageBody {
    match result {
        Ok(message) => MessageBody::Text {
            text: message.plaintext,
            provenance: message.provenance,
        },
        Err(e) => {
            debug!(
                target: "api::messenger",
                message_id = %message_id,
                error = %e,
                "Message is undecryptable"
            );
            MessageBody::Undecryptable(DecryptFailure::from(&e))
        }
    }
}

impl<S, D, M, P> Messenger<S, D, M, P>
where
    S: KeyStore,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    /// Зашифровать и сохранить сообщение.
    ///
    /// Любая ошибка шифрования прерывает отправку: в хранилище не попадает
    /// ни частичный конверт, ни открытый текст.
    pub fn send_message(
        &self,
        from: &UserId,
        to: &UserId,
        conversation_id: &ConversationId,
        plaintext: &str,
    ) -> Result<StoredMessage> {
        let (own_keys, recipient_keys) = self.send_keys(from, to)?;
        let envelope = self
            .protocol
            .package_for_send(plaintext, &own_keys, &recipient_keys)?;
        self.commit_sent(from, to, conversation_id, plaintext, &envelope)
    }

    fn send_keys(&self, from: &UserId, to: &UserId) -> Result<(PublicKeyBundle, PublicKeyBundle)> {
        let own_keys = self.own_public_keys(from)?;
        let recipient_keys = require_public_keys(&self.directory, to)?;
        Ok((own_keys, recipient_keys))
    }

    /// Сохранить готовый конверт и запомнить plaintext для своей ленты
    fn commit_sent(
        &self,
        from: &UserId,
        to: &UserId,
        conversation_id: &ConversationId,
        plaintext: &str,
        envelope: &DualEnvelope,
    ) -> Result<StoredMessage> {
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            from: from.clone(),
            to: to.clone(),
            content: envelope.to_json()?,
            timestamp: current_timestamp_millis(),
            status: MessageStatus::Sent,
        };
        self.messages.append(message.clone())?;
        self.protocol
            .remember_sent(conversation_id, &message.id, plaintext);

        info!(
            target: "api::messenger",
            message_id = %message.id,
            conversation_id = %conversation_id,
            "Sent message"
        );
        Ok(message)
    }

    /// Загрузить страницу беседы и расшифровать каждое сообщение независимо
    pub fn load_conversation(
        &self,
        reader: &UserId,
        conversation_id: &ConversationId,
        offset: usize,
    ) -> Result<Vec<ConversationMessage>> {
        let page = self.messages.list(
            conversation_id,
            Config::global().conversation_page_size,
            offset,
        )?;

        Ok(page
            .iter()
            .map(|message| {
                let body = match self.cached_body(reader, message) {
                    Some(body) => body,
                    None => body_from(
                        self.protocol
                            .read_stored_content(&message.content, role_for(message, reader), reader),
                        &message.id,
                    ),
                };
                ConversationMessage::new(message, body)
            })
            .collect())
    }

    fn cached_body(&self, reader: &UserId, message: &StoredMessage) -> Option<MessageBody> {
        if &message.from != reader {
            return None;
        }
        self.protocol
            .cached_sent(&message.conversation_id, &message.id)
            .map(|text| MessageBody::Text {
                text,
                provenance: Provenance::Authenticated,
            })
    }
}

#[cfg(feature = "desktop")]
impl<S, D, M, P> Messenger<S, D, M, P>
where
    S: KeyStore + 'static,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    /// Как `send_message`, но оба encapsulate идут на blocking пуле
    pub async fn send_message_async(
        &self,
        from: &UserId,
        to: &UserId,
        conversation_id: &ConversationId,
        plaintext: &str,
    ) -> Result<StoredMessage> {
        let (own_keys, recipient_keys) = self.send_keys(from, to)?;

        let protocol = Arc::clone(&self.protocol);
        let text = Zeroizing::new(plaintext.to_string());
        let envelope = worker::run_blocking(move || {
            protocol.package_for_send(text.as_str(), &own_keys, &recipient_keys)
        })
        .await?;

        self.commit_sent(from, to, conversation_id, plaintext, &envelope)
    }

    /// Как `load_conversation`, но расшифровка идёт параллельно на blocking пуле
    pub async fn load_conversation_async(
        &self,
        reader: &UserId,
        conversation_id: &ConversationId,
        offset: usize,
    ) -> Result<Vec<ConversationMessage>> {
        let page = self.messages.list(
            conversation_id,
            Config::global().conversation_page_size,
            offset,
        )?;

        let mut bodies: Vec<Option<MessageBody>> =
            page.iter().map(|m| self.cached_body(reader, m)).collect();

        let pending: Vec<usize> = (0..page.len()).filter(|&i| bodies[i].is_none()).collect();
        let items = pending
            .iter()
            .map(|&i| (page[i].content.clone(), role_for(&page[i], reader)))
            .collect();

        let results =
            worker::read_stored_contents(Arc::clone(&self.protocol), reader.clone(), items).await;

        for (index, result) in pending.into_iter().zip(results) {
            bodies[index] = Some(body_from(result, &page[index].id));
        }

        Ok(page
            .iter()
            .zip(bodies)
            .map(|(message, body)| {
                ConversationMessage::new(
                    message,
                    body.unwrap_or(MessageBody::Undecryptable(DecryptFailure::Other)),
                )
            })
            .collect())
    }
}
