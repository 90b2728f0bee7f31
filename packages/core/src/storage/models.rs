// Модели данных для хранилища

use crate::storage::traits::{ConversationId, UserId};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Статус сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,   // Создано, но не отправлено
    Sent,      // Отправлено на сервер
    Delivered, // Доставлено получателю
    Read,      // Прочитано
    Failed,    // Ошибка отправки
}

/// Сообщение в удалённом хранилище
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: ConversationId, // Группировка по беседе
    pub from: UserId,
    pub to: UserId,
    /// JSON DualEnvelope (или legacy: одиночный конверт / сырой текст)
    pub content: String,
    pub timestamp: i64,
    pub status: MessageStatus,
}

/// Приватные половины identity ключей: одна запись на пользователя,
/// чтобы классическая и PQ половины не разъехались при конкурентной записи.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredIdentityKeys {
    #[serde(with = "serde_bytes")]
    pub classical_private: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub pq_private: Vec<u8>,
    #[zeroize(skip)]
    pub created_at: i64,
}
