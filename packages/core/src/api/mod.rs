// Публичный API для мессенджера
// Высокоуровневые методы поверх гибридного E2EE ядра

pub mod contacts;
pub mod crypto;
pub mod messaging;

use crate::crypto::keys::KeyManager;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::session_api::DualEnvelopeProtocol;
use crate::crypto::suites::hybrid::HybridSuiteProvider;
use crate::error::Result;
use crate::storage::traits::KeyStore;
use contacts::ProfileDirectory;
use messaging::MessageStore;
use std::sync::Arc;

pub use crypto::IdentityStatus;
pub use messaging::{ConversationMessage, DecryptFailure, MessageBody};

/// Главный API для мессенджера.
///
/// Связывает локальное хранилище ключей, каталог профилей и хранилище
/// сообщений. Текущий пользователь всегда передаётся явно.
pub struct Messenger<S, D, M, P = HybridSuiteProvider>
where
    S: KeyStore,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    protocol: Arc<DualEnvelopeProtocol<S, P>>,
    directory: D,
    messages: M,
}

impl<S, D, M, P> Messenger<S, D, M, P>
where
    S: KeyStore,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    /// Мессенджер с форматом конвертов из глобальной конфигурации
    pub fn new(key_store: S, directory: D, messages: M) -> Result<Self> {
        let keys = Arc::new(KeyManager::new(key_store));
        Ok(Self::with_protocol(
            Arc::new(DualEnvelopeProtocol::new(keys)?),
            directory,
            messages,
        ))
    }

    pub fn with_protocol(
        protocol: Arc<DualEnvelopeProtocol<S, P>>,
        directory: D,
        messages: M,
    ) -> Self {
        Self {
            protocol,
            directory,
            messages,
        }
    }

    pub fn protocol(&self) -> &Arc<DualEnvelopeProtocol<S, P>> {
        &self.protocol
    }

    pub fn keys(&self) -> &KeyManager<S, P> {
        self.protocol.key_manager()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn messages(&self) -> &M {
        &self.messages
    }
}
