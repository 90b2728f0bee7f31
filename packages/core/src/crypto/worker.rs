//! Фоновое выполнение CPU-bound операций
//!
//! Генерация ML-KEM ключей, encapsulate и decapsulate: решёточная
//! арифметика. Из async контекста они выносятся на blocking пул tokio.
//! Отмены нет: запущенная задача либо завершается, либо падает целиком.

use crate::crypto::format::DecryptedMessage;
use crate::crypto::keys::IdentityKeyPair;
use crate::crypto::provider::CryptoProvider;
use crate::crypto::session_api::{DualEnvelopeProtocol, EnvelopeRole};
use crate::error::{CryptoError, Result};
use crate::storage::traits::{KeyStore, UserId};
use std::sync::Arc;
use tracing::warn;

/// Выполнить задачу на blocking пуле и дождаться результата
pub async fn run_blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|e| {
        warn!(target: "crypto::worker", error = %e, "Background crypto task failed");
        CryptoError::Other(format!("Background crypto task failed: {}", e))
    })?
}

pub async fn generate_identity_key_pair<P: CryptoProvider>() -> Result<IdentityKeyPair> {
    run_blocking(IdentityKeyPair::generate::<P>).await
}

/// Расшифровать пачку сохранённых сообщений параллельно.
///
/// Результаты возвращаются в порядке входа; ошибка одного сообщения
/// не влияет на остальные.
pub async fn read_stored_contents<S, P>(
    protocol: Arc<DualEnvelopeProtocol<S, P>>,
    user_id: UserId,
    items: Vec<(String, EnvelopeRole)>,
) -> Vec<Result<DecryptedMessage>>
where
    S: KeyStore + 'static,
    P: CryptoProvider,
{
    let handles: Vec<_> = items
        .into_iter()
        .map(|(content, role)| {
            let protocol = Arc::clone(&protocol);
            let user_id = user_id.clone();
            tokio::task::spawn_blocking(move || {
                protocol.read_stored_content(&content, role, &user_id)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap_or_else(|e| {
            Err(CryptoError::Other(format!("Background crypto task failed: {}", e)))
        }));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::format::EnvelopeFormat;
    use crate::crypto::keys::KeyManager;
    use crate::crypto::suites::hybrid::HybridSuiteProvider;
    use crate::storage::memory::MemoryKeyStore;

    type P = HybridSuiteProvider;

    #[tokio::test]
    async fn test_generate_identity_off_thread() {
        let identity = generate_identity_key_pair::<P>().await.unwrap();
        assert_eq!(identity.pq.public.len(), 1184);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let result: Result<()> =
            run_blocking(|| Err(CryptoError::Storage("quota".to_string()))).await;
        assert!(matches!(result, Err(CryptoError::Storage(_))));
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let manager = Arc::new(KeyManager::<MemoryKeyStore, P>::new(MemoryKeyStore::new()));
        let bob = IdentityKeyPair::generate::<P>().unwrap();
        let bob_id = UserId::new("bob");
        manager.store_identity(&bob_id, &bob).unwrap();

        let protocol = Arc::new(
            DualEnvelopeProtocol::with_format(manager, EnvelopeFormat::SecretBox).unwrap(),
        );
        let first = protocol
            .package_for_send("first", &bob.public_keys(), &bob.public_keys())
            .unwrap();
        let second = protocol
            .package_for_send("second", &bob.public_keys(), &bob.public_keys())
            .unwrap();

        let items = vec![
            (first.to_json().unwrap(), EnvelopeRole::Recipient),
            ("{\"ciphertext\":\"!!\"}".to_string(), EnvelopeRole::Recipient),
            (second.to_json().unwrap(), EnvelopeRole::Sender),
        ];
        let results = read_stored_contents(protocol, bob_id, items).await;

        assert_eq!(results[0].as_ref().unwrap().plaintext, "first");
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().plaintext, "second");
    }
}
