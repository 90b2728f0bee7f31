// Жизненный цикл identity ключей
//
// | локально | в профиле          | действие                               |
// |----------|--------------------|----------------------------------------|
// | да       | совпадают          | ничего (Existing)                      |
// | да       | нет                | публикация (Published)                 |
// | да       | другие             | перепубликация локальных (Republished) |
// | нет      | нет                | генерация + публикация (Created)       |
// | нет      | есть               | ротация (Rotated): история недоступна  |

use crate::api::contacts::ProfileDirectory;
use crate::api::messaging::MessageStore;
use crate::api::Messenger;
use crate::crypto::keys::{IdentityKeyPair, KeyManager};
use crate::crypto::provider::CryptoProvider;
#[cfg(feature = "desktop")]
use crate::crypto::worker;
use crate::error::Result;
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::traits::{KeyStore, UserId};
use tracing::{info, warn};

/// Что сделал `ensure_identity`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStatus {
    /// Локальные ключи на месте и совпадают с профилем
    Existing,
    /// Первый вход: ключей не было ни локально, ни в профиле
    Created,
    /// Локальных ключей нет, а в профиле есть: ключи перевыпущены,
    /// всё, что было зашифровано под старую пару, больше не читается
    Rotated { history_unreadable: bool },
    /// Локальные ключи были, в профиле их не было
    Published,
    /// В профиле лежали чужие для этого устройства ключи, перезаписаны локальными
    Republished,
}

impl<S, D, M, P> Messenger<S, D, M, P>
where
    S: KeyStore,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    /// Привести локальные ключи и опубликованный профиль в согласованное состояние.
    ///
    /// Вызывается после успешного входа пользователя.
    pub fn ensure_identity(&self, user_id: &UserId) -> Result<IdentityStatus> {
        let remote = self.directory.fetch_public_keys(user_id)?;
        if let Some(status) = self.reconcile_existing(user_id, remote.as_ref())? {
            return Ok(status);
        }

        let identity = KeyManager::<S, P>::generate_identity_key_pair()?;
        self.install_identity(user_id, &identity, remote)
    }

    /// Ветки таблицы с локальными ключами; `None`, если ключей нет
    fn reconcile_existing(
        &self,
        user_id: &UserId,
        remote: Option<&PublicKeyBundle>,
    ) -> Result<Option<IdentityStatus>> {
        let keys = self.keys();
        if !keys.has_keys(user_id) {
            return Ok(None);
        }

        let local = keys.load_identity(user_id)?.public_keys();
        let status = match remote {
            Some(remote) if *remote == local => IdentityStatus::Existing,
            Some(remote) => {
                warn!(
                    target: "api::messenger",
                    user_id = %user_id,
                    published = %remote.fingerprint(),
                    local = %local.fingerprint(),
                    "Published keys do not match local keys, republishing"
                );
                self.directory.publish_public_keys(user_id, &local)?;
                IdentityStatus::Republished
            }
            None => {
                self.directory.publish_public_keys(user_id, &local)?;
                info!(
                    target: "api::messenger",
                    user_id = %user_id,
                    fingerprint = %local.fingerprint(),
                    "Published existing identity keys"
                );
                IdentityStatus::Published
            }
        };
        Ok(Some(status))
    }

    /// Сохранить новую пару локально, затем опубликовать.
    ///
    /// Если публикация упадёт, локальные ключи останутся, и следующий
    /// `ensure_identity` перепубликует их.
    fn install_identity(
        &self,
        user_id: &UserId,
        identity: &IdentityKeyPair,
        remote: Option<PublicKeyBundle>,
    ) -> Result<IdentityStatus> {
        self.keys().store_identity(user_id, identity)?;
        let published = identity.public_keys();
        self.directory.publish_public_keys(user_id, &published)?;

        match remote {
            None => {
                info!(
                    target: "api::messenger",
                    user_id = %user_id,
                    fingerprint = %published.fingerprint(),
                    "Created identity keys"
                );
                Ok(IdentityStatus::Created)
            }
            Some(previous) => {
                warn!(
                    target: "api::messenger",
                    user_id = %user_id,
                    previous = %previous.fingerprint(),
                    current = %published.fingerprint(),
                    "Local keys were missing, identity rotated; messages encrypted to the previous keys are unreadable"
                );
                Ok(IdentityStatus::Rotated {
                    history_unreadable: true,
                })
            }
        }
    }

    /// Публичные ключи текущего пользователя из локальной пары
    pub fn own_public_keys(&self, user_id: &UserId) -> Result<PublicKeyBundle> {
        Ok(self.keys().load_identity(user_id)?.public_keys())
    }

    /// Явное удаление ключей (удаление ключей пользователем или выход с очисткой).
    /// Опубликованный профиль не трогается.
    pub fn remove_identity(&self, user_id: &UserId) -> Result<()> {
        self.keys().clear_keys(user_id)?;
        warn!(
            target: "api::messenger",
            user_id = %user_id,
            "Removed local identity keys"
        );
        Ok(())
    }
}

#[cfg(feature = "desktop")]
impl<S, D, M, P> Messenger<S, D, M, P>
where
    S: KeyStore,
    D: ProfileDirectory,
    M: MessageStore,
    P: CryptoProvider,
{
    /// Как `ensure_identity`, но генерация ML-KEM ключей идёт на blocking пуле
    pub async fn ensure_identity_async(&self, user_id: &UserId) -> Result<IdentityStatus> {
        let remote = self.directory.fetch_public_keys(user_id)?;
        if let Some(status) = self.reconcile_existing(user_id, remote.as_ref())? {
            return Ok(status);
        }

        let identity = worker::generate_identity_key_pair::<P>().await?;
        self.install_identity(user_id, &identity, remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::suites::hybrid::HybridSuiteProvider;
    use crate::error::CryptoError;
    use crate::storage::memory::{MemoryKeyStore, MemoryMessageStore, MemoryProfileDirectory};

    type TestMessenger =
        Messenger<MemoryKeyStore, MemoryProfileDirectory, MemoryMessageStore, HybridSuiteProvider>;

    fn messenger() -> TestMessenger {
        Messenger::new(
            MemoryKeyStore::new(),
            MemoryProfileDirectory::new(),
            MemoryMessageStore::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_first_login_creates_and_publishes() {
        let m = messenger();
        let alice = UserId::new("alice");

        assert_eq!(m.ensure_identity(&alice).unwrap(), IdentityStatus::Created);
        let published = m.directory().fetch_public_keys(&alice).unwrap().unwrap();
        assert_eq!(published, m.own_public_keys(&alice).unwrap());

        assert_eq!(m.ensure_identity(&alice).unwrap(), IdentityStatus::Existing);
    }

    #[test]
    fn test_missing_local_keys_rotate() {
        let m = messenger();
        let alice = UserId::new("alice");
        m.ensure_identity(&alice).unwrap();
        let old = m.own_public_keys(&alice).unwrap();

        m.remove_identity(&alice).unwrap();
        assert_eq!(
            m.ensure_identity(&alice).unwrap(),
            IdentityStatus::Rotated {
                history_unreadable: true
            }
        );

        let published = m.directory().fetch_public_keys(&alice).unwrap().unwrap();
        assert_ne!(published, old);
        assert_eq!(published, m.own_public_keys(&alice).unwrap());
    }

    #[test]
    fn test_local_keys_without_profile_are_published() {
        let m = messenger();
        let alice = UserId::new("alice");
        let identity = KeyManager::<MemoryKeyStore, HybridSuiteProvider>::generate_identity_key_pair().unwrap();
        m.keys().store_identity(&alice, &identity).unwrap();

        assert_eq!(m.ensure_identity(&alice).unwrap(), IdentityStatus::Published);
        assert_eq!(
            m.directory().fetch_public_keys(&alice).unwrap().unwrap(),
            identity.public_keys()
        );
    }

    #[test]
    fn test_stale_profile_is_republished() {
        let m = messenger();
        let alice = UserId::new("alice");
        m.ensure_identity(&alice).unwrap();
        m.directory()
            .publish_public_keys(&alice, &PublicKeyBundle::new(vec![7; 32], vec![7; 1184]))
            .unwrap();

        assert_eq!(m.ensure_identity(&alice).unwrap(), IdentityStatus::Republished);
        assert_eq!(
            m.directory().fetch_public_keys(&alice).unwrap().unwrap(),
            m.own_public_keys(&alice).unwrap()
        );
    }

    #[test]
    fn test_own_public_keys_require_local_identity() {
        let m = messenger();
        assert!(matches!(
            m.own_public_keys(&UserId::new("ghost")),
            Err(CryptoError::KeyNotFound(_))
        ));
    }

    #[cfg(feature = "desktop")]
    #[tokio::test]
    async fn test_async_identity_follows_same_lifecycle() {
        let m = messenger();
        let alice = UserId::new("alice");

        assert_eq!(m.ensure_identity_async(&alice).await.unwrap(), IdentityStatus::Created);
        assert_eq!(m.ensure_identity_async(&alice).await.unwrap(), IdentityStatus::Existing);
        assert_eq!(
            m.directory().fetch_public_keys(&alice).unwrap().unwrap(),
            m.own_public_keys(&alice).unwrap()
        );

        m.remove_identity(&alice).unwrap();
        assert_eq!(
            m.ensure_identity_async(&alice).await.unwrap(),
            IdentityStatus::Rotated {
                history_unreadable: true
            }
        );
    }
}
