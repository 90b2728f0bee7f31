// API каталога профилей: публичные ключи контактов
//
// Удалённый профиль хранит `classicalPublicKey` / `pqPublicKey`. Читать может
// любой, писать может только владелец. Ядро читает ключи получателя перед
// шифрованием и пишет свои один раз после генерации или ротации.

use crate::error::{CryptoError, Result};
use crate::protocol::messages::PublicKeyBundle;
use crate::storage::traits::UserId;

/// Внешний каталог профилей
pub trait ProfileDirectory: Send + Sync {
    /// Опубликованные ключи пользователя; `None`, если ключей в профиле нет
    fn fetch_public_keys(&self, user_id: &UserId) -> Result<Option<PublicKeyBundle>>;

    /// Записать (перезаписать) ключи в профиль владельца
    fn publish_public_keys(&self, user_id: &UserId, bundle: &PublicKeyBundle) -> Result<()>;
}

impl<D: ProfileDirectory + ?Sized> ProfileDirectory for std::sync::Arc<D> {
    fn fetch_public_keys(&self, user_id: &UserId) -> Result<Option<PublicKeyBundle>> {
        (**self).fetch_public_keys(user_id)
    }

    fn publish_public_keys(&self, user_id: &UserId, bundle: &PublicKeyBundle) -> Result<()> {
        (**self).publish_public_keys(user_id, bundle)
    }
}

/// Ключи контакта, пригодные для шифрования.
///
/// # Errors
/// `Remote`, если контакт не опубликовал ключи; ошибки валидации bundle.
pub fn require_public_keys<D: ProfileDirectory + ?Sized>(
    directory: &D,
    user_id: &UserId,
) -> Result<PublicKeyBundle> {
    let bundle = directory
        .fetch_public_keys(user_id)?
        .ok_or_else(|| CryptoError::Remote(format!("User {} has no published keys", user_id)))?;
    bundle.validate()?;
    Ok(bundle)
}
