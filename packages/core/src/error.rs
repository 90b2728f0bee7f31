use thiserror::Error;

/// Ошибки гибридного E2EE ядра.
///
/// Первые пять вариантов соответствуют классам ошибок протокола; остальные
/// покрывают сериализацию, валидацию ввода и внешние хранилища.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Отсутствует ключевой материал или plaintext на входе (ошибка вызывающего кода)
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// Нет локального приватного ключа для пользователя
    #[error("No local private keys for user {0}")]
    KeyNotFound(String),

    /// PQ декапсуляция не удалась (обычно чужой/повреждённый ключ или капсула)
    #[error("KEM decapsulation failed: {0}")]
    Decapsulation(String),

    /// Симметричное открытие не удалось ни одной из допустимых конструкций
    #[error("Message authentication failed: {0}")]
    AuthenticationFailure(String),

    /// Локальное хранилище ключей отклонило операцию
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to generate keys: {0}")]
    KeyGeneration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Ошибка внешнего коллаборатора (профили, сообщения)
    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Other crypto error: {0}")]
    Other(String),
}

impl CryptoError {
    /// Ошибка относится к одному сообщению или лечится перевыпуском ключей,
    /// а не к нарушению контракта вызова.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CryptoError::KeyNotFound(_)
                | CryptoError::Decapsulation(_)
                | CryptoError::AuthenticationFailure(_)
        )
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for CryptoError {
    fn from(err: bincode::Error) -> Self {
        CryptoError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CryptoError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CryptoError::Serialization(format!("MessagePack pack error: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for CryptoError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CryptoError::Serialization(format!("MessagePack unpack error: {}", err))
    }
}

impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::Storage(err.to_string())
    }
}

impl From<rand::Error> for CryptoError {
    fn from(err: rand::Error) -> Self {
        CryptoError::KeyGeneration(err.to_string()) // General RNG error
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(CryptoError::KeyNotFound("alice".into()).is_recoverable());
        assert!(CryptoError::AuthenticationFailure("tag".into()).is_recoverable());
        assert!(CryptoError::Decapsulation("capsule".into()).is_recoverable());
        assert!(!CryptoError::Storage("quota".into()).is_recoverable());
        assert!(!CryptoError::MissingParameter("plaintext".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: CryptoError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, CryptoError::Storage(_)));
    }
}
