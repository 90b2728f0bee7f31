// Wire format (MessagePack сериализация)
// Используется для передачи конвертов через бинарные транспорты

use crate::error::{CryptoError, Result};
use crate::protocol::envelope::DualEnvelope;
use serde::{Deserialize, Serialize};

/// Упаковать DualEnvelope в MessagePack (структуры как map, бинарные поля как bin)
pub fn pack_envelope(envelope: &DualEnvelope) -> Result<Vec<u8>> {
    pack_raw(envelope)
}

/// Распаковать DualEnvelope из MessagePack
pub fn unpack_envelope(data: &[u8]) -> Result<DualEnvelope> {
    unpack_raw(data)
}

/// Упаковать произвольные данные в MessagePack
pub fn pack_raw<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(data)
        .map_err(|e| CryptoError::Serialization(format!("MessagePack pack error: {}", e)))
}

/// Распаковать MessagePack в произвольный тип
pub fn unpack_raw<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T> {
    rmp_serde::from_slice(data)
        .map_err(|e| CryptoError::Serialization(format!("MessagePack unpack error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::envelope::HybridEnvelope;

    fn envelope(version: Option<u8>) -> HybridEnvelope {
        HybridEnvelope {
            ciphertext: vec![0xAB; 40],
            nonce: vec![1; 24],
            ephemeral_public_key: vec![2; 32],
            kem_capsule: vec![3; 1088],
            version,
        }
    }

    #[test]
    fn test_pack_unpack_envelope() {
        let dual = DualEnvelope {
            for_recipient: envelope(Some(1)),
            for_sender: envelope(None),
        };
        let packed = pack_envelope(&dual).unwrap();
        assert_eq!(unpack_envelope(&packed).unwrap(), dual);
    }

    #[test]
    fn test_binary_fields_are_not_base64() {
        let dual = DualEnvelope {
            for_recipient: envelope(Some(1)),
            for_sender: envelope(Some(1)),
        };
        let packed = pack_envelope(&dual).unwrap();
        let json = dual.to_json().unwrap();
        // bin вместо base64 строк: две капсулы по 1088 байт без раздувания на 4/3
        assert!(packed.len() < json.len());
    }

    #[test]
    fn test_unpack_garbage() {
        assert!(matches!(
            unpack_envelope(&[0xc1, 0x00]),
            Err(CryptoError::Serialization(_))
        ));
    }
}
