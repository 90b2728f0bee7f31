use crate::crypto::provider::CryptoProvider;
use crate::error::{CryptoError, Result};
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::XChaCha20;
use chacha20poly1305::{aead::Aead, KeyInit, XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use pqcrypto_kyber::kyber768;
use pqcrypto_traits::kem::{Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _};
use rand::rngs::OsRng;
use rand_core::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

const X25519_KEY_LEN: usize = 32;
const XCHACHA_NONCE_LEN: usize = 24;

/// Offset of the encapsulation key inside a Kyber768 decapsulation key:
/// `dk = s (3 * 384) || ek (1184) || H(ek) (32) || z (32)`.
const KYBER768_EK_OFFSET: usize = 3 * 384;

/// Concrete implementation of `CryptoProvider` for the hybrid suite.
pub struct HybridSuiteProvider;

fn x25519_secret(private_key: &[u8]) -> Result<StaticSecret> {
    let bytes: [u8; X25519_KEY_LEN] = private_key
        .try_into()
        .map_err(|_| CryptoError::InvalidInput("Invalid X25519 private key length".to_string()))?;
    Ok(StaticSecret::from(bytes))
}

fn x25519_public(public_key: &[u8]) -> Result<X25519PublicKey> {
    let bytes: [u8; X25519_KEY_LEN] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidInput("Invalid X25519 public key length".to_string()))?;
    Ok(X25519PublicKey::from(bytes))
}

impl CryptoProvider for HybridSuiteProvider {
    fn generate_classical_keys() -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
        let private_key = StaticSecret::random_from_rng(OsRng);
        let public_key = X25519PublicKey::from(&private_key);
        Ok((
            Zeroizing::new(private_key.to_bytes().to_vec()),
            public_key.to_bytes().to_vec(),
        ))
    }

    fn classical_public_from_private(private_key: &[u8]) -> Result<Vec<u8>> {
        let secret = x25519_secret(private_key)?;
        Ok(X25519PublicKey::from(&secret).to_bytes().to_vec())
    }

    fn diffie_hellman(private_key: &[u8], public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let secret = x25519_secret(private_key)?;
        let peer = x25519_public(public_key)?;

        let shared_secret = secret.diffie_hellman(&peer);
        if !shared_secret.was_contributory() {
            return Err(CryptoError::InvalidInput(
                "Non-contributory X25519 public key".to_string(),
            ));
        }
        Ok(Zeroizing::new(shared_secret.to_bytes().to_vec()))
    }

    fn generate_kem_keys() -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
        let (public_key, secret_key) = kyber768::keypair();
        Ok((
            Zeroizing::new(secret_key.as_bytes().to_vec()),
            public_key.as_bytes().to_vec(),
        ))
    }

    fn kem_public_from_private(private_key: &[u8]) -> Result<Vec<u8>> {
        if private_key.len() != kyber768::secret_key_bytes() {
            return Err(CryptoError::InvalidInput(format!(
                "Invalid ML-KEM private key length: expected {}, got {}",
                kyber768::secret_key_bytes(),
                private_key.len()
            )));
        }
        let end = KYBER768_EK_OFFSET + kyber768::public_key_bytes();
        Ok(private_key[KYBER768_EK_OFFSET..end].to_vec())
    }

    fn kem_encapsulate(public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)> {
        let public_key = kyber768::PublicKey::from_bytes(public_key).map_err(|_| {
            CryptoError::InvalidInput(format!(
                "Invalid ML-KEM public key length: expected {}, got {}",
                kyber768::public_key_bytes(),
                public_key.len()
            ))
        })?;

        let (shared_secret, capsule) = kyber768::encapsulate(&public_key);
        Ok((
            capsule.as_bytes().to_vec(),
            Zeroizing::new(shared_secret.as_bytes().to_vec()),
        ))
    }

    fn kem_decapsulate(private_key: &[u8], capsule: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let secret_key = kyber768::SecretKey::from_bytes(private_key).map_err(|_| {
            CryptoError::Decapsulation(format!(
                "Invalid ML-KEM private key length: expected {}, got {}",
                kyber768::secret_key_bytes(),
                private_key.len()
            ))
        })?;
        let capsule = kyber768::Ciphertext::from_bytes(capsule).map_err(|_| {
            CryptoError::Decapsulation(format!(
                "Invalid ML-KEM capsule length: expected {}, got {}",
                kyber768::ciphertext_bytes(),
                capsule.len()
            ))
        })?;

        // Implicit rejection: a foreign or altered capsule yields an unrelated
        // secret, which surfaces later as an AEAD authentication failure.
        let shared_secret = kyber768::decapsulate(&capsule, &secret_key);
        Ok(Zeroizing::new(shared_secret.as_bytes().to_vec()))
    }

    fn aead_encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != XCHACHA_NONCE_LEN {
            return Err(CryptoError::InvalidInput(format!(
                "Invalid nonce length: expected {}, got {}",
                XCHACHA_NONCE_LEN,
                nonce.len()
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidInput("Invalid AEAD key length".to_string()))?;

        cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|e| CryptoError::Other(format!("AEAD encryption failed: {}", e)))
    }

    fn aead_decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != XCHACHA_NONCE_LEN {
            return Err(CryptoError::AuthenticationFailure(format!(
                "Invalid nonce length: expected {}, got {}",
                XCHACHA_NONCE_LEN,
                nonce.len()
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| CryptoError::InvalidInput("Invalid AEAD key length".to_string()))?;

        cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|e| CryptoError::AuthenticationFailure(format!("AEAD decryption failed: {}", e)))
    }

    fn stream_xor(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut cipher = XChaCha20::new_from_slices(key, nonce).map_err(|_| {
            CryptoError::InvalidInput("Invalid stream cipher key or nonce length".to_string())
        })?;

        let mut buffer = data.to_vec();
        cipher.apply_keystream(&mut buffer);
        Ok(buffer)
    }

    fn hkdf_derive_key(
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        len: usize,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
        let mut okm = Zeroizing::new(vec![0u8; len]);
        hkdf.expand(info, &mut okm)
            .map_err(|e| CryptoError::Other(format!("Key derivation failed: {}", e)))?;
        Ok(okm)
    }

    fn generate_nonce(len: usize) -> Vec<u8> {
        let mut nonce_bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut nonce_bytes);
        nonce_bytes
    }

    fn nonce_len() -> usize {
        XCHACHA_NONCE_LEN
    }
}
