//! Defines the CryptoProvider trait for crypto-agility.

use crate::error::Result;
use zeroize::Zeroizing;

/// Trait that formalizes all primitive operations for a specific cipher suite.
/// Agreement, cipher and envelope layers only ever talk to primitives through
/// this trait, so a suite can be swapped (e.g. ML-KEM-1024, AES-GCM-SIV) without
/// touching protocol logic.
///
/// Keys cross this boundary as raw bytes; private material is returned in
/// [`Zeroizing`] buffers.
pub trait CryptoProvider: Send + Sync + 'static {
    /// Generates a new classical (ECDH) key pair. Returns `(private, public)`.
    fn generate_classical_keys() -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)>;

    /// Derives the classical public key from its private key.
    fn classical_public_from_private(private_key: &[u8]) -> Result<Vec<u8>>;

    /// Computes the ECDH shared secret. Rejects non-contributory results
    /// (low-order peer points).
    fn diffie_hellman(private_key: &[u8], public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// Generates a new post-quantum KEM key pair. Returns `(private, public)`.
    fn generate_kem_keys() -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)>;

    /// Extracts the KEM public key embedded in a KEM private key.
    fn kem_public_from_private(private_key: &[u8]) -> Result<Vec<u8>>;

    /// Encapsulates a shared secret to the recipient's KEM public key.
    /// Returns the capsule and the shared secret.
    fn kem_encapsulate(public_key: &[u8]) -> Result<(Vec<u8>, Zeroizing<Vec<u8>>)>;

    /// Recovers the shared secret from a capsule with the KEM private key.
    fn kem_decapsulate(private_key: &[u8], capsule: &[u8]) -> Result<Zeroizing<Vec<u8>>>;

    /// Performs authenticated encryption. The returned ciphertext carries the tag.
    fn aead_encrypt(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Performs authenticated decryption, failing closed on any tampering.
    fn aead_decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Applies the bare (unauthenticated) stream cipher keystream.
    /// Only used to read data produced before the AEAD construction existed.
    fn stream_xor(key: &[u8], nonce: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Derives a key from input key material using HKDF.
    fn hkdf_derive_key(salt: &[u8], ikm: &[u8], info: &[u8], len: usize)
        -> Result<Zeroizing<Vec<u8>>>;

    /// Generates a cryptographically secure random nonce of a specified length.
    fn generate_nonce(len: usize) -> Vec<u8>;

    /// Nonce length required by `aead_encrypt`/`stream_xor`.
    fn nonce_len() -> usize;
}
