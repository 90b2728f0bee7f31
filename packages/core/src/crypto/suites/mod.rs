//! Криптографические наборы (Crypto Suites)
//!
//! Этот модуль содержит реализации CryptoProvider trait.
//!
//! ## Доступные наборы
//!
//! ### Hybrid Suite (текущий)
//! - **Classical KEM**: X25519 (ECDH на Curve25519)
//! - **PQ KEM**: ML-KEM-768 (Kyber768)
//! - **AEAD**: XChaCha20-Poly1305 (24-байтовый nonce)
//! - **Legacy stream**: XChaCha20 без аутентификации (только чтение)
//! - **KDF**: HKDF-SHA256
//!
//! ## Выбор suite
//!
//! ```rust
//! use construct_hybrid_core::crypto::suites::hybrid::HybridSuiteProvider;
//! use construct_hybrid_core::crypto::provider::CryptoProvider;
//!
//! type MySuite = HybridSuiteProvider;
//!
//! let (private_key, public_key) = MySuite::generate_kem_keys().unwrap();
//! assert_eq!(public_key.len(), 1184);
//! assert_eq!(private_key.len(), 2400);
//! ```

pub mod hybrid;
