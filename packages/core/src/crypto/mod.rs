//! Криптографический модуль
//!
//! # Архитектура
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Application                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              DualEnvelopeProtocol (session_api)             │
//! │  - Один send = два конверта (forRecipient + forSender)      │
//! │  - Отправитель перечитывает свою историю через forSender    │
//! │  - Транзиентный кэш только что отправленных сообщений       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │            FormatCompatibilityLayer (format)                │
//! │  - EnvelopeFormat: LegacyStream / SecretBox / SecretBoxHkdf │
//! │  - Детерминированный порядок попыток для untagged данных    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                ┌─────────────┴─────────────┐
//!                ▼                           ▼
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │ HybridKeyAgreement        │  │  MessageCipher           │
//! │  (handshake)              │  │  (messaging)             │
//! │  - ML-KEM encapsulation   │  │  - XChaCha20-Poly1305    │
//! │  - Ephemeral X25519 DH    │  │  - Legacy XChaCha20      │
//! │  - SecretCombiner         │  │    (только чтение)       │
//! └───────────────────────────┘  └──────────────────────────┘
//!                │                           │
//!                └─────────────┬─────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CryptoProvider (Crypto-Agility)                │
//! │  - KEM (X25519, ML-KEM-768)                                 │
//! │  - AEAD (XChaCha20-Poly1305)                                │
//! │  - KDF (HKDF-SHA256)                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Модули
//!
//! ### Core Traits
//! - [`provider`]: CryptoProvider trait для crypto-agility
//!
//! ### Implementations
//! - [`suites`]: Реализации CryptoProvider (Hybrid)
//! - [`handshake`]: гибридное согласование ключа (KEM + DH)
//! - [`messaging`]: симметричное шифрование сообщения
//! - [`format`]: версии конвертов и fallback при расшифровке
//!
//! ### High-Level APIs
//! - [`session_api`]: DualEnvelopeProtocol
//!
//! ### Utilities
//! - [`keys`]: KeyManager для управления identity и эфемерными ключами
//! - `worker`: вынос CPU-bound PQ операций с интерактивного потока

// ============================================================================
// Core Traits
// ============================================================================

/// CryptoProvider trait для crypto-agility
pub mod provider;

// ============================================================================
// Implementations
// ============================================================================

/// Криптографические наборы
pub mod suites;

/// Hybrid key agreement (ML-KEM-768 + X25519)
pub mod handshake;

/// Message cipher (secretbox + legacy stream)
pub mod messaging;

/// Версии формата конверта
pub mod format;

// ============================================================================
// High-Level APIs
// ============================================================================

/// Dual envelope protocol
pub mod session_api;

// ============================================================================
// Utilities
// ============================================================================

pub mod keys;

#[cfg(feature = "desktop")]
pub mod worker;

// ============================================================================
// Re-exports для удобства
// ============================================================================

pub use format::{DecryptedMessage, EnvelopeFormat, Provenance};
pub use handshake::{HybridKeyAgreement, SecretCombiner, SessionKey};
pub use keys::{IdentityKeyPair, KeyManager};
pub use messaging::MessageCipher;
pub use provider::CryptoProvider;
pub use session_api::{DualEnvelopeProtocol, EnvelopeRole};
