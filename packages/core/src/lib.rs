// Construct Messenger Hybrid Core
// End-to-end шифрование сообщений: X25519 + ML-KEM-768, dual envelope

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use api::{IdentityStatus, Messenger, MessageBody};
pub use crypto::suites::hybrid::HybridSuiteProvider;
pub use crypto::{DualEnvelopeProtocol, EnvelopeRole, KeyManager, Provenance};
pub use error::{CryptoError, Result};
pub use protocol::{DualEnvelope, HybridEnvelope, PublicKeyBundle};
pub use storage::{ConversationId, KeyStore, UserId};
