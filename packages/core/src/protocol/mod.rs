// Протокол: типы на проводе и в удалённом хранилище

pub mod envelope;
pub mod messages;
pub mod wire;

pub use envelope::{DualEnvelope, EnvelopeRole, HybridEnvelope, StoredContent};
pub use messages::PublicKeyBundle;
