// Модуль хранилища ключей и внешних коллабораторов

pub mod file;
pub mod memory;
pub mod models;
pub mod sealed;
pub mod traits;

pub use file::FileKeyStore;
pub use memory::{MemoryKeyStore, MemoryMessageStore, MemoryProfileDirectory};
pub use sealed::SealedKeyStore;
pub use traits::{ConversationId, KeyStore, StoreKey, UserId};
