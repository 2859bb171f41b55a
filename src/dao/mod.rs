/// Typed fetch/insert/update helpers.
pub mod access;
/// Pending edit buffers shared by the context tiers.
pub mod change_set;
/// Chained object contexts.
pub mod context;
/// Durable backends for the master tier.
pub mod disk_store;
/// Persistence error taxonomy.
pub mod error;
/// Cached entity definitions.
pub mod models;
/// Tier chain construction and cascading saves.
pub mod stack;
/// Storage abstraction layer errors.
pub mod storage;

pub use context::{ObjectContext, Row, Tier};
pub use error::{PersistenceError, PersistenceResult};
pub use stack::{PersistenceStack, cascade_save, save_object_context};
