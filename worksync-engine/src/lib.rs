pub mod config;
pub mod sync;

pub use config::EngineConfig;
pub use sync::ProjectId;
pub use sync::cache::SyncStateCache;
pub use sync::engine::{BatchError, BatchOperation, EngineError, SyncEngine, TaskKind, TransferFailure};
pub use sync::scheduler::SessionScheduler;
pub use sync::session::{CatalogError, ProjectCatalog, Session, SessionError, SessionManager};
