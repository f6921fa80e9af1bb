// Infrastructure layer modules
pub mod config;
pub mod event_repository;
pub mod logging;
pub mod sqlite_event_repository;

// Re-exports
pub use config::{SqliteConfig, SqliteConfigError};
pub use event_repository::{
    EventRepository, EventRepositoryError, MemoryEventRepository, SaveResult, newest_first,
};
pub use logging::{LogFormat, init_logging};
pub use sqlite_event_repository::SqliteEventRepository;
