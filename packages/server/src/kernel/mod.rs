pub mod deps;
pub mod media;
pub mod postgres;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod tokens;
pub mod traits;

pub use deps::ServerDeps;
pub use media::SignedUrlService;
pub use postgres::{PostgresAuditLog, PostgresDispatcher, PostgresStore};
pub use tokens::RandomTokenSource;
pub use traits::{
    AuditActor, AuditEntry, BaseAuditLog, BaseClock, BaseMediaStore, BaseNotificationDispatcher,
    BaseStore, BaseTokenSource, NotificationKind, NotificationRecord, SystemClock,
};
