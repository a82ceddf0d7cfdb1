pub mod calendar;
pub mod db;
pub mod errors;
pub mod models;
pub mod query;
pub mod store;

pub use errors::{AppError, AppResult};
pub use models::{CalendarCell, Page, Record, RecordDraft, RecordKind, StoreEvent};
pub use query::{Predicate, SortDirection, SortKey};
pub use store::{configure_blob_store, get_instance, RecordStore, SubscriberId};

/// Installs the global fmt subscriber. Call once from the host process;
/// returns false if a subscriber was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .is_ok()
}
