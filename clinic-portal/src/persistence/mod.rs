//! Persistence adapter
//!
//! The store only talks to the backing table through [`ScheduleRepository`].
//! Implementations announce every committed write on their change feed so
//! that every store attached to them converges.

mod memory;
mod sqlite;

pub use memory::InMemoryRepository;
pub use sqlite::SqliteRepository;

use async_trait::async_trait;
use clinic_common::events::ChangeEvent;
use clinic_common::model::{EntryPatch, NewEntry, ScheduleEntry};
use clinic_common::Result;
use tokio::sync::broadcast;

/// Buffered change notifications per subscriber
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Backing table for schedule entries
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Short name for logs ("sqlite", "memory")
    fn backend_name(&self) -> &'static str;

    /// All entries, oldest first
    async fn list(&self) -> Result<Vec<ScheduleEntry>>;

    /// Persist a submission. The repository assigns id and creation time.
    async fn insert(&self, entry: NewEntry) -> Result<ScheduleEntry>;

    /// Write the fields present in `patch`
    ///
    /// Returns `Error::NotFound` if no row has this id.
    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<()>;

    /// Row-level change notifications for writes committed after this call
    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent>;
}
