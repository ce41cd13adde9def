#[cfg(feature = "couch-store")]
/// CouchDB backend.
pub mod couchdb;
/// Single-device JSON file backend.
pub mod local;
#[cfg(feature = "mongo-store")]
/// MongoDB backend.
pub mod mongodb;

use crate::dao::models::GameStateEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use time::OffsetDateTime;

/// Abstraction over the persistence layer holding the singleton game document.
pub trait GameStore: Send + Sync {
    /// Read the game document, `None` when no game was set up.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>>;
    /// Replace the whole document, creating it when absent.
    fn save(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Flag the section at `index` as unlocked when it still carries `code`.
    ///
    /// Returns the updated document, or `None` when the document is missing or
    /// the section at `index` holds another code (the board was replaced).
    fn unlock_section(
        &self,
        index: usize,
        code: String,
        updated_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>>;
    /// Delete the game document. Deleting a missing document succeeds.
    fn clear(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend still answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Try to restore a lost connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Whether other processes may write the same document.
    fn is_shared(&self) -> bool;
}
