mod error;
mod store;

pub use error::LocalDaoError;
pub use store::{LOCAL_STORAGE_KEY, LocalGameStore};

use crate::dao::storage::StorageError;

impl From<LocalDaoError> for StorageError {
    fn from(err: LocalDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
