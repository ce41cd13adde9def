//! Error types raised by the MongoDB game store.

use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures that can occur while talking to MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// The connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The driver refused the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the first ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// A periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Replacing the game document failed.
    #[error("failed to save game `{id}`")]
    SaveGame {
        /// Game document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading the game document failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Game document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The conditional section update failed.
    #[error("failed to unlock section {index} of game `{id}`")]
    UnlockSection {
        /// Game document id.
        id: String,
        /// Position of the section in the board.
        index: usize,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Deleting the game document failed.
    #[error("failed to delete game `{id}`")]
    DeleteGame {
        /// Game document id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
