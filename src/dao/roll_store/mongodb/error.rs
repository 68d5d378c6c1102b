use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend calls.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection string could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings sent before giving up.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Target collection.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Player upsert failed.
    #[error("failed to upsert player `{id}`")]
    SavePlayer {
        /// Player id.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Read query failed.
    #[error("failed to read collection `{collection}`")]
    Load {
        /// Queried collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reference data write failed.
    #[error("failed to write collection `{collection}`")]
    Write {
        /// Written collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Game record write failed.
    #[error("failed to save records of game `{id}` into `{collection}`")]
    SaveGame {
        /// Game id.
        id: Uuid,
        /// Written collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Game record deletion failed.
    #[error("failed to delete records of game `{id}` from `{collection}`")]
    DeleteGame {
        /// Game id.
        id: Uuid,
        /// Collection being cleaned.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
