/// Persistence entities shared by every backend.
pub mod models;
/// Roll history and champion pool storage backends.
pub mod roll_store;
/// Storage abstraction layer for database operations.
pub mod storage;
