pub mod sqlite;

pub use sqlite::SqliteTaskStore;
