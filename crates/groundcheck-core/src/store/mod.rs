//! SQLite-backed collaborators: the knowledge graph and the code example
//! index, sharing one schema and connection pool type.

pub mod example_index;
pub mod graph_store;
pub mod pool;
pub mod schema;

pub use example_index::SqliteExampleIndex;
pub use graph_store::SqliteGraphStore;
pub use pool::ConnectionPool;
