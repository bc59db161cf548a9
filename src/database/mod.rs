pub mod manager;
pub mod memory;
pub mod models;
pub mod pg;
pub mod repository;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use repository::{Model, Repository};
pub use store::{with_optional_transaction, DocumentStore, Session};
