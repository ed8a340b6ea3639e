pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::CatalogRow;
pub use sqlite::Database;
