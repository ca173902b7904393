// Warehouse persistence - store contract, dimension resolution, fact loading

pub mod loader;
pub mod postgres;
pub mod resolver;
pub mod sqlite;
pub mod store;

pub use loader::FactLoader;
pub use postgres::PostgresWarehouse;
pub use resolver::{DimensionKeyCache, DimensionResolver};
pub use sqlite::SqliteWarehouse;
pub use store::WarehouseStore;
