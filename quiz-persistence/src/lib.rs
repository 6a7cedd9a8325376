pub mod connection;
pub mod entities;
pub mod repositories;
pub mod results_cache;

pub use connection::{connect_and_migrate, connect_to_database, connect_to_memory_database};
pub use results_cache::ResultsCache;
