pub mod store;

pub use store::SqliteInstanceStore;
