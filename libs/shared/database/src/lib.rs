pub mod persistence;

pub use persistence::{PersistError, PersistenceClient};
