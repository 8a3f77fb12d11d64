pub mod lichess;
pub mod spsc;

pub use lichess::LoadError;
pub use lichess::Loaded;
pub use lichess::Record;
pub use lichess::load_database;
pub use lichess::load_database_initialized;
pub use lichess::load_records;
pub use lichess::load_records_initialized;
