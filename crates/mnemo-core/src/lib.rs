pub mod error;
pub mod gate;
pub mod record;
pub mod score;
pub mod scope;

pub use error::MnemoError;
pub use record::{Category, MemoryRecord, RecordId};
pub use scope::{ScopeConfig, ScopeManager, ScopeStats};
