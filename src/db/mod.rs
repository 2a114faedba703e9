mod schema;
mod models;
mod source;

pub use schema::SignalBackup;
pub use models::{RawMessage, MessageTable, ThreadRecord, RecipientRecord, GroupRecord, ThreadId, RecipientId};
pub use source::{RowSource, MemorySource};
