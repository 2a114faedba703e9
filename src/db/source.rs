//! Row sources feed the reconstruction pipeline.
//!
//! The pipeline only needs four flat record sets. Where they come from is up to
//! the implementation: a backup file on disk, or rows already held in memory.

use super::models::{GroupRecord, RawMessage, RecipientRecord, ThreadRecord};
use crate::error::Result;

pub trait RowSource {
    /// Message rows from every message table, in source row order
    fn messages(&self) -> Result<Vec<RawMessage>>;
    fn threads(&self) -> Result<Vec<ThreadRecord>>;
    fn recipients(&self) -> Result<Vec<RecipientRecord>>;
    fn groups(&self) -> Result<Vec<GroupRecord>>;
}

/// Rows held in plain vectors. Used by tests and by callers that
/// already decoded a backup some other way.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub messages: Vec<RawMessage>,
    pub threads: Vec<ThreadRecord>,
    pub recipients: Vec<RecipientRecord>,
    pub groups: Vec<GroupRecord>,
}

impl RowSource for MemorySource {
    fn messages(&self) -> Result<Vec<RawMessage>> {
        Ok(self.messages.clone())
    }

    fn threads(&self) -> Result<Vec<ThreadRecord>> {
        Ok(self.threads.clone())
    }

    fn recipients(&self) -> Result<Vec<RecipientRecord>> {
        Ok(self.recipients.clone())
    }

    fn groups(&self) -> Result<Vec<GroupRecord>> {
        Ok(self.groups.clone())
    }
}
