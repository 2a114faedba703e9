use serde::{Deserialize, Serialize};

pub type ThreadId = i64;
pub type RecipientId = i64;

/// Which backup table a message row came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageTable {
    #[default]
    Sms,
    Mms,
}

impl MessageTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageTable::Sms => "sms",
            MessageTable::Mms => "mms",
        }
    }
}

/// One row of the `sms` or `mms` table, before any interpretation.
/// Every column is optional because backups from different app versions
/// disagree about which ones exist and which may be NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMessage {
    pub table: MessageTable,
    pub row_id: i64,
    pub received_at: Option<i64>,  // epoch millis
    pub sent_at: Option<i64>,      // epoch millis, identity for quotes
    pub body: Option<String>,
    pub thread_id: Option<ThreadId>,
    pub address: Option<RecipientId>,
    pub type_code: Option<i64>,
    pub quote_sent_at: Option<i64>,  // sent_at of the quoted message
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRecord {
    pub id: ThreadId,
    pub recipient_id: Option<RecipientId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipientRecord {
    pub id: RecipientId,
    pub display_name: Option<String>,
    pub group_id: Option<String>,  // set for group recipients
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub group_id: Option<String>,
    pub recipient_id: Option<RecipientId>,
    pub title: Option<String>,
}
