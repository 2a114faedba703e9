//! Message classification.
//!
//! Signal Android stores direction in a packed `type`/`msg_box` column. Only two
//! exact values are accepted; everything else (drafts, key changes, calls,
//! group updates, NULL) is dropped without trying to decode the bit fields.

use crate::assembler::DropReason;
use crate::conversation::MessageKind;
use crate::db::RecipientId;
use crate::identity::IdentityTables;

/// Secure push message sent by the backup owner
pub const INCOMING_CODE: i64 = 10_485_783;
/// Secure push message received from the other party
pub const OUTGOING_CODE: i64 = 10_485_780;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Incoming,
    Outgoing,
    Unknown,
}

impl TypeCode {
    pub fn from_raw(code: Option<i64>) -> Self {
        match code {
            Some(INCOMING_CODE) => TypeCode::Incoming,
            Some(OUTGOING_CODE) => TypeCode::Outgoing,
            _ => TypeCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: MessageKind,
    pub sender: String,
}

/// Decide direction and sender for one row.
///
/// `self_name` labels the backup owner's own messages. Rows from someone else
/// need a sender address that resolves to a known user.
pub fn classify(
    type_code: Option<i64>,
    address: Option<RecipientId>,
    identities: &IdentityTables,
    self_name: &str,
) -> Result<Classified, DropReason> {
    match TypeCode::from_raw(type_code) {
        TypeCode::Incoming => Ok(Classified {
            kind: MessageKind::Incoming,
            sender: self_name.to_string(),
        }),
        TypeCode::Outgoing => {
            let sender = address
                .and_then(|id| identities.user_name(id))
                .ok_or(DropReason::UnresolvableSender)?;
            Ok(Classified {
                kind: MessageKind::Outgoing,
                sender: sender.to_string(),
            })
        }
        TypeCode::Unknown => Err(DropReason::UnclassifiableMessage),
    }
}
