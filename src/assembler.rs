//! Conversation assembly.
//!
//! Turns classified rows into conversations and messages, one row at a time in
//! received order, and links quote replies to the message they quote. Quote
//! targets must already exist when the reply is processed, which is why the
//! row order matters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::classification::classify;
use crate::conversation::{ConversationId, MessageId, NewMessage, Reconstruction};
use crate::db::{RawMessage, ThreadId};
use crate::identity::IdentityTables;
use crate::settings::Settings;

/// Why a row never became a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingThread,
    InvalidTimestamp,
    UnclassifiableMessage,
    UnresolvableSender,
    UnresolvableConversation,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingThread => "missing_thread",
            DropReason::InvalidTimestamp => "invalid_timestamp",
            DropReason::UnclassifiableMessage => "unclassifiable_message",
            DropReason::UnresolvableSender => "unresolvable_sender",
            DropReason::UnresolvableConversation => "unresolvable_conversation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted(MessageId),
    Dropped(DropReason),
}

/// Counters for one reconstruction run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructionStats {
    pub rows_read: usize,
    pub messages_created: usize,
    pub conversations_created: usize,
    pub replies_linked: usize,
    /// Quote references with no matching message; the reply is kept as a root
    pub dangling_quotes: usize,
    pub out_of_order_rows: usize,
    pub dropped_missing_thread: usize,
    pub dropped_invalid_timestamp: usize,
    pub dropped_unclassifiable: usize,
    pub dropped_unresolvable_sender: usize,
    pub dropped_unresolvable_conversation: usize,
}

impl ReconstructionStats {
    fn record_drop(&mut self, reason: DropReason) {
        *self.drop_counter(reason) += 1;
    }

    fn drop_counter(&mut self, reason: DropReason) -> &mut usize {
        match reason {
            DropReason::MissingThread => &mut self.dropped_missing_thread,
            DropReason::InvalidTimestamp => &mut self.dropped_invalid_timestamp,
            DropReason::UnclassifiableMessage => &mut self.dropped_unclassifiable,
            DropReason::UnresolvableSender => &mut self.dropped_unresolvable_sender,
            DropReason::UnresolvableConversation => &mut self.dropped_unresolvable_conversation,
        }
    }

    pub fn dropped_for(&self, reason: DropReason) -> usize {
        match reason {
            DropReason::MissingThread => self.dropped_missing_thread,
            DropReason::InvalidTimestamp => self.dropped_invalid_timestamp,
            DropReason::UnclassifiableMessage => self.dropped_unclassifiable,
            DropReason::UnresolvableSender => self.dropped_unresolvable_sender,
            DropReason::UnresolvableConversation => self.dropped_unresolvable_conversation,
        }
    }

    pub fn dropped(&self) -> usize {
        self.dropped_missing_thread
            + self.dropped_invalid_timestamp
            + self.dropped_unclassifiable
            + self.dropped_unresolvable_sender
            + self.dropped_unresolvable_conversation
    }
}

fn to_utc(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
}

/// Incremental builder. Rows must arrive in non-decreasing received order;
/// rows that go backwards are still placed but counted in `out_of_order_rows`.
pub struct Assembler<'a> {
    identities: &'a IdentityTables,
    settings: &'a Settings,
    graph: Reconstruction,
    by_thread: HashMap<ThreadId, ConversationId>,
    last_received: Option<i64>,
}

impl<'a> Assembler<'a> {
    pub fn new(identities: &'a IdentityTables, settings: &'a Settings) -> Self {
        Assembler {
            identities,
            settings,
            graph: Reconstruction::default(),
            by_thread: HashMap::new(),
            last_received: None,
        }
    }

    pub fn push(&mut self, row: &RawMessage) -> RowOutcome {
        self.graph.stats.rows_read += 1;
        match self.place(row) {
            Ok(id) => RowOutcome::Accepted(id),
            Err(reason) => {
                log::debug!(
                    "[Signal] Dropped {} row {} (thread {:?}): {}",
                    row.table.as_str(), row.row_id, row.thread_id, reason.as_str()
                );
                self.graph.stats.record_drop(reason);
                RowOutcome::Dropped(reason)
            }
        }
    }

    fn place(&mut self, row: &RawMessage) -> Result<MessageId, DropReason> {
        let thread_id = row.thread_id.ok_or(DropReason::MissingThread)?;

        let received_millis = row.received_at.ok_or(DropReason::InvalidTimestamp)?;
        let received_at = to_utc(received_millis).ok_or(DropReason::InvalidTimestamp)?;
        // Older sms rows carry no date_sent
        let sent_at = row.sent_at.and_then(to_utc).unwrap_or(received_at);

        let classified = classify(row.type_code, row.address, self.identities, &self.settings.self_name)?;
        let conversation = self.conversation_for(thread_id)?;

        match self.last_received {
            Some(last) if received_millis < last => {
                self.graph.stats.out_of_order_rows += 1;
                log::warn!(
                    "[Signal] {} row {} arrived out of received order; earlier quote targets may be missing",
                    row.table.as_str(), row.row_id
                );
            }
            _ => self.last_received = Some(received_millis),
        }

        let parent = match row.quote_sent_at {
            Some(quoted) => {
                let parent = self.resolve_quote(conversation, quoted, sent_at);
                if parent.is_some() {
                    self.graph.stats.replies_linked += 1;
                } else {
                    self.graph.stats.dangling_quotes += 1;
                    log::debug!(
                        "[Signal] {} row {} quotes {} which is not in thread {}",
                        row.table.as_str(), row.row_id, quoted, thread_id
                    );
                }
                parent
            }
            None => None,
        };

        let new = NewMessage {
            received_at,
            sent_at,
            body: row.body.clone().unwrap_or_default(),
            kind: classified.kind,
            sender: classified.sender,
        };
        let id = self.graph.add_message(conversation, new, parent);
        self.graph.stats.messages_created += 1;

        let message = self.graph.message(id);
        log::trace!(
            "[Signal] [{}] {} ({}): {}",
            message.received_at.format("%Y-%m-%d %H:%M"), message.sender, message.kind.as_str(), message.header_line()
        );

        Ok(id)
    }

    fn conversation_for(&mut self, thread_id: ThreadId) -> Result<ConversationId, DropReason> {
        if let Some(id) = self.by_thread.get(&thread_id) {
            return Ok(*id);
        }

        let name = self.identities
            .conversation_name(thread_id)
            .ok_or(DropReason::UnresolvableConversation)?;
        let id = self.graph.add_conversation(thread_id, name.to_string());
        self.by_thread.insert(thread_id, id);
        self.graph.stats.conversations_created += 1;
        Ok(id)
    }

    /// A quote only links to an earlier-or-equal sent timestamp in the same conversation
    fn resolve_quote(
        &self,
        conversation: ConversationId,
        quoted_millis: i64,
        sent_at: DateTime<Utc>,
    ) -> Option<MessageId> {
        let candidate = self.graph.conversation(conversation).find_by_sent(quoted_millis)?;
        if self.graph.message(candidate).sent_at <= sent_at {
            Some(candidate)
        } else {
            None
        }
    }

    pub fn finish(self) -> Reconstruction {
        let stats = &self.graph.stats;
        log::info!(
            "[Signal] {} rows -> {} messages in {} conversations ({} replies linked, {} dangling quotes, {} dropped)",
            stats.rows_read,
            stats.messages_created,
            stats.conversations_created,
            stats.replies_linked,
            stats.dangling_quotes,
            stats.dropped(),
        );
        self.graph
    }
}

/// Batch entry point: orders rows by received timestamp (stable, so equal
/// timestamps keep source order) and assembles them.
pub fn reconstruct(
    mut rows: Vec<RawMessage>,
    identities: &IdentityTables,
    settings: &Settings,
) -> Reconstruction {
    rows.sort_by_key(|r| r.received_at.unwrap_or(i64::MAX));

    let mut assembler = Assembler::new(identities, settings);
    for row in &rows {
        assembler.push(row);
    }
    assembler.finish()
}
