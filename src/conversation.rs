//! Reconstructed conversation graph.
//!
//! Conversations and messages live in two arenas owned by `Reconstruction`.
//! Parent and reply links are indices into the message arena, so the graph
//! can be walked in both directions without shared ownership.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::assembler::ReconstructionStats;
use crate::db::ThreadId;
use crate::utils::first_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConversationId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MessageId(pub usize);

/// Direction of a message relative to the backup owner.
///
/// `Incoming` is the code the backup owner's own messages carry;
/// `Outgoing` marks messages that arrived from someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Incoming,
    Outgoing,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Incoming => "incoming",
            MessageKind::Outgoing => "outgoing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub thread_id: ThreadId,
    pub name: String,
    /// Insertion order (row processing order), not export order
    pub messages: Vec<MessageId>,
    /// sent_at millis -> first message constructed with that timestamp
    sent_index: HashMap<i64, MessageId>,
}

impl Conversation {
    fn new(id: ConversationId, thread_id: ThreadId, name: String) -> Self {
        Conversation {
            id,
            thread_id,
            name,
            messages: Vec::new(),
            sent_index: HashMap::new(),
        }
    }

    /// Quote target lookup. Only messages already in this conversation match,
    /// and on a timestamp collision the first one wins.
    pub fn find_by_sent(&self, sent_millis: i64) -> Option<MessageId> {
        self.sent_index.get(&sent_millis).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub conversation: ConversationId,
    pub received_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub body: String,
    pub kind: MessageKind,
    pub sender: String,
    pub parent: Option<MessageId>,
    /// Replies in the order they were discovered
    pub children: Vec<MessageId>,
}

impl Message {
    /// First line of the body, used in headings and link labels
    pub fn header_line(&self) -> &str {
        first_line(&self.body)
    }
}

/// Message fields known before the message is placed in a conversation
#[derive(Debug, Clone)]
pub(crate) struct NewMessage {
    pub received_at: DateTime<Utc>,
    pub sent_at: DateTime<Utc>,
    pub body: String,
    pub kind: MessageKind,
    pub sender: String,
}

#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    pub stats: ReconstructionStats,
}

impl Reconstruction {
    /// Conversations in the order they were first created
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: ConversationId) -> &Conversation {
        &self.conversations[id.0]
    }

    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn find_conversation(&self, thread_id: ThreadId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.thread_id == thread_id)
    }

    /// Messages of a conversation by received timestamp, ties kept in insertion order
    pub fn messages_in_export_order(&self, id: ConversationId) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self.conversation(id).messages.iter()
            .map(|m| self.message(*m))
            .collect();
        messages.sort_by_key(|m| m.received_at);
        messages
    }

    pub(crate) fn add_conversation(&mut self, thread_id: ThreadId, name: String) -> ConversationId {
        let id = ConversationId(self.conversations.len());
        self.conversations.push(Conversation::new(id, thread_id, name));
        id
    }

    /// Append a message to its conversation, linking it under `parent` if given.
    /// The caller guarantees `parent` belongs to the same conversation.
    pub(crate) fn add_message(
        &mut self,
        conversation: ConversationId,
        new: NewMessage,
        parent: Option<MessageId>,
    ) -> MessageId {
        let id = MessageId(self.messages.len());
        let sent_millis = new.sent_at.timestamp_millis();

        self.messages.push(Message {
            id,
            conversation,
            received_at: new.received_at,
            sent_at: new.sent_at,
            body: new.body,
            kind: new.kind,
            sender: new.sender,
            parent,
            children: Vec::new(),
        });

        if let Some(parent_id) = parent {
            let children = &mut self.messages[parent_id.0].children;
            if !children.contains(&id) {
                children.push(id);
            }
        }

        let conv = &mut self.conversations[conversation.0];
        conv.messages.push(id);
        conv.sent_index.entry(sent_millis).or_insert(id);

        id
    }
}
