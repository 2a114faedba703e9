//! Identity resolution: who is who, and what each conversation is called.
//!
//! Built once from the thread, recipient and group tables, then only read.
//! Lookups that cannot be satisfied are simply absent from the tables.

use std::collections::{HashMap, HashSet};

use crate::db::{GroupRecord, RecipientId, RecipientRecord, ThreadId, ThreadRecord};
use crate::utils::non_blank;

#[derive(Debug, Clone, Default)]
pub struct IdentityTables {
    users: HashMap<RecipientId, String>,
    conversation_names: HashMap<ThreadId, String>,
}

impl IdentityTables {
    /// Resolve display names. For every duplicated key (thread id, recipient id,
    /// group key) the first row in source order is the one used.
    pub fn build(
        threads: &[ThreadRecord],
        recipients: &[RecipientRecord],
        groups: &[GroupRecord],
    ) -> Self {
        let mut recipients_by_id: HashMap<RecipientId, &RecipientRecord> = HashMap::new();
        for recipient in recipients {
            recipients_by_id.entry(recipient.id).or_insert(recipient);
        }

        let mut titles_by_recipient: HashMap<RecipientId, &str> = HashMap::new();
        let mut titles_by_group_id: HashMap<&str, &str> = HashMap::new();
        for group in groups {
            let title = match non_blank(group.title.as_deref()) {
                Some(t) => t,
                None => continue,
            };
            if let Some(recipient_id) = group.recipient_id {
                titles_by_recipient.entry(recipient_id).or_insert(title);
            }
            if let Some(group_id) = non_blank(group.group_id.as_deref()) {
                titles_by_group_id.entry(group_id).or_insert(title);
            }
        }

        let users: HashMap<RecipientId, String> = recipients_by_id.iter()
            .filter_map(|(id, r)| {
                non_blank(r.display_name.as_deref()).map(|name| (*id, name.to_string()))
            })
            .collect();

        let mut conversation_names: HashMap<ThreadId, String> = HashMap::new();
        let mut seen_threads: HashSet<ThreadId> = HashSet::new();
        for thread in threads {
            if !seen_threads.insert(thread.id) {
                continue;
            }
            let recipient = match thread.recipient_id.and_then(|id| recipients_by_id.get(&id)) {
                Some(r) => *r,
                None => {
                    log::debug!("[Signal] Thread {} has no recipient row", thread.id);
                    continue;
                }
            };

            let name = match non_blank(recipient.group_id.as_deref()) {
                Some(group_id) => titles_by_recipient.get(&recipient.id)
                    .or_else(|| titles_by_group_id.get(group_id))
                    .copied(),
                None => non_blank(recipient.display_name.as_deref()),
            };

            match name {
                Some(name) => {
                    conversation_names.insert(thread.id, name.to_string());
                }
                None => log::debug!("[Signal] No display name for thread {} (recipient {})", thread.id, recipient.id),
            }
        }

        IdentityTables { users, conversation_names }
    }

    pub fn user_name(&self, id: RecipientId) -> Option<&str> {
        self.users.get(&id).map(String::as_str)
    }

    pub fn conversation_name(&self, thread_id: ThreadId) -> Option<&str> {
        self.conversation_names.get(&thread_id).map(String::as_str)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversation_names.len()
    }
}
