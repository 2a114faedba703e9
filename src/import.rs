//! Import pipeline: row source in, reconstructed conversations out.

use serde::Serialize;

use crate::assembler::reconstruct;
use crate::conversation::Reconstruction;
use crate::db::{RowSource, ThreadId};
use crate::error::Result;
use crate::identity::IdentityTables;
use crate::settings::Settings;

/// Read everything from `source`, resolve identities and rebuild the threads
pub fn load<S: RowSource>(source: &S, settings: &Settings) -> Result<Reconstruction> {
    let threads = source.threads()?;
    let recipients = source.recipients()?;
    let groups = source.groups()?;
    let identities = IdentityTables::build(&threads, &recipients, &groups);
    log::info!(
        "[Signal] Resolved {} users and {} conversation names ({} threads, {} recipients, {} groups)",
        identities.user_count(),
        identities.conversation_count(),
        threads.len(),
        recipients.len(),
        groups.len(),
    );

    let rows = source.messages()?;
    Ok(reconstruct(rows, &identities, settings))
}

/// One line of `list` output
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub thread_id: ThreadId,
    pub name: String,
    pub message_count: usize,
}

/// Conversations by accepted message count, busiest first.
/// Equal counts keep creation order.
pub fn summarize(graph: &Reconstruction) -> Vec<ConversationSummary> {
    let mut summaries: Vec<ConversationSummary> = graph.conversations().iter()
        .map(|c| ConversationSummary {
            thread_id: c.thread_id,
            name: c.name.clone(),
            message_count: c.messages.len(),
        })
        .collect();
    summaries.sort_by(|a, b| b.message_count.cmp(&a.message_count));
    summaries
}
