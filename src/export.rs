//! Org-mode export.
//!
//! One top-level heading per conversation, one child heading per message in
//! received order. Every message gets a `CUSTOM_ID` derived from its sent
//! timestamp so replies and quoted messages can link to each other.

use chrono::SecondsFormat;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::conversation::{Message, MessageId, Reconstruction};
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::utils::{sanitize_link_label, single_line};

/// Canonical anchor text for a message: sent time as ISO-8601 UTC with millis
pub fn anchor_for(message: &Message) -> String {
    message.sent_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Assign a unique anchor to every message, walking in export order.
/// Collisions keep the first message on the bare timestamp and suffix the rest.
fn assign_anchors(graph: &Reconstruction) -> Vec<String> {
    let mut anchors = vec![String::new(); graph.message_count()];
    let mut taken: HashSet<String> = HashSet::new();

    for conversation in graph.conversations() {
        for message in graph.messages_in_export_order(conversation.id) {
            let base = anchor_for(message);
            let mut anchor = base.clone();
            let mut n = 1;
            while !taken.insert(anchor.clone()) {
                n += 1;
                anchor = format!("{}-{}", base, n);
            }
            anchors[message.id.0] = anchor;
        }
    }

    anchors
}

fn build_heading_line_regex() -> Regex {
    // A line Org would read as a heading: stars at column 0, then blank or end
    Regex::new(r"^\*+(?:[ \t]|$)").unwrap()
}

pub struct OrgExporter {
    settings: Settings,
    heading_re: Regex,
}

impl OrgExporter {
    /// Settings are normalized here as well, so hand-built ones cannot break rendering
    pub fn new(settings: &Settings) -> Self {
        OrgExporter {
            settings: settings.clone().normalized(),
            heading_re: build_heading_line_regex(),
        }
    }

    fn stars(&self, depth: usize) -> String {
        "*".repeat(self.settings.base_level + depth)
    }

    fn link(&self, anchors: &[String], graph: &Reconstruction, target: MessageId) -> String {
        let anchor = &anchors[target.0];
        let header = graph.message(target).header_line();
        let label = if header.trim().is_empty() {
            anchor.clone()
        } else {
            sanitize_link_label(&single_line(header))
        };
        format!("[[#{}][{}]]", anchor, label)
    }

    /// Render the whole document. Same graph in, same bytes out.
    pub fn render(&self, graph: &Reconstruction) -> String {
        let anchors = assign_anchors(graph);
        let mut out = String::new();

        for conversation in graph.conversations() {
            let _ = writeln!(out, "{} {}", self.stars(0), single_line(&conversation.name));

            for message in graph.messages_in_export_order(conversation.id) {
                self.render_message(&mut out, graph, &anchors, message);
            }
        }

        out
    }

    fn render_message(&self, out: &mut String, graph: &Reconstruction, anchors: &[String], message: &Message) {
        let heading = format!(
            "{} [{}] {}: {}",
            self.stars(1),
            message.received_at.format(&self.settings.timestamp_format),
            single_line(&message.sender),
            single_line(message.header_line()),
        );
        let _ = writeln!(out, "{}", heading.trim_end());

        let _ = writeln!(out, ":PROPERTIES:");
        let _ = writeln!(out, ":CUSTOM_ID: {}", anchors[message.id.0]);
        let _ = writeln!(out, ":END:");

        if let Some(parent) = message.parent {
            let _ = writeln!(out, "{} {}", self.settings.reply_prefix, self.link(anchors, graph, parent));
        }

        // `lines()` drops `\r` and the final newline; every line gets its own `\n`
        if !message.body.is_empty() {
            for line in message.body.lines() {
                if self.heading_re.is_match(line) {
                    let _ = writeln!(out, ",{}", line);
                } else {
                    let _ = writeln!(out, "{}", line);
                }
            }
        }

        if !message.children.is_empty() {
            let _ = writeln!(out, "{} {}", self.stars(2), self.settings.replies_heading);
            for child in &message.children {
                let _ = writeln!(out, "- {}", self.link(anchors, graph, *child));
            }
        }
    }

    /// Write the document in one go. Only `.org` targets are accepted.
    pub fn write_to(&self, graph: &Reconstruction, path: &Path) -> Result<()> {
        let is_org = path.extension().and_then(|e| e.to_str()) == Some("org");
        if !is_org {
            return Err(Error::UnsupportedFormat(path.to_path_buf()));
        }

        let document = self.render(graph);
        std::fs::write(path, document)?;
        log::info!("[Export] Wrote {} conversations to {:?}", graph.conversations().len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::reconstruct;
    use crate::classification::{INCOMING_CODE, OUTGOING_CODE};
    use crate::db::{MessageTable, RawMessage, RecipientRecord, ThreadRecord};
    use crate::identity::IdentityTables;
    use crate::settings::MAX_BASE_LEVEL;

    // 2021-03-04T05:06:07.000Z
    const T0: i64 = 1_614_834_367_000;

    fn identities() -> IdentityTables {
        IdentityTables::build(
            &[
                ThreadRecord { id: 7, recipient_id: Some(3) },
                ThreadRecord { id: 8, recipient_id: Some(4) },
            ],
            &[
                RecipientRecord { id: 3, display_name: Some("Alice".to_string()), group_id: None },
                RecipientRecord { id: 4, display_name: Some("Bob".to_string()), group_id: None },
            ],
            &[],
        )
    }

    fn row(thread: i64, received: i64, sent: i64, code: i64, body: &str) -> RawMessage {
        RawMessage {
            table: MessageTable::Mms,
            row_id: received,
            received_at: Some(received),
            sent_at: Some(sent),
            body: Some(body.to_string()),
            thread_id: Some(thread),
            address: Some(if thread == 8 { 4 } else { 3 }),
            type_code: Some(code),
            quote_sent_at: None,
        }
    }

    fn render(rows: Vec<RawMessage>) -> String {
        let settings = Settings::default();
        let graph = reconstruct(rows, &identities(), &settings);
        OrgExporter::new(&settings).render(&graph)
    }

    #[test]
    fn test_conversation_and_message_headings() {
        let out = render(vec![
            row(7, T0, T0, OUTGOING_CODE, "Hi there\nhow are you?"),
            row(7, T0 + 60_000, T0 + 60_000, INCOMING_CODE, "Fine"),
        ]);

        let expected = "\
* Alice
** [2021-03-04 05:06] Alice: Hi there
:PROPERTIES:
:CUSTOM_ID: 2021-03-04T05:06:07.000Z
:END:
Hi there
how are you?
** [2021-03-04 05:07] Me: Fine
:PROPERTIES:
:CUSTOM_ID: 2021-03-04T05:07:07.000Z
:END:
Fine
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_reply_backlink_and_replies_section() {
        let mut reply = row(7, T0 + 5_000, T0 + 4_000, INCOMING_CODE, "Sure\nsee you");
        reply.quote_sent_at = Some(T0 - 1_000);
        let out = render(vec![
            row(7, T0, T0 - 1_000, OUTGOING_CODE, "Lunch?"),
            reply,
        ]);

        assert!(out.contains("*** Replies\n- [[#2021-03-04T05:06:11.000Z][Sure]]\n"));
        assert!(out.contains("In reply to: [[#2021-03-04T05:06:06.000Z][Lunch?]]\nSure\nsee you\n"));
    }

    #[test]
    fn test_export_order_is_received_not_sent() {
        let out = render(vec![
            row(7, T0, T0 + 9_000, OUTGOING_CODE, "received first"),
            row(7, T0 + 1_000, T0, INCOMING_CODE, "received second"),
        ]);

        let first = out.find("received first").unwrap();
        let second = out.find("received second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_colliding_sent_timestamps_get_unique_anchors() {
        let mut reply = row(8, T0 + 2_000, T0 + 2_000, OUTGOING_CODE, "re");
        reply.quote_sent_at = Some(T0);
        let out = render(vec![
            row(7, T0, T0, OUTGOING_CODE, "alice"),
            row(8, T0 + 1, T0, OUTGOING_CODE, "bob"),
            reply,
        ]);

        assert!(out.contains(":CUSTOM_ID: 2021-03-04T05:06:07.000Z\n"));
        assert!(out.contains(":CUSTOM_ID: 2021-03-04T05:06:07.000Z-2\n"));
        // Bob's reply links to Bob's message, which holds the suffixed anchor
        assert!(out.contains("In reply to: [[#2021-03-04T05:06:07.000Z-2][bob]]"));
    }

    #[test]
    fn test_body_lines_cannot_open_headings() {
        let out = render(vec![row(7, T0, T0, INCOMING_CODE, "list:\n* item\n*bold* stays\n**")]);
        assert!(out.contains("\n,* item\n*bold* stays\n,**\n"));
        assert_eq!(out.lines().filter(|l| l.starts_with("* ")).count(), 1);
    }

    #[test]
    fn test_empty_body_and_labels() {
        let mut reply = row(7, T0 + 1_000, T0 + 1_000, INCOMING_CODE, "[[x]]");
        reply.quote_sent_at = Some(T0);
        let out = render(vec![row(7, T0, T0, OUTGOING_CODE, ""), reply]);

        assert!(out.contains("** [2021-03-04 05:06] Alice:\n:PROPERTIES:"));
        assert!(out.contains("In reply to: [[#2021-03-04T05:06:07.000Z][2021-03-04T05:06:07.000Z]]"));
        assert!(out.contains("- [[#2021-03-04T05:06:08.000Z][((x))]]"));
    }

    #[test]
    fn test_base_level_shifts_outline() {
        let settings = Settings { base_level: 2, ..Settings::default() };
        let mut reply = row(7, T0 + 1_000, T0 + 1_000, INCOMING_CODE, "b");
        reply.quote_sent_at = Some(T0);
        let graph = reconstruct(vec![row(7, T0, T0, OUTGOING_CODE, "a"), reply], &identities(), &settings);
        let out = OrgExporter::new(&settings).render(&graph);

        assert!(out.starts_with("** Alice\n*** ["));
        assert!(out.contains("**** Replies\n"));
    }

    #[test]
    fn test_names_cannot_open_headings() {
        let tables = IdentityTables::build(
            &[ThreadRecord { id: 7, recipient_id: Some(3) }],
            &[RecipientRecord { id: 3, display_name: Some("Alice\n* Injected".to_string()), group_id: None }],
            &[],
        );
        let settings = Settings::default();
        let graph = reconstruct(vec![row(7, T0, T0, OUTGOING_CODE, "hi")], &tables, &settings);
        let out = OrgExporter::new(&settings).render(&graph);

        assert!(out.starts_with("* Alice * Injected\n** [2021-03-04 05:06] Alice * Injected: hi\n"));
        assert_eq!(out.lines().filter(|l| l.starts_with("* ")).count(), 1);
    }

    #[test]
    fn test_hand_built_settings_are_normalized() {
        let settings = Settings {
            timestamp_format: "%Q".to_string(),
            base_level: usize::MAX,
            ..Settings::default()
        };
        let graph = reconstruct(vec![row(7, T0, T0, OUTGOING_CODE, "hi")], &identities(), &Settings::default());
        let out = OrgExporter::new(&settings).render(&graph);

        let stars = "*".repeat(MAX_BASE_LEVEL);
        assert!(out.starts_with(&format!("{} Alice\n{}* [2021-03-04 05:06] Alice: hi\n", stars, stars)));
    }

    #[test]
    fn test_body_lines_are_rendered_without_carriage_returns() {
        let out = render(vec![row(7, T0, T0, OUTGOING_CODE, "one\r\ntwo\n")]);
        assert!(out.ends_with(":END:\none\ntwo\n"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let rows = vec![
            row(8, T0, T0, OUTGOING_CODE, "b1"),
            row(7, T0 + 1, T0 + 1, OUTGOING_CODE, "a1"),
            row(8, T0 + 2, T0 + 2, INCOMING_CODE, "b2"),
        ];
        assert_eq!(render(rows.clone()), render(rows));
    }

    #[test]
    fn test_write_rejects_non_org_paths() {
        let settings = Settings::default();
        let graph = Reconstruction::default();
        let dir = tempfile::tempdir().unwrap();

        let result = OrgExporter::new(&settings).write_to(&graph, &dir.path().join("out.md"));
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
        assert!(!dir.path().join("out.md").exists());

        OrgExporter::new(&settings).write_to(&graph, &dir.path().join("out.org")).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out.org")).unwrap(), "");
    }
}
