use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;

use super::models::{GroupRecord, MessageTable, RawMessage, RecipientRecord, ThreadRecord};
use super::source::RowSource;
use crate::error::{Error, Result};

/// Column candidates for one message table. Each list is tried in order and
/// the present columns are COALESCEd; an empty result reads as NULL.
struct MessageColumns {
    table: MessageTable,
    received: &'static [&'static str],
    sent: &'static [&'static str],
    type_code: &'static [&'static str],
    quote: &'static [&'static str],
}

// sms: `date` is when the row landed on the device, `date_sent` the sender's clock.
// mms flips it: `date` is the sent time and `date_received` the local one.
// Older mms schemas have no `date_received`, so `date` stands in.
const MESSAGE_TABLES: &[MessageColumns] = &[
    MessageColumns {
        table: MessageTable::Sms,
        received: &["date"],
        sent: &["date_sent"],
        type_code: &["type"],
        quote: &[],
    },
    MessageColumns {
        table: MessageTable::Mms,
        received: &["date_received", "date"],
        sent: &["date"],
        type_code: &["msg_box"],
        quote: &["quote_id"],
    },
];

const THREAD_RECIPIENT_COLUMNS: &[&str] = &["thread_recipient_id", "recipient_ids"];
const RECIPIENT_NAME_COLUMNS: &[&str] = &["system_display_name", "profile_joined_name", "signal_profile_name"];

/// Read-only view over a decrypted Signal Android backup (plain SQLite)
pub struct SignalBackup {
    conn: Connection,
    path: String,
}

impl SignalBackup {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(SignalBackup { conn, path: path.to_string_lossy().to_string() })
    }

    /// Wrap an already open connection (in-memory databases in tests)
    pub fn from_connection(conn: Connection) -> Self {
        SignalBackup { conn, path: ":memory:".to_string() }
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    /// Errors here mean the file is not a readable SQLite database
    fn has_table(&self, table: &str) -> Result<bool> {
        let found = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let found = self.conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// SQL expression selecting the first present candidate column
    fn column_expr(&self, table: &str, candidates: &[&str]) -> Result<String> {
        let mut present: Vec<&str> = Vec::new();
        for column in candidates {
            if self.has_column(table, column)? {
                present.push(column);
            }
        }
        Ok(match present.as_slice() {
            [] => "NULL".to_string(),
            [single] => single.to_string(),
            many => format!("COALESCE({})", many.join(", ")),
        })
    }

    fn id_expr(&self, table: &str) -> Result<String> {
        Ok(if self.has_column(table, "_id")? { "_id".to_string() } else { "rowid".to_string() })
    }

    fn collect_rows<T, F>(&self, sql: &str, map_row: F) -> Result<Vec<T>>
    where
        F: FnMut(&rusqlite::Row) -> rusqlite::Result<T>,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map_row)?;

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(r) => out.push(r),
                Err(e) => log::warn!("[Signal] Skipping unreadable row: {}", e),
            }
        }
        Ok(out)
    }

    fn query_message_table(&self, columns: &MessageColumns) -> Result<Vec<RawMessage>> {
        let table = columns.table.as_str();
        if !self.has_table(table)? {
            log::info!("[Signal] No {} table in backup, skipping", table);
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {}, {}, {}, {}, {}, {}, {}, {} FROM {} ORDER BY rowid",
            self.id_expr(table)?,
            self.column_expr(table, columns.received)?,
            self.column_expr(table, columns.sent)?,
            self.column_expr(table, &["body"])?,
            self.column_expr(table, &["thread_id"])?,
            self.column_expr(table, &["address"])?,
            self.column_expr(table, columns.type_code)?,
            self.column_expr(table, columns.quote)?,
            table,
        );
        log::debug!("[Signal] {}", sql);

        let kind = columns.table;
        self.collect_rows(&sql, |row| {
            Ok(RawMessage {
                table: kind,
                row_id: value_as_i64(row.get(0)?).unwrap_or_default(),
                received_at: value_as_i64(row.get(1)?),
                sent_at: value_as_i64(row.get(2)?),
                body: value_as_text(row.get(3)?),
                thread_id: value_as_i64(row.get(4)?).filter(|id| *id > 0),
                address: value_as_i64(row.get(5)?),
                type_code: value_as_i64(row.get(6)?),
                // quote_id defaults to 0 for messages that quote nothing
                quote_sent_at: value_as_i64(row.get(7)?).filter(|ts| *ts > 0),
            })
        })
    }
}

impl RowSource for SignalBackup {
    fn messages(&self) -> Result<Vec<RawMessage>> {
        let mut messages = Vec::new();
        for columns in MESSAGE_TABLES {
            let rows = self.query_message_table(columns)?;
            log::info!("[Signal] Read {} rows from {}", rows.len(), columns.table.as_str());
            messages.extend(rows);
        }
        Ok(messages)
    }

    fn threads(&self) -> Result<Vec<ThreadRecord>> {
        if !self.has_table("thread")? {
            log::warn!("[Signal] No thread table in backup; no conversation can be named");
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}, {} FROM thread ORDER BY rowid",
            self.id_expr("thread")?,
            self.column_expr("thread", THREAD_RECIPIENT_COLUMNS)?,
        );
        let rows = self.collect_rows(&sql, |row| {
            Ok((value_as_i64(row.get(0)?), value_as_i64(row.get(1)?)))
        })?;
        Ok(rows.into_iter()
            .filter_map(|(id, recipient_id)| id.map(|id| ThreadRecord { id, recipient_id }))
            .collect())
    }

    fn recipients(&self) -> Result<Vec<RecipientRecord>> {
        if !self.has_table("recipient")? {
            log::warn!("[Signal] No recipient table in backup; senders cannot be resolved");
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}, {}, {} FROM recipient ORDER BY rowid",
            self.id_expr("recipient")?,
            self.column_expr("recipient", RECIPIENT_NAME_COLUMNS)?,
            self.column_expr("recipient", &["group_id"])?,
        );
        let rows = self.collect_rows(&sql, |row| {
            Ok((value_as_i64(row.get(0)?), value_as_text(row.get(1)?), value_as_text(row.get(2)?)))
        })?;
        Ok(rows.into_iter()
            .filter_map(|(id, display_name, group_id)| {
                id.map(|id| RecipientRecord { id, display_name, group_id })
            })
            .collect())
    }

    fn groups(&self) -> Result<Vec<GroupRecord>> {
        if !self.has_table("groups")? {
            log::info!("[Signal] No groups table in backup");
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {}, {}, {} FROM groups ORDER BY rowid",
            self.column_expr("groups", &["group_id"])?,
            self.column_expr("groups", &["recipient_id"])?,
            self.column_expr("groups", &["title"])?,
        );
        self.collect_rows(&sql, |row| {
            Ok(GroupRecord {
                group_id: value_as_text(row.get(0)?),
                recipient_id: value_as_i64(row.get(1)?),
                title: value_as_text(row.get(2)?),
            })
        })
    }
}

/// Integers, integral reals and numeric text are accepted; anything else is absent.
fn value_as_i64(value: Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(i),
        Value::Real(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
    }
}
