// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phoenix channel frames used by the realtime change feed.

use lectern_core::{Change, ChangeEvent, LecternError, Table};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::mapping::{attendance_from_row, student_from_row};
use crate::types::{AttendanceRow, StudentRow};

pub const PHOENIX_TOPIC: &str = "phoenix";
pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_CHANGES: &str = "postgres_changes";

/// One frame on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
}

/// Channel topic for a table in the public schema.
pub fn topic_for(table: Table) -> String {
    format!("realtime:public:{table}")
}

/// Join frame subscribing to every change on `table`.
pub fn join_frame(table: Table, reference: u64) -> Frame {
    Frame {
        topic: topic_for(table),
        event: EVENT_JOIN.into(),
        payload: json!({
            "config": {
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table.to_string() }
                ]
            }
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_frame(reference: u64) -> Frame {
    Frame {
        topic: PHOENIX_TOPIC.into(),
        event: EVENT_HEARTBEAT.into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    #[serde(rename = "type")]
    kind: String,
    table: String,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Decode a text frame into a change event.
///
/// Returns `Ok(None)` for frames that carry no row change (replies,
/// heartbeats, presence, tables this client does not follow).
pub fn decode_change(text: &str) -> Result<Option<ChangeEvent>, LecternError> {
    let frame: Frame = serde_json::from_str(text).map_err(|e| bad_frame("frame", e))?;
    if frame.event != EVENT_CHANGES {
        return Ok(None);
    }

    // Newer servers nest the change under `data`.
    let body = frame.payload.get("data").cloned().unwrap_or(frame.payload);
    let payload: ChangePayload =
        serde_json::from_value(body).map_err(|e| bad_frame("payload", e))?;

    let Ok(table) = payload.table.parse::<Table>() else {
        return Ok(None);
    };

    let event = match (table, payload.kind.as_str()) {
        (Table::Students, "INSERT" | "UPDATE") => {
            let row: StudentRow = record(payload.record)?;
            let student = student_from_row(row);
            ChangeEvent::Student(if payload.kind == "INSERT" {
                Change::Insert(student)
            } else {
                Change::Update(student)
            })
        }
        (Table::Attendance, "INSERT" | "UPDATE") => {
            let row: AttendanceRow = record(payload.record)?;
            let entry = attendance_from_row(row)?;
            ChangeEvent::Attendance(if payload.kind == "INSERT" {
                Change::Insert(entry)
            } else {
                Change::Update(entry)
            })
        }
        (table, "DELETE") => {
            let id = payload
                .old_record
                .as_ref()
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)
                .ok_or_else(|| LecternError::Remote {
                    message: "delete notification without old_record.id".into(),
                    source: None,
                })?
                .to_string();
            match table {
                Table::Students => ChangeEvent::Student(Change::Delete { id }),
                Table::Attendance => ChangeEvent::Attendance(Change::Delete { id }),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn record<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Result<T, LecternError> {
    let value = value.ok_or_else(|| LecternError::Remote {
        message: "change notification without record".into(),
        source: None,
    })?;
    serde_json::from_value(value).map_err(|e| bad_frame("record", e))
}

fn bad_frame(what: &str, e: serde_json::Error) -> LecternError {
    LecternError::remote(format!("malformed realtime {what}"), e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_frame_targets_table_topic() {
        let frame = join_frame(Table::Attendance, 3);
        assert_eq!(frame.topic, "realtime:public:attendance");
        assert_eq!(frame.reference.as_deref(), Some("3"));
        assert_eq!(
            frame.payload["config"]["postgres_changes"][0]["table"],
            "attendance"
        );
        let text = serde_json::to_string(&frame).unwrap();
        assert!(text.contains("\"ref\":\"3\""));
    }

    #[test]
    fn decodes_nested_attendance_insert() {
        let text = json!({
            "topic": "realtime:public:attendance",
            "event": "postgres_changes",
            "payload": { "data": {
                "type": "INSERT",
                "table": "attendance",
                "schema": "public",
                "record": {
                    "id": "7e6b1c54-1d92-4b1f-8a8b-0b4e3e2f9a10",
                    "student_id": "S123",
                    "student_name": "Ana Reyes",
                    "timestamp": "2026-05-04T09:00:00Z",
                    "type": "check-in",
                    "method": "barcode",
                    "library": "main"
                }
            }},
            "ref": null
        })
        .to_string();

        let event = decode_change(&text).unwrap().unwrap();
        assert_eq!(event.kind(), "insert");
        assert_eq!(event.table(), Table::Attendance);
        assert_eq!(event.entity_id(), "7e6b1c54-1d92-4b1f-8a8b-0b4e3e2f9a10");
    }

    #[test]
    fn decodes_flat_student_delete() {
        let text = json!({
            "topic": "realtime:public:students",
            "event": "postgres_changes",
            "payload": {
                "type": "DELETE",
                "table": "students",
                "old_record": { "id": "u9" }
            }
        })
        .to_string();
        let event = decode_change(&text).unwrap().unwrap();
        assert_eq!(event, ChangeEvent::Student(Change::Delete { id: "u9".into() }));
    }

    #[test]
    fn non_change_frames_are_ignored() {
        let reply = json!({
            "topic": "phoenix", "event": "phx_reply",
            "payload": { "status": "ok" }, "ref": "1"
        })
        .to_string();
        assert_eq!(decode_change(&reply).unwrap(), None);
        assert!(decode_change("not json").is_err());
    }
}
