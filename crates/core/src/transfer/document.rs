//! Conversion of source documents into log items.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::logservice::LogItem;
use crate::source::SourceDocument;

/// Content key carrying the source document id.
pub const ID_KEY: &str = "_id";

const MILLIS_THRESHOLD: f64 = 1e12;

/// Build a log item from `doc`, timed by `time_reference` or `fallback_time`.
pub fn to_log_item(doc: &SourceDocument, time_reference: Option<&str>, fallback_time: u32) -> LogItem {
    let mut contents = vec![(ID_KEY.to_string(), doc.id.clone())];
    if let Value::Object(fields) = &doc.source {
        flatten_into(fields, "", &mut contents);
    }

    let time = time_reference
        .and_then(|field| lookup(&doc.source, field))
        .and_then(parse_time)
        .unwrap_or(fallback_time);

    LogItem { time, contents }
}

/// Current time in epoch seconds.
pub fn now_secs() -> u32 {
    u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX)
}

fn flatten_into(fields: &Map<String, Value>, prefix: &str, out: &mut Vec<(String, String)>) {
    for (name, value) in fields {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            Value::Null => {}
            Value::Object(nested) => flatten_into(nested, &key, out),
            Value::String(s) => out.push((key, s.clone())),
            other => out.push((key, other.to_string())),
        }
    }
}

/// Field value by exact key, then by dotted path.
fn lookup<'a>(source: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = source.get(field) {
        return Some(v);
    }
    field
        .split('.')
        .try_fold(source, |current, part| current.get(part))
}

fn parse_time(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_time_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(raw: f64) -> Option<u32> {
    let secs = if raw > MILLIS_THRESHOLD { raw / 1000.0 } else { raw };
    if secs < 0.0 || secs > f64::from(u32::MAX) {
        return None;
    }
    Some(secs as u32)
}

fn parse_time_str(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }
    let timestamp = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.timestamp()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        dt.and_utc().timestamp()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        dt.and_utc().timestamp()
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
            .timestamp()
    };
    u32::try_from(timestamp).ok()
}
