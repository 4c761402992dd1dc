//! Decompression, decoding and normalization of the two on-the-wire note
//! encodings (spec §4.2).
//!
//! - [`decode_delta_notes`]: Base85 → gzip → UTF-8 → JSON array of raw
//!   records, as carried in a delta page's `notes` field.
//! - [`decode_snapshot_csv`]: optionally-gzipped CSV with `;` delimiter and
//!   `'` quote character, as served at a signed snapshot URL.
//! - [`normalize_notes`]: the shared raw-record -> [`NoteInfo`] projection
//!   applied to both decoders' output.

use std::collections::HashMap;
use std::io::Read;

use serde_json::Value;

use crate::base85;
use crate::error::{ClientError, Result};
use crate::models::{LastUpdateType, NoteInfo};

/// Base85 → gzip → UTF-8 → JSON array of raw note records.
///
/// Any failure at any step is a protocol/decode error (spec §4.2, §7).
pub fn decode_delta_notes(encoded: &str) -> Result<Vec<HashMap<String, Value>>> {
    let gzipped = base85::decode(encoded)?;

    let mut decoder = flate2::read::GzDecoder::new(&gzipped[..]);
    let mut json_bytes = Vec::new();
    decoder
        .read_to_end(&mut json_bytes)
        .map_err(|e| ClientError::Protocol(format!("gzip decompress failed: {e}")))?;

    let text = String::from_utf8(json_bytes)
        .map_err(|e| ClientError::Protocol(format!("notes payload is not valid UTF-8: {e}")))?;

    serde_json::from_str(&text)
        .map_err(|e| ClientError::Protocol(format!("notes JSON decode failed: {e}")))
}

/// Decode a snapshot CSV body. `filename` is the last path segment of the
/// signed URL (query string stripped); if it ends in `.gz` the body is
/// gzip-decompressed before CSV parsing.
pub fn decode_snapshot_csv(body: &[u8], filename: &str) -> Result<Vec<HashMap<String, Value>>> {
    let text = if filename.ends_with(".gz") {
        let mut decoder = flate2::read::GzDecoder::new(body);
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| ClientError::Protocol(format!("gzip decompress failed: {e}")))?;
        out
    } else {
        String::from_utf8(body.to_vec())
            .map_err(|e| ClientError::Protocol(format!("snapshot body is not valid UTF-8: {e}")))?
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'\'')
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ClientError::Protocol(format!("CSV header read failed: {e}")))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ClientError::Protocol(format!("CSV row read failed: {e}")))?;
        let mut row = HashMap::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), Value::String(field.to_string()));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Project a raw record (from either decoder) into a canonical [`NoteInfo`].
/// Pure and deterministic given its input (spec §4.2).
pub fn normalize_notes(raw: Vec<HashMap<String, Value>>) -> Result<Vec<NoteInfo>> {
    raw.into_iter().map(normalize_one).collect()
}

fn normalize_one(mut raw: HashMap<String, Value>) -> Result<NoteInfo> {
    let fields = parse_maybe_string_json(raw.remove("fields"))?
        .map(flatten_object_to_pairs)
        .unwrap_or_default();

    let tags = parse_maybe_string_json(raw.remove("tags"))?
        .map(|v| match v {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default();

    let anki_id = coerce_i64(raw.remove("anki_id"))
        .ok_or_else(|| ClientError::Protocol("note record missing anki_id".into()))?;
    let note_type_id = coerce_i64(raw.remove("note_type_id"))
        .ok_or_else(|| ClientError::Protocol("note record missing note_type_id".into()))?;

    let ah_nid = raw
        .remove("note_id")
        .or_else(|| raw.remove("ankihub_id"))
        .or_else(|| raw.remove("id"))
        .and_then(|v| value_to_string(&v))
        .ok_or_else(|| ClientError::Protocol("note record missing an identity field".into()))?;

    let deleted = raw
        .remove("deleted")
        .map(is_truthy)
        .unwrap_or(false);

    let last_update_type = if deleted {
        Some(LastUpdateType::Delete)
    } else {
        match raw.remove("last_update_type") {
            Some(Value::String(s)) => match s.as_str() {
                "create" => Some(LastUpdateType::Create),
                "update" => Some(LastUpdateType::Update),
                "delete" => Some(LastUpdateType::Delete),
                _ => None,
            },
            _ => None,
        }
    };

    Ok(NoteInfo {
        ah_nid,
        anki_id,
        note_type_id,
        fields,
        tags,
        last_update_type,
        extra: raw,
    })
}

fn parse_maybe_string_json(value: Option<Value>) -> Result<Option<Value>> {
    match value {
        Some(Value::String(s)) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| ClientError::Protocol(format!("embedded JSON decode failed: {e}"))),
        other => Ok(other),
    }
}

fn flatten_object_to_pairs(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn coerce_i64(value: Option<Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: Value) -> bool {
    match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_i64().map(|n| n != 0).unwrap_or(false),
        _ => false,
    }
}
