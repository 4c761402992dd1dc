//! Shared fixtures for the end-to-end scenarios in spec §8: building the
//! same Base85(gzip(JSON)) wire encoding the service produces for delta
//! pages, and a `;`-delimited/`'`-quoted snapshot CSV.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};

/// Route the crate's `tracing` output through the test harness so retry
/// attempts, cancellation and snapshot-detour logs are visible with
/// `cargo test -- --nocapture`. Safe to call once per test; later calls
/// are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

const ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz!#$%&()*+-;<=>?@^_`{|}~";

/// Inverse of `flashsync_client::base85::decode`, used only to build test
/// fixtures — the crate itself never needs to encode Base85.
fn b85_encode(data: &[u8]) -> String {
    let mut out = String::new();
    for chunk in data.chunks(4) {
        let mut buf = [0u8; 4];
        buf[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(buf);
        let mut digits = [0u8; 5];
        let mut v = value;
        for slot in digits.iter_mut().rev() {
            *slot = ALPHABET[(v % 85) as usize];
            v /= 85;
        }
        let take = chunk.len() + 1;
        out.push_str(std::str::from_utf8(&digits[..take]).unwrap());
    }
    out
}

/// Build a raw note record in the shape the service sends before
/// normalization.
pub fn raw_note(
    ah_nid: &str,
    anki_id: i64,
    note_type_id: i64,
    fields: Value,
    tags: Vec<&str>,
    deleted: bool,
) -> Value {
    json!({
        "note_id": ah_nid,
        "anki_id": anki_id,
        "note_type_id": note_type_id,
        "fields": fields,
        "tags": tags,
        "deleted": deleted,
    })
}

/// Encode a JSON array of raw note records the way a delta page's `notes`
/// field is encoded on the wire: JSON -> gzip -> Base85.
pub fn encode_notes(records: &Value) -> String {
    let json_bytes = serde_json::to_vec(records).expect("serialize fixture notes");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json_bytes).expect("gzip fixture notes");
    let gzipped = encoder.finish().expect("finish gzip");
    b85_encode(&gzipped)
}

/// Build a snapshot CSV body (`;` delimiter, `'` quote char, header row)
/// for the given `(note_id, anki_id, note_type_id, fields_json, tags_json)`
/// rows. Values are chosen by callers to avoid the delimiter/quote
/// characters so no escaping is needed.
pub fn build_snapshot_csv(rows: &[(String, i64, i64, String, String)]) -> Vec<u8> {
    let mut out = String::from("note_id;anki_id;note_type_id;fields;tags\n");
    for (id, anki_id, note_type_id, fields, tags) in rows {
        out.push_str(&format!("{id};{anki_id};{note_type_id};{fields};{tags}\n"));
    }
    out.into_bytes()
}
