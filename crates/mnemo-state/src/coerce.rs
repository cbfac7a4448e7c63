//! Lenient field coercion for rows crossing the store boundary.
//!
//! Stores hand back heterogeneous representations of the same field (a
//! priority may arrive as `0.5`, `"0.5"` or `null`; a timestamp as RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` or unix seconds). Each helper here accepts every
//! known representation and normalizes to one canonical Rust type, with a
//! documented fallback for missing or null values:
//!
//! | field kind | accepted | fallback |
//! |------------|----------|----------|
//! | float | number, numeric string | `0.0` |
//! | count | number, numeric string (negatives clamp to 0) | `0` |
//! | timestamp | RFC 3339, `YYYY-MM-DD HH:MM:SS`, unix seconds | current time |
//! | store datetime | native SurrealDB datetime or any timestamp form | current time |
//! | string list | array, JSON-encoded array string, comma list | empty |
//! | embedding | number array, hex of little-endian `f32` bytes | `None` |
//! | text | string, number, bool | empty string |
//!
//! All helpers are meant for `#[serde(default, deserialize_with = "...")]`.
//! Timestamp fields pair them with `default = "Utc::now"` (or
//! [`now_datetime`]) so a missing field also reads as the current time.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use surrealdb::sql::Datetime as SurrealDatetime;

const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Instant {
    Native(SurrealDatetime),
    Scalar(Scalar),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Vector {
    List(Vec<f32>),
    Text(String),
}

/// Coerce a float field. Null, missing or unparsable values become `0.0`.
pub fn float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => i as f64,
        Some(Scalar::Float(f)) => f,
        Some(Scalar::Text(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Scalar::Bool(_)) | None => 0.0,
    })
}

/// Coerce a non-negative count. Negative numbers clamp to zero.
pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(i)) => i,
        Some(Scalar::Float(f)) => f as i64,
        Some(Scalar::Text(s)) => s.trim().parse::<f64>().map(|f| f as i64).unwrap_or(0),
        Some(Scalar::Bool(_)) | None => 0,
    };
    Ok(raw.clamp(0, i64::from(u32::MAX)) as u32)
}

/// Coerce a free-text field. Null becomes the empty string.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}

/// Coerce an optional free-text field. Null and empty strings become `None`.
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = text(deserializer)?;
    Ok(if value.is_empty() { None } else { Some(value) })
}

/// Coerce a timestamp. Null or unparsable values become the current time.
pub fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .and_then(scalar_timestamp)
        .unwrap_or_else(Utc::now))
}

/// Coerce a datetime read back from SurrealDB. Rows written by this crate
/// hold native datetimes; imported rows may hold strings or unix seconds.
pub fn datetime<'de, D>(deserializer: D) -> Result<SurrealDatetime, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Instant>::deserialize(deserializer)? {
        Some(Instant::Native(dt)) => dt,
        Some(Instant::Scalar(raw)) => {
            SurrealDatetime::from(scalar_timestamp(raw).unwrap_or_else(Utc::now))
        }
        None => now_datetime(),
    })
}

/// Field default for store datetimes.
pub fn now_datetime() -> SurrealDatetime {
    SurrealDatetime::from(Utc::now())
}

fn scalar_timestamp(raw: Scalar) -> Option<DateTime<Utc>> {
    match raw {
        Scalar::Text(s) => parse_timestamp(&s),
        Scalar::Int(secs) => Utc.timestamp_opt(secs, 0).single(),
        Scalar::Float(secs) => Utc.timestamp_opt(secs as i64, 0).single(),
        Scalar::Bool(_) => None,
    }
}

/// Coerce a list of strings (tags, memory id lists).
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringList>::deserialize(deserializer)? {
        Some(StringList::List(items)) => items,
        Some(StringList::Text(s)) => parse_string_list(&s),
        None => Vec::new(),
    })
}

/// Coerce an optional embedding vector.
pub fn embedding<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Vector>::deserialize(deserializer)? {
        Some(Vector::List(v)) if !v.is_empty() => Some(v),
        Some(Vector::Text(s)) => hex::decode(s.trim().trim_start_matches("0x"))
            .ok()
            .map(|bytes| decode_embedding(&bytes))
            .filter(|v| !v.is_empty()),
        _ => None,
    })
}

/// Parse a timestamp in any of the accepted textual representations.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, SQL_DATETIME_FORMAT) {
        return Some(naive.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn parse_string_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "[]" {
        return Vec::new();
    }
    if let Ok(items) = serde_json::from_str::<Vec<String>>(raw) {
        return items;
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Encode a vector as fixed-width little-endian `f32` bytes (4 bytes per element).
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode little-endian `f32` bytes. A trailing partial element is ignored.
pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "float")]
        priority: f64,
        #[serde(default, deserialize_with = "count")]
        access_count: u32,
        #[serde(default = "Utc::now", deserialize_with = "timestamp")]
        accessed_at: DateTime<Utc>,
        #[serde(default, deserialize_with = "string_list")]
        tags: Vec<String>,
        #[serde(default, deserialize_with = "embedding")]
        embedding: Option<Vec<f32>>,
        #[serde(default, deserialize_with = "opt_text")]
        source: Option<String>,
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        let row: Row = serde_json::from_value(json!({
            "priority": "0.75",
            "access_count": "3",
        }))
        .unwrap();
        assert_eq!(row.priority, 0.75);
        assert_eq!(row.access_count, 3);
    }

    #[test]
    fn test_missing_and_null_fields_use_defaults() {
        let before = Utc::now();
        let row: Row = serde_json::from_value(json!({
            "priority": null,
            "tags": null,
        }))
        .unwrap();
        assert_eq!(row.priority, 0.0);
        assert_eq!(row.access_count, 0);
        assert!(row.accessed_at >= before);
        assert!(row.tags.is_empty());
        assert!(row.embedding.is_none());
        assert!(row.source.is_none());
    }

    #[test]
    fn test_negative_count_clamps_to_zero() {
        let row: Row = serde_json::from_value(json!({"access_count": -4})).unwrap();
        assert_eq!(row.access_count, 0);
    }

    #[test]
    fn test_timestamp_representations() {
        let sql: Row =
            serde_json::from_value(json!({"accessed_at": "2024-03-01 12:30:00"})).unwrap();
        let rfc: Row =
            serde_json::from_value(json!({"accessed_at": "2024-03-01T12:30:00Z"})).unwrap();
        let unix: Row = serde_json::from_value(json!({"accessed_at": 1709296200})).unwrap();

        assert_eq!(sql.accessed_at, rfc.accessed_at);
        assert_eq!(rfc.accessed_at, unix.accessed_at);
    }

    #[test]
    fn test_null_and_garbage_timestamps_read_as_now() {
        let before = Utc::now();
        let null: Row = serde_json::from_value(json!({"accessed_at": null})).unwrap();
        let garbage: Row = serde_json::from_value(json!({"accessed_at": "yesterday"})).unwrap();
        assert!(null.accessed_at >= before);
        assert!(garbage.accessed_at >= before);
    }

    #[derive(Debug, Deserialize)]
    struct StoreRow {
        #[serde(default = "now_datetime", deserialize_with = "datetime")]
        created_at: SurrealDatetime,
    }

    #[test]
    fn test_store_datetime_accepts_every_form() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        for raw in [
            json!({"created_at": "2024-03-01 12:30:00"}),
            json!({"created_at": "2024-03-01T12:30:00Z"}),
            json!({"created_at": 1709296200}),
        ] {
            let row: StoreRow = serde_json::from_value(raw).unwrap();
            assert_eq!(DateTime::<Utc>::from(row.created_at), expected);
        }

        let before = Utc::now();
        let missing: StoreRow = serde_json::from_value(json!({})).unwrap();
        assert!(DateTime::<Utc>::from(missing.created_at) >= before);
    }

    #[test]
    fn test_tags_from_json_string_and_array() {
        let a: Row = serde_json::from_value(json!({"tags": "[\"rust\",\"db\"]"})).unwrap();
        let b: Row = serde_json::from_value(json!({"tags": ["rust", "db"]})).unwrap();
        let c: Row = serde_json::from_value(json!({"tags": "[]"})).unwrap();
        assert_eq!(a.tags, b.tags);
        assert!(c.tags.is_empty());
    }

    #[test]
    fn test_embedding_from_hex_and_array() {
        let hexed = hex::encode(encode_embedding(&[1.0, -0.5]));
        let a: Row = serde_json::from_value(json!({"embedding": hexed})).unwrap();
        let b: Row = serde_json::from_value(json!({"embedding": [1.0, -0.5]})).unwrap();
        assert_eq!(a.embedding, Some(vec![1.0, -0.5]));
        assert_eq!(a.embedding, b.embedding);
    }

    #[test]
    fn test_decode_ignores_trailing_partial_element() {
        let mut bytes = encode_embedding(&[0.25, 4.0]);
        bytes.push(0xFF);
        assert_eq!(decode_embedding(&bytes), vec![0.25, 4.0]);
    }
}
