use serde::{Deserialize, Serialize};

use crate::record::Value;

/// A single-field predicate, the target of the query planner's access-path
/// choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
}

impl Predicate {
    /// Whether this predicate can be served as a bounded range over an
    /// ordered index.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Predicate::Gt(_) | Predicate::Gte(_) | Predicate::Lt(_) | Predicate::Lte(_)
        )
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Predicate::Eq(v) => values_eq(value, v),
            Predicate::Gt(v) => compare(value, v).map(|o| o.is_gt()).unwrap_or(false),
            Predicate::Gte(v) => compare(value, v).map(|o| o.is_ge()).unwrap_or(false),
            Predicate::Lt(v) => compare(value, v).map(|o| o.is_lt()).unwrap_or(false),
            Predicate::Lte(v) => compare(value, v).map(|o| o.is_le()).unwrap_or(false),
            Predicate::In(vs) => vs.iter().any(|v| values_eq(value, v)),
        }
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x - y).abs() < f64::EPSILON,
        (Value::Date(x), Value::Date(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Date(x), Value::Date(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => x.partial_cmp(y),
        _ => None,
    }
}

/// Sort direction for `orderBy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A time-range filter against the canonical `timestamp` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: chrono::DateTime<chrono::Utc>,
    pub to: chrono::DateTime<chrono::Utc>,
}

/// Options accepted by `find`/`findPage`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FindOptions {
    pub where_: Vec<(String, Predicate)>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Opaque keyset cursor from a previous `findPage` call.
    pub cursor: Option<String>,
}

/// Options accepted by `search`/`vectorSearch`/`vectorSearchText`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchOptions {
    pub equality: Vec<(String, Value)>,
    pub time_range: Option<TimeRange>,
    pub limit: Option<usize>,
}

/// An opaque keyset-pagination cursor: base64-encoded JSON `{lastId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor {
    pub last_id: i64,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("Cursor always serializes");
        base64_encode(&json)
    }

    pub fn decode(token: &str) -> Option<Self> {
        let bytes = base64_decode(token)?;
        serde_json::from_slice(&bytes).ok()
    }
}

// Minimal base64 (standard alphabet, no external dependency needed at this
// layer — docstore-crypto depends on the `base64` crate for envelope I/O;
// cursors are an internal implementation detail so we keep this self-contained).
fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[(b2 & 0x3f) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let s = s.trim_end_matches('=');
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for chunk in bytes.chunks(4) {
        let vals: Vec<u8> = chunk.iter().filter_map(|&c| val(c)).collect();
        if vals.len() != chunk.len() {
            return None;
        }
        out.push((vals[0] << 2) | (vals.get(1).copied().unwrap_or(0) >> 4));
        if vals.len() > 2 {
            out.push((vals[1] << 4) | (vals[2] >> 2));
        }
        if vals.len() > 3 {
            out.push((vals[2] << 6) | vals[3]);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_roundtrips() {
        let c = Cursor { last_id: 42 };
        let token = c.encode();
        let decoded = Cursor::decode(&token).unwrap();
        assert_eq!(decoded.last_id, 42);
    }

    #[test]
    fn predicate_range_matches() {
        let p = Predicate::Gte(Value::Number(10.0));
        assert!(p.matches(Some(&Value::Number(10.0))));
        assert!(p.matches(Some(&Value::Number(11.0))));
        assert!(!p.matches(Some(&Value::Number(9.0))));
    }
}
