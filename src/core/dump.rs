use crate::error::{BoardError, BoardResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::ops::Deref;
use tracing::warn;

// `identifier:` right after `{` or `,`. The identifier charset matches what
// the game accepts for unquoted compound keys.
static REGEX_BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z0-9_\-+]+)\s*:").unwrap());
// Typed NBT numbers: 12b, 3s, 100L, 1.5f, 2.0d
static REGEX_NUMERIC_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(:\s*-?\d+(?:\.\d+)?)[bBsSlLfFdD]\b").unwrap());

type Pairs = Vec<(String, Value)>;

/// Player/value pairs of one compound found in a storage dump, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorageSlot(Pairs);

/// Lenient reader for `data get storage` output, which is close to JSON but
/// uses unquoted keys, single quotes and typed numbers.
pub struct StorageDump;

impl StorageDump {
    /// Best-effort parse: any failure is logged and yields no slots.
    pub fn parse(text: &str) -> Vec<StorageSlot> {
        match Self::try_parse(text) {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Discarding storage dump. {e}");
                vec![]
            }
        }
    }

    pub fn try_parse(text: &str) -> BoardResult<Vec<StorageSlot>> {
        if text.trim().is_empty() {
            return Ok(vec![]);
        }

        let normalized = quote_bare_keys(&strip_numeric_suffixes(&normalize_quotes(
            extract_aggregate(text),
        )));

        let parsed = serde_json::from_str::<Value>(&normalized).map_err(|e| {
            BoardError::MalformedPayload(format!("{e} in '{normalized}'"))
        })?;

        match parsed {
            Value::Array(entries) => Ok(entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Value::Object(map) => Some(map.into_iter().collect::<StorageSlot>()),
                    _ => None,
                })
                .collect()),
            // A lone compound is a single slot.
            Value::Object(map) => Ok(vec![map.into_iter().collect::<StorageSlot>()]),
            other => Err(BoardError::MalformedPayload(format!(
                "expected a list of compounds, got '{other}'"
            ))),
        }
    }
}

/// Widest bracketed span: first `[` to last `]`, else first `{` to last `}`,
/// else the whole trimmed text.
pub fn extract_aggregate(text: &str) -> &str {
    [('[', ']'), ('{', '}')]
        .iter()
        .find_map(|(open, close)| match (text.find(*open), text.rfind(*close)) {
            (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
            _ => None,
        })
        .unwrap_or_else(|| text.trim())
}

pub fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

pub fn strip_numeric_suffixes(text: &str) -> String {
    REGEX_NUMERIC_SUFFIX.replace_all(text, "${1}").into_owned()
}

pub fn quote_bare_keys(text: &str) -> String {
    REGEX_BARE_KEY
        .replace_all(text, r#"${1}"${2}":"#)
        .into_owned()
}

impl FromIterator<(String, Value)> for StorageSlot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        StorageSlot(iter.into_iter().collect())
    }
}

impl Serialize for StorageSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (player, value) in self.iter() {
            map.serialize_entry(player, value)?;
        }
        map.end()
    }
}

impl Deref for StorageSlot {
    type Target = Pairs;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
