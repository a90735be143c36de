use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Two-character auxiliary tag code (`NM`, `RG`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag([u8; 2]);

/// Tag code was not two alphanumeric ASCII characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tag name must be exactly two alphanumeric characters, got '{0}'")]
pub struct InvalidTag(pub String);

impl Tag {
    /// Alignment score.
    pub const ALIGNMENT_SCORE: Self = Self(*b"AS");
    /// Edit distance to the reference.
    pub const EDIT_DISTANCE: Self = Self(*b"NM");
    /// Read group.
    pub const READ_GROUP: Self = Self(*b"RG");

    /// Build a tag from its two raw bytes.
    pub fn new(code: [u8; 2]) -> Result<Self, InvalidTag> {
        if code.iter().all(u8::is_ascii_alphanumeric) {
            Ok(Self(code))
        } else {
            Err(InvalidTag(String::from_utf8_lossy(&code).into_owned()))
        }
    }

    /// Tag code as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl FromStr for Tag {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [a, b] => Self::new([*a, *b]).map_err(|_| InvalidTag(s.to_string())),
            _ => Err(InvalidTag(s.to_string())),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of an auxiliary tag as emitted by the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Any integer type (`c`, `C`, `s`, `S`, `i`, `I`).
    Integer(i64),
    /// Single-precision float (`f`).
    Float(f64),
    /// Printable string, character or hex value (`Z`, `A`, `H`).
    String(String),
    /// Numeric array (`B`).
    Array(Vec<TagValue>),
}

impl TagValue {
    /// Integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            TagValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Integer(value) => write!(f, "{value}"),
            TagValue::Float(value) => write!(f, "{value}"),
            TagValue::String(value) => f.write_str(value),
            TagValue::Array(values) => {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
        }
    }
}

/// Auxiliary data keyed by tag.
pub type Tags = BTreeMap<Tag, TagValue>;

/// Deserialize a `{"NM": 0, ...}` map, rejecting malformed tag codes.
pub(crate) fn deserialize_tags<'de, D>(deserializer: D) -> Result<Tags, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, TagValue> = BTreeMap::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(code, value)| {
            code.parse::<Tag>()
                .map(|tag| (tag, value))
                .map_err(serde::de::Error::custom)
        })
        .collect()
}
