use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 128-bit record identifier, rendered as a lowercase hyphenated hex
/// string (8-4-4-4-12). Immutable once a record is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Generate a fresh, random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// True if `prefix` (lowercase hex, hyphens stripped) is a prefix of
    /// this id's hyphen-stripped hex form. Per spec, callers only invoke
    /// this with prefixes of at least 8 hex characters; this method does
    /// not itself enforce that minimum.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let stripped = self.0.simple().to_string();
        stripped.starts_with(&prefix.to_ascii_lowercase())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Minimum number of hex characters a prefix lookup must supply.
pub const MIN_PREFIX_LEN: usize = 8;

/// True if `candidate` is shaped like a full id (parses as a UUID) rather
/// than a bare hex prefix or free-form text. Used by the tool surface to
/// decide whether an `update`/`forget` argument should resolve via direct
/// lookup or via retrieval.
#[must_use]
pub fn looks_like_identifier(candidate: &str) -> bool {
    RecordId::from_str(candidate).is_ok()
        || (candidate.len() >= MIN_PREFIX_LEN
            && candidate.chars().all(|c| c.is_ascii_hexdigit() || c == '-'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Preference,
    Fact,
    Decision,
    Entity,
    Other,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preference => "preference",
            Self::Fact => "fact",
            Self::Decision => "decision",
            Self::Entity => "entity",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preference" => Ok(Self::Preference),
            "fact" => Ok(Self::Fact),
            "decision" => Ok(Self::Decision),
            "entity" => Ok(Self::Entity),
            "other" => Ok(Self::Other),
            _ => Err(()),
        }
    }
}

/// The default importance assigned when a caller omits one, or supplies a
/// non-finite value.
pub const DEFAULT_IMPORTANCE: f32 = 0.7;

/// The default scope assigned when a caller omits one.
pub const DEFAULT_SCOPE: &str = "global";

/// The fundamental stored entity: a piece of text plus its dense vector,
/// access scope, and bookkeeping fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: RecordId,
    pub text: String,
    pub vector: Vec<f32>,
    pub category: Category,
    pub scope: String,
    pub importance: f32,
    pub timestamp: i64,
    pub metadata: String,
}

impl MemoryRecord {
    /// Clamp importance into `[0, 1]`, replacing non-finite values with the
    /// default per invariant 4.
    #[must_use]
    pub fn normalize_importance(importance: f32) -> f32 {
        if importance.is_finite() {
            importance.clamp(0.0, 1.0)
        } else {
            DEFAULT_IMPORTANCE
        }
    }
}

/// A newly-created record awaiting an id and timestamp from the store.
#[derive(Debug, Clone)]
pub struct NewMemoryRecord {
    pub text: String,
    pub vector: Vec<f32>,
    pub category: Category,
    pub scope: String,
    pub importance: f32,
    pub metadata: String,
}
