use crate::model::RawRow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::fmt;

/// Deduplication key derived from a row's visible text.
///
/// The joined cell texts are base64 encoded, so the key is reversible and
/// links never take part in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowIdentity(String);

impl RowIdentity {
    pub fn of(row: &RawRow) -> Self {
        Self(STANDARD.encode(row.signature()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the joined cell texts the identity was built from
    pub fn decode(&self) -> Option<String> {
        STANDARD
            .decode(&self.0)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identities seen since the last reset
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<RowIdentity>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the identity. Returns false when it was already seen.
    pub fn accept(&mut self, identity: RowIdentity) -> bool {
        self.seen.insert(identity)
    }

    pub fn contains(&self, identity: &RowIdentity) -> bool {
        self.seen.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
