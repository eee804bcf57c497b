//! Nuki bridge HTTP API types

use std::collections::HashSet;
use std::fmt::{self, Display};

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;

/// The identifier of a lock, as reported by the bridge.
///
/// Bridges report numeric ids, but string ids are accepted as well. The id
/// becomes one component of a state path, so it may not be empty or contain
/// `.` or `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LockId {
    /// A numeric id
    Number(i64),

    /// A string id
    Text(String),
}

impl Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockId::Number(id) => write!(f, "{id}"),
            LockId::Text(id) => write!(f, "{id}"),
        }
    }
}

impl LockId {
    /// Can this id be used as a single path component?
    #[must_use]
    pub fn is_path_safe(&self) -> bool {
        match self {
            LockId::Number(_) => true,
            LockId::Text(id) => !id.is_empty() && !id.contains(['.', '*']),
        }
    }
}

/// The last state the bridge knows about for a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastKnownState {
    /// Bridge defined status code
    pub state: Number,

    /// Human readable version of `state`
    pub state_name: String,

    /// Is the battery nearly flat?
    pub battery_critical: bool,

    /// When the state last changed, as reported by the bridge
    pub timestamp: String,
}

/// A lock as returned by the `/list` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// The id of the lock
    #[serde(alias = "nukiId")]
    pub id: LockId,

    /// The name of the lock
    pub name: String,

    /// The last known state of the lock
    pub last_known_state: LastKnownState,
}

/// The response of the `/list` endpoint.
///
/// Accepts either a JSON array of locks or a JSON object whose values are
/// locks. Order is preserved in both cases and ids must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockList(pub Vec<LockRecord>);

impl LockList {
    /// Consume the list returning the records.
    #[must_use]
    pub fn into_records(self) -> Vec<LockRecord> {
        self.0
    }

    /// The number of locks in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Is the list empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct LockListVisitor;

impl LockListVisitor {
    fn check_lock<E: de::Error>(
        seen: &mut HashSet<String>,
        lock: &LockRecord,
    ) -> Result<(), E> {
        if !lock.id.is_path_safe() {
            return Err(E::custom(format!("invalid lock id {:?}", lock.id.to_string())));
        }

        if seen.insert(lock.id.to_string()) {
            Ok(())
        } else {
            Err(E::custom(format!("duplicate lock id {}", lock.id)))
        }
    }
}

impl<'de> Visitor<'de> for LockListVisitor {
    type Value = LockList;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array or an object of locks")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut seen = HashSet::new();
        let mut locks = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(lock) = seq.next_element::<LockRecord>()? {
            Self::check_lock(&mut seen, &lock)?;
            locks.push(lock);
        }
        Ok(LockList(locks))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut seen = HashSet::new();
        let mut locks = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((_key, lock)) = map.next_entry::<String, LockRecord>()? {
            Self::check_lock(&mut seen, &lock)?;
            locks.push(lock);
        }
        Ok(LockList(locks))
    }
}

impl<'de> Deserialize<'de> for LockList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LockListVisitor)
    }
}
