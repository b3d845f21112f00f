//! Change Tracker
//!
//! Field-level diff between the merged configuration and the primary
//! source's own snapshot. The diff names exactly the fields that must be
//! written back to make the primary store match the merged result.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::merge::resolve_snapshot;
use crate::schema::{Configuration, schema_of};
use crate::source::ConfigurationSource;
use crate::types::{Result, display_value, to_record};

// =============================================================================
// Change Set
// =============================================================================

/// One differing field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Value in the primary snapshot
    pub old: Value,
    /// Value in the merged configuration
    pub new: Value,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", display_value(&self.old), display_value(&self.new))
    }
}

/// Differing fields keyed by identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldChange)> {
        self.changes.iter()
    }

    /// Identifiers to hand to a partial save
    pub fn field_names(&self) -> BTreeSet<String> {
        self.changes.keys().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = (&'a String, &'a FieldChange);
    type IntoIter = std::collections::btree_map::Iter<'a, String, FieldChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, change)) in self.changes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", field, change)?;
        }
        Ok(())
    }
}

// =============================================================================
// Diffing
// =============================================================================

/// Schema fields whose value in `merged` differs from `primary`
pub fn changes<T: Configuration>(merged: &T, primary: &T) -> Result<ChangeSet> {
    let schema = schema_of::<T>()?;
    let merged = to_record(merged)?;
    let primary = to_record(primary)?;

    let mut set = ChangeSet::default();
    for field in schema.fields() {
        let new = merged.get(field.name()).cloned().unwrap_or(Value::Null);
        let old = primary.get(field.name()).cloned().unwrap_or(Value::Null);
        if new != old {
            set.changes
                .insert(field.name().to_string(), FieldChange { old, new });
        }
    }
    Ok(set)
}

/// Snapshot of the first source flagged primary.
///
/// With no primary source, or a failed optional one, this is the zeroed
/// configuration. Extra primary sources are logged and ignored.
pub fn primary_snapshot<'a, T, I>(sources: I) -> Result<Arc<T>>
where
    T: Configuration,
    I: IntoIterator<Item = &'a dyn ConfigurationSource<T>>,
{
    let primaries: Vec<&dyn ConfigurationSource<T>> =
        sources.into_iter().filter(|s| s.is_primary()).collect();

    let Some(first) = primaries.first() else {
        debug!("No primary source, comparing against the zeroed configuration");
        return Ok(Arc::new(schema_of::<T>()?.zeroed()?));
    };
    if primaries.len() > 1 {
        let ignored: Vec<&str> = primaries[1..].iter().map(|s| s.name()).collect();
        warn!(
            primary = first.name(),
            ignored = ?ignored,
            "Multiple primary sources, using the first"
        );
    }

    match resolve_snapshot(*first)? {
        Some(snapshot) => Ok(snapshot),
        None => Ok(Arc::new(schema_of::<T>()?.zeroed()?)),
    }
}
