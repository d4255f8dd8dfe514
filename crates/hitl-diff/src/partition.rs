//! Entity partitions and shared diff statistics
//!
//! Provides [`Partition`] (the add/remove/modify/unchanged split of two entity
//! sets) and [`DiffStats`] (the counters every envelope carries).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Single entity inside a diff side or partition bucket
///
/// Only `id` is interpreted; everything else the backend sends is kept in
/// `attributes` so renderers can show it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffEntity {
    /// Stable entity identifier
    pub id: String,

    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Remaining backend fields
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl DiffEntity {
    /// Create entity with id only
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            attributes: Map::new(),
        }
    }

    /// With display label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// With extra attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Label if present, otherwise the id
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// Entity present on both sides with different content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedEntity {
    /// Entity identifier (shared by both sides)
    pub id: String,
    /// Left-hand (before) version
    pub left: DiffEntity,
    /// Right-hand (after) version
    pub right: DiffEntity,
    /// Names of the fields that differ
    #[serde(
        default,
        deserialize_with = "crate::null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub changed_fields: Vec<String>,
}

impl ModifiedEntity {
    /// Create modified entry from both versions
    #[must_use]
    pub fn new(left: DiffEntity, right: DiffEntity) -> Self {
        let changed_fields = changed_fields(&left, &right);
        Self {
            id: right.id.clone(),
            left,
            right,
            changed_fields,
        }
    }
}

fn changed_fields(left: &DiffEntity, right: &DiffEntity) -> Vec<String> {
    let mut fields = Vec::new();
    if left.label != right.label {
        fields.push("label".to_string());
    }
    for (key, value) in &right.attributes {
        if left.attributes.get(key) != Some(value) {
            fields.push(key.clone());
        }
    }
    for key in left.attributes.keys() {
        if !right.attributes.contains_key(key) {
            fields.push(key.clone());
        }
    }
    fields
}

/// One side of a two-way comparison
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiffSide {
    /// Side caption ("current", "proposed", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Entities on this side
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub items: Vec<DiffEntity>,
}

impl DiffSide {
    /// Create side from entities
    #[inline]
    #[must_use]
    pub fn new(items: Vec<DiffEntity>) -> Self {
        Self { label: None, items }
    }

    /// With caption
    #[inline]
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Add/remove/modify/unchanged split of two entity sets
///
/// The backend computes the split; this type only carries it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Partition {
    /// Entities only on the right
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub added: Vec<DiffEntity>,
    /// Entities only on the left
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub removed: Vec<DiffEntity>,
    /// Entities on both sides with differences
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub modified: Vec<ModifiedEntity>,
    /// Entities identical on both sides
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub unchanged: Vec<DiffEntity>,
}

impl Partition {
    /// Create empty partition
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With added entities
    #[inline]
    #[must_use]
    pub fn with_added(mut self, entities: Vec<DiffEntity>) -> Self {
        self.added = entities;
        self
    }

    /// With removed entities
    #[inline]
    #[must_use]
    pub fn with_removed(mut self, entities: Vec<DiffEntity>) -> Self {
        self.removed = entities;
        self
    }

    /// With modified entities
    #[inline]
    #[must_use]
    pub fn with_modified(mut self, entities: Vec<ModifiedEntity>) -> Self {
        self.modified = entities;
        self
    }

    /// With unchanged entities
    #[inline]
    #[must_use]
    pub fn with_unchanged(mut self, entities: Vec<DiffEntity>) -> Self {
        self.unchanged = entities;
        self
    }

    /// True when every bucket is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.unchanged.is_empty()
    }

    /// Number of changed entities (added + removed + modified)
    #[inline]
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// Counters shared by every diff envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    /// Entities on the left side
    pub total_left: usize,
    /// Entities on the right side
    pub total_right: usize,
    /// Length of `diff.added`
    pub added_count: usize,
    /// Length of `diff.removed`
    pub removed_count: usize,
    /// Length of `diff.modified`
    pub modified_count: usize,
    /// Length of `diff.unchanged`
    pub unchanged_count: usize,
}

impl DiffStats {
    /// Derive stats that agree with a partition
    ///
    /// Totals assume both sides are fully described by the partition.
    #[must_use]
    pub fn from_partition(partition: &Partition) -> Self {
        let shared = partition.modified.len() + partition.unchanged.len();
        Self {
            total_left: partition.removed.len() + shared,
            total_right: partition.added.len() + shared,
            added_count: partition.added.len(),
            removed_count: partition.removed.len(),
            modified_count: partition.modified.len(),
            unchanged_count: partition.unchanged.len(),
        }
    }

    /// Sum of the four bucket counters
    #[inline]
    #[must_use]
    pub fn bucket_total(&self) -> usize {
        self.added_count + self.removed_count + self.modified_count + self.unchanged_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats_from_partition() {
        let partition = Partition::new()
            .with_added(vec![DiffEntity::new("a"), DiffEntity::new("b")])
            .with_removed(vec![DiffEntity::new("c")])
            .with_unchanged(vec![DiffEntity::new("d")]);

        let stats = DiffStats::from_partition(&partition);
        assert_eq!(stats.added_count, 2);
        assert_eq!(stats.removed_count, 1);
        assert_eq!(stats.unchanged_count, 1);
        assert_eq!(stats.total_left, 2);
        assert_eq!(stats.total_right, 3);
        assert_eq!(stats.bucket_total(), 4);
    }

    #[test]
    fn modified_entity_tracks_changed_fields() {
        let left = DiffEntity::new("req-1")
            .with_label("Old")
            .with_attribute("priority", json!("low"))
            .with_attribute("owner", json!("ops"));
        let right = DiffEntity::new("req-1")
            .with_label("Old")
            .with_attribute("priority", json!("high"));

        let modified = ModifiedEntity::new(left, right);
        assert_eq!(modified.id, "req-1");
        assert!(modified.changed_fields.contains(&"priority".to_string()));
        assert!(modified.changed_fields.contains(&"owner".to_string()));
        assert!(!modified.changed_fields.contains(&"label".to_string()));
    }

    #[test]
    fn entity_keeps_unknown_fields() {
        let entity: DiffEntity =
            serde_json::from_value(json!({"id": "n1", "label": "Node", "kind": "system"}))
                .unwrap();
        assert_eq!(entity.display_name(), "Node");
        assert_eq!(entity.attributes.get("kind"), Some(&json!("system")));
    }

    #[test]
    fn empty_partition() {
        assert!(Partition::new().is_empty());
        assert_eq!(Partition::new().change_count(), 0);
    }
}
