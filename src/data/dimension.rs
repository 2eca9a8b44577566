//! Per-field ordered indexes
//!
//! A [`Dimension`] orders the records of one dataset by one field in one
//! direction, grouping records whose values compare equal. It answers
//! "top K" and exact-match lookups without re-sorting. Dimensions are
//! cached per `(field, direction)` in a [`DimensionCache`] and only rebuilt
//! after an explicit invalidation.

use crate::data::document::FieldType;
use crate::data::query::SortDirection;
use crate::data::value_compare::{compare_typed, term_matches};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

/// Records sharing one value of the dimension's field
#[derive(Debug, Clone)]
pub struct Group {
    pub key: Value,
    pub records: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Dimension {
    field: String,
    direction: SortDirection,
    field_type: Option<FieldType>,
    groups: Vec<Group>,
    // record index -> position of its group
    ranks: Vec<usize>,
}

impl Dimension {
    pub fn build(
        field: &str,
        direction: SortDirection,
        rows: &[Value],
        field_type: Option<FieldType>,
    ) -> Self {
        let compare = |a: &usize, b: &usize| {
            let ord = compare_typed(rows[*a].get(field), rows[*b].get(field), field_type);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        };

        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(&compare);

        let mut groups: Vec<Group> = Vec::new();
        let mut ranks = vec![0; rows.len()];
        for idx in order {
            let same = groups
                .last()
                .and_then(|g| g.records.first())
                .map_or(false, |first| compare(first, &idx) == Ordering::Equal);
            if !same {
                let key = rows[idx].get(field).cloned().unwrap_or(Value::Null);
                groups.push(Group {
                    key,
                    records: Vec::new(),
                });
            }
            let position = groups.len() - 1;
            groups[position].records.push(idx);
            ranks[idx] = position;
        }

        Self {
            field: field.to_string(),
            direction,
            field_type,
            groups,
            ranks,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// All record indexes in dimension order
    pub fn ordered(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups.iter().flat_map(|g| g.records.iter().copied())
    }

    /// The first `k` records in dimension order
    pub fn top(&self, k: usize) -> Vec<usize> {
        self.ordered().take(k).collect()
    }

    /// Position of a record's group; equal values share a rank
    pub fn rank(&self, record: usize) -> usize {
        self.ranks.get(record).copied().unwrap_or(usize::MAX)
    }

    /// Records whose value matches `term`, in dimension order
    pub fn filter_exact(&self, rows: &[Value], term: &Value) -> Vec<usize> {
        self.ordered()
            .filter(|&i| term_matches(rows[i].get(&self.field), term, self.field_type))
            .collect()
    }
}

/// Lazily built dimensions of one dataset
#[derive(Debug, Default)]
pub struct DimensionCache {
    dimensions: HashMap<(String, SortDirection), Dimension>,
    builds: usize,
}

impl DimensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &mut self,
        field: &str,
        direction: SortDirection,
        rows: &[Value],
        field_type: Option<FieldType>,
    ) -> &Dimension {
        let key = (field.to_string(), direction);
        if !self.dimensions.contains_key(&key) {
            debug!(field, ?direction, rows = rows.len(), "Building dimension");
            self.builds += 1;
        }
        self.dimensions
            .entry(key)
            .or_insert_with(|| Dimension::build(field, direction, rows, field_type))
    }

    pub fn get(&self, field: &str, direction: SortDirection) -> Option<&Dimension> {
        self.dimensions.get(&(field.to_string(), direction))
    }

    pub fn contains(&self, field: &str, direction: SortDirection) -> bool {
        self.dimensions
            .contains_key(&(field.to_string(), direction))
    }

    /// Drop every dimension; the next query rebuilds what it needs
    pub fn invalidate(&mut self) {
        if !self.dimensions.is_empty() {
            debug!(count = self.dimensions.len(), "Invalidating dimensions");
        }
        self.dimensions.clear();
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// How many dimensions have been built over the cache's lifetime
    pub fn build_count(&self) -> usize {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"name": "c", "n": 3}),
            json!({"name": "a", "n": 1}),
            json!({"name": "b", "n": 3}),
            json!({"name": "d"}),
        ]
    }

    #[test]
    fn test_groups_equal_values() {
        let rows = rows();
        let dim = Dimension::build("n", SortDirection::Asc, &rows, Some(FieldType::Integer));
        let keys: Vec<_> = dim.groups().iter().map(|g| g.key.clone()).collect();
        assert_eq!(keys, vec![json!(null), json!(1), json!(3)]);
        assert_eq!(dim.rank(0), dim.rank(2));
        assert_eq!(dim.ordered().collect::<Vec<_>>(), vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_top_descending() {
        let rows = rows();
        let dim = Dimension::build("n", SortDirection::Desc, &rows, Some(FieldType::Integer));
        // ties keep insertion order
        assert_eq!(dim.top(2), vec![0, 2]);
        assert_eq!(dim.top(10).len(), 4);
    }

    #[test]
    fn test_filter_exact() {
        let rows = rows();
        let dim = Dimension::build("n", SortDirection::Asc, &rows, Some(FieldType::Integer));
        assert_eq!(dim.filter_exact(&rows, &json!(3)), vec![0, 2]);
        assert_eq!(dim.filter_exact(&rows, &json!("1")), vec![1]);
        assert!(dim.filter_exact(&rows, &json!(7)).is_empty());
    }

    #[test]
    fn test_cache_builds_once_per_pair() {
        let rows = rows();
        let mut cache = DimensionCache::new();
        cache.get_or_build("name", SortDirection::Asc, &rows, None);
        cache.get_or_build("name", SortDirection::Asc, &rows, None);
        cache.get_or_build("name", SortDirection::Desc, &rows, None);
        assert_eq!(cache.build_count(), 2);
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        cache.get_or_build("name", SortDirection::Asc, &rows, None);
        assert_eq!(cache.build_count(), 3);
    }
}
