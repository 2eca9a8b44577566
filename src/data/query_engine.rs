//! Filter, sort, facet and paginate rows held in memory
//!
//! Two paths share one result contract:
//! - [`QueryEngine::execute`] scans and stable-sorts on every call (in-memory
//!   and spreadsheet adapters).
//! - [`QueryEngine::execute_indexed`] answers from cached [`Dimension`]s
//!   (locally-indexed adapter).
//!
//! Sort keys are applied in sequence with a stable sort, so the last key in
//! `QueryState::sort` is the primary one. Filters run before the sort and
//! facets are computed over the whole filtered set before pagination.

use crate::data::dimension::DimensionCache;
use crate::data::document::{Field, FieldType};
use crate::data::facets::{compute_facets, DEFAULT_FACET_SIZE};
use crate::data::query::{QueryResult, QueryState, SortDirection};
use crate::data::value_compare::compare_typed;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueryEngine {
    facet_size: usize,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine {
    pub fn new() -> Self {
        Self {
            facet_size: DEFAULT_FACET_SIZE,
        }
    }

    pub fn with_facet_size(facet_size: usize) -> Self {
        Self { facet_size }
    }

    pub fn facet_size(&self) -> usize {
        self.facet_size
    }

    /// Full scan: filter, stable multi-key sort, facet, slice
    pub fn execute(&self, rows: &[Value], fields: &[Field], query: &QueryState) -> QueryResult {
        let field_type = |id: &str| lookup_type(fields, id);

        let mut eligible: Vec<&Value> = rows
            .iter()
            .filter(|row| query.filters.iter().all(|f| f.matches(row, field_type)))
            .collect();

        for spec in &query.sort {
            let ft = field_type(spec.field());
            eligible.sort_by(|a, b| {
                let ord = compare_typed(a.get(spec.field()), b.get(spec.field()), ft);
                directed(ord, spec.direction())
            });
        }

        self.finish(&eligible, query)
    }

    /// Indexed path. Builds missing dimensions into `cache` and reuses the
    /// ones already there; callers must invalidate the cache when `rows` change.
    pub fn execute_indexed(
        &self,
        rows: &[Value],
        fields: &[Field],
        query: &QueryState,
        cache: &mut DimensionCache,
    ) -> QueryResult {
        let field_type = |id: &str| lookup_type(fields, id);

        for filter in &query.filters {
            for (field, _) in filter.terms() {
                cache.get_or_build(field, SortDirection::Asc, rows, field_type(field));
            }
        }
        for spec in &query.sort {
            cache.get_or_build(spec.field(), spec.direction(), rows, field_type(spec.field()));
        }
        let cache = &*cache;

        // Single sort key and no filters: read the page straight off the dimension
        if query.filters.is_empty() && query.sort.len() == 1 {
            let spec = &query.sort[0];
            if let Some(dim) = cache.get(spec.field(), spec.direction()) {
                let range = query.page_range(rows.len());
                let page: Vec<Value> = dim
                    .top(range.end)
                    .into_iter()
                    .skip(range.start)
                    .map(|i| rows[i].clone())
                    .collect();
                let mut result = QueryResult::new(page, rows.len());
                if !query.facets.is_empty() {
                    let all: Vec<&Value> = rows.iter().collect();
                    result = result.with_facets(compute_facets(&all, &query.facets, self.facet_size));
                }
                return result;
            }
        }

        let mut selected = vec![true; rows.len()];
        for filter in &query.filters {
            for (field, term) in filter.terms() {
                let mut hit = vec![false; rows.len()];
                if let Some(dim) = cache.get(field, SortDirection::Asc) {
                    for i in dim.filter_exact(rows, term) {
                        hit[i] = true;
                    }
                }
                for (keep, matched) in selected.iter_mut().zip(hit) {
                    *keep &= matched;
                }
            }
        }
        let mut eligible: Vec<usize> = (0..rows.len()).filter(|&i| selected[i]).collect();

        let dims: Vec<_> = query
            .sort
            .iter()
            .filter_map(|spec| cache.get(spec.field(), spec.direction()))
            .collect();
        if !dims.is_empty() {
            // Ranks already encode direction; compare the last key first
            eligible.sort_by(|&a, &b| {
                dims.iter()
                    .rev()
                    .map(|d| d.rank(a).cmp(&d.rank(b)))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let eligible: Vec<&Value> = eligible.into_iter().map(|i| &rows[i]).collect();
        self.finish(&eligible, query)
    }

    fn finish(&self, eligible: &[&Value], query: &QueryState) -> QueryResult {
        let total = eligible.len();
        let range = query.page_range(total);
        debug!(
            total,
            offset = range.start,
            returned = range.len(),
            sort_keys = query.sort.len(),
            filters = query.filters.len(),
            "Query executed"
        );
        let page: Vec<Value> = eligible[range].iter().map(|row| (*row).clone()).collect();
        let result = QueryResult::new(page, total);
        if query.facets.is_empty() {
            result
        } else {
            result.with_facets(compute_facets(eligible, &query.facets, self.facet_size))
        }
    }
}

fn lookup_type(fields: &[Field], id: &str) -> Option<FieldType> {
    fields
        .iter()
        .find(|f| f.id == id)
        .and_then(|f| f.field_type)
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}
