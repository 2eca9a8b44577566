//! Terms facets over a document set

use crate::data::query::{FacetRequest, FacetResult, TermCount};
use crate::data::value_compare::{display_value, is_missing};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_FACET_SIZE: usize = 10;

/// Count the values of one field. Terms come back sorted by count
/// descending, ties in first-seen order, truncated to `size`.
pub fn compute_facet<'a, I>(id: &str, field: &str, rows: I, size: usize) -> FacetResult
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut result = FacetResult::new(id);
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<TermCount> = Vec::new();

    for row in rows {
        let cell = row.get(field);
        if is_missing(cell) {
            result.missing += 1;
            continue;
        }
        let term = cell.map(display_value).unwrap_or_default();
        match position.get(&term) {
            Some(&i) => counts[i].count += 1,
            None => {
                position.insert(term.clone(), counts.len());
                counts.push(TermCount { term, count: 1 });
            }
        }
    }

    // sort_by is stable, so equal counts keep first-seen order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(size);
    result.terms = counts;
    result
}

/// Compute every requested facet over `rows`
pub fn compute_facets(
    rows: &[&Value],
    requests: &BTreeMap<String, FacetRequest>,
    default_size: usize,
) -> BTreeMap<String, FacetResult> {
    requests
        .iter()
        .map(|(id, request)| {
            let size = request.terms.size.unwrap_or(default_size);
            let facet = compute_facet(id, request.field(), rows.iter().copied(), size);
            (id.clone(), facet)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_counts_sum_to_total() {
        let rows = vec![
            json!({"country": "UK"}),
            json!({"country": "US"}),
            json!({"country": "UK"}),
            json!({"other": 1}),
            json!({"country": ""}),
        ];
        let facet = compute_facet("c", "country", &rows, DEFAULT_FACET_SIZE);
        assert_eq!(facet.count_for("UK"), Some(2));
        assert_eq!(facet.count_for("US"), Some(1));
        assert_eq!(facet.missing, 2);
        let sum: usize = facet.terms.iter().map(|t| t.count).sum();
        assert_eq!(sum + facet.missing, rows.len());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let rows: Vec<Value> = ["b", "a", "c", "a", "b"]
            .iter()
            .map(|v| json!({ "f": v }))
            .collect();
        let facet = compute_facet("f", "f", &rows, DEFAULT_FACET_SIZE);
        let terms: Vec<_> = facet.terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_truncates_to_top_terms() {
        let rows: Vec<Value> = (0..25).map(|i| json!({ "n": i % 15 })).collect();
        let facet = compute_facet("n", "n", &rows, DEFAULT_FACET_SIZE);
        assert_eq!(facet.terms.len(), 10);
        assert!(facet.terms.windows(2).all(|w| w[0].count >= w[1].count));
        // numbers are counted by their text
        assert_eq!(facet.count_for("0"), Some(2));
    }

    #[test]
    fn test_requested_size_overrides_default() {
        let rows: Vec<Value> = (0..5).map(|i| json!({ "n": i })).collect();
        let refs: Vec<&Value> = rows.iter().collect();
        let mut requests = BTreeMap::new();
        let mut request = FacetRequest::terms("n");
        request.terms.size = Some(2);
        requests.insert("small".to_string(), request);
        let facets = compute_facets(&refs, &requests, DEFAULT_FACET_SIZE);
        assert_eq!(facets["small"].terms.len(), 2);
        assert_eq!(facets["small"].id, "small");
    }
}
