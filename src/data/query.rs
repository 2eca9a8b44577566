//! Query request and response shapes
//!
//! These serialize to the JSON the view layer exchanges with the core:
//!
//! ```json
//! {"size": 10, "offset": 0,
//!  "sort": [["price", "desc"]],
//!  "filters": [{"term": {"country": "UK"}}],
//!  "facets": {"by_country": {"terms": {"field": "country"}}}}
//! ```

use crate::data::document::{Document, FieldType};
use crate::data::value_compare::term_matches;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key, serialized as `[fieldId, "asc"|"desc"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec(pub String, pub SortDirection);

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self(field.into(), SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self(field.into(), SortDirection::Desc)
    }

    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn direction(&self) -> SortDirection {
        self.1
    }
}

/// Filter term, serialized as `{"term": {fieldId: value}}`.
/// Every entry of the term must match (AND).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    Term(BTreeMap<String, Value>),
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut term = BTreeMap::new();
        term.insert(field.into(), value.into());
        Filter::Term(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&String, &Value)> {
        match self {
            Filter::Term(term) => term.iter(),
        }
    }

    /// Check a raw row against this filter; `field_type` resolves column types
    pub fn matches<F>(&self, row: &Value, field_type: F) -> bool
    where
        F: Fn(&str) -> Option<FieldType>,
    {
        self.terms()
            .all(|(field, term)| term_matches(row.get(field), term, field_type(field)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsFacet {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// Facet request, serialized as `{"terms": {"field": fieldId}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRequest {
    pub terms: TermsFacet,
}

impl FacetRequest {
    pub fn terms(field: impl Into<String>) -> Self {
        Self {
            terms: TermsFacet {
                field: field.into(),
                size: None,
            },
        }
    }

    pub fn field(&self) -> &str {
        &self.terms.field
    }
}

/// Everything needed to re-issue one read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryState {
    pub size: usize,
    pub offset: usize,
    pub sort: Vec<SortSpec>,
    pub filters: Vec<Filter>,
    pub facets: BTreeMap<String, FacetRequest>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            size: DEFAULT_PAGE_SIZE,
            offset: 0,
            sort: Vec::new(),
            filters: Vec::new(),
            facets: BTreeMap::new(),
        }
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortSpec(field.into(), direction));
        self
    }

    pub fn filter_term(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::term(field, value));
        self
    }

    pub fn facet(mut self, id: impl Into<String>, field: impl Into<String>) -> Self {
        self.facets.insert(id.into(), FacetRequest::terms(field));
        self
    }

    /// Index range of the requested page within `total` eligible rows
    pub fn page_range(&self, total: usize) -> Range<usize> {
        let start = self.offset.min(total);
        let end = self.offset.saturating_add(self.size).min(total);
        start..end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Distribution of values of one field over a document set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetResult {
    pub id: String,
    pub terms: Vec<TermCount>,
    pub missing: usize,
}

impl FacetResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            terms: Vec::new(),
            missing: 0,
        }
    }

    pub fn count_for(&self, term: &str) -> Option<usize> {
        self.terms.iter().find(|t| t.term == term).map(|t| t.count)
    }
}

/// What a backend hands back for one query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Value>,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<BTreeMap<String, FacetResult>>,
}

impl QueryResult {
    pub fn new(rows: Vec<Value>, total: usize) -> Self {
        Self {
            rows,
            total,
            facets: None,
        }
    }

    pub fn with_facets(mut self, facets: BTreeMap<String, FacetResult>) -> Self {
        self.facets = Some(facets);
        self
    }
}

/// What the dataset hands to the view layer
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub total: usize,
    pub documents: Vec<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facets: Option<BTreeMap<String, FacetResult>>,
}
