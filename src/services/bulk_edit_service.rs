use crate::backend::BackendResult;
use crate::data::dataset::Dataset;
use crate::data::document::Document;
use crate::data::transform::{self, is_delete_marker, PreviewRow, TransformError, TransformFn};
use serde_json::Value;
use tracing::{info, warn};

/// What a bulk edit wrote back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkEditReport {
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Document id and error of each failed transform
    pub errors: Vec<(String, TransformError)>,
}

enum Change {
    Update(Document),
    Delete(Document),
}

/// Runs a transform over a dataset's current page
pub struct BulkEditService;

impl BulkEditService {
    /// Editor source for a column: the identity transform on that column
    pub fn column_template(field: &str) -> String {
        format!(
            "function(doc)\n  doc[{:?}] = doc[{:?}]\n  return doc\nend",
            field, field
        )
    }

    /// Before/after text for the current page, without writing anything
    pub fn preview(dataset: &Dataset, transform: &TransformFn, focus: Option<&str>) -> Vec<PreviewRow> {
        let docs = Self::page_rows(dataset);
        transform::preview(&docs, transform, focus)
    }

    /// Apply `transform` to the current page and write the outcome through
    /// the dataset's backend, then re-run the last query. A backend error
    /// stops the commit and is returned as is.
    pub async fn commit(dataset: &mut Dataset, transform: &TransformFn) -> BackendResult<BulkEditReport> {
        let originals = dataset.current_documents().to_vec();
        let rows = Self::page_rows(dataset);
        let result = transform::apply(&rows, transform);

        let mut report = BulkEditReport::default();
        let mut changes = Vec::new();
        for (index, (original, outcome)) in originals.iter().zip(&result.docs).enumerate() {
            match outcome {
                None => report.failed += 1,
                Some(doc) if is_delete_marker(doc) => changes.push(Change::Delete(original.clone())),
                Some(doc) if transform::same_value(doc, &rows[index]) => {}
                Some(Value::Object(attributes)) => {
                    changes.push(Change::Update(Document::new(original.id(), attributes.clone())))
                }
                Some(_) => {}
            }
        }
        for (index, err) in result.errors {
            if let Some(original) = originals.get(index) {
                warn!(id = original.id(), error = %err, "Skipping document");
                report.errors.push((original.id().to_string(), err));
            }
        }

        for change in changes {
            match change {
                Change::Update(doc) => {
                    dataset.save(&doc).await?;
                    report.updated += 1;
                }
                Change::Delete(doc) => {
                    dataset.destroy(&doc).await?;
                    report.deleted += 1;
                }
            }
        }

        info!(
            dataset = dataset.id(),
            updated = report.updated,
            deleted = report.deleted,
            failed = report.failed,
            "Bulk edit committed"
        );
        dataset.requery().await?;
        Ok(report)
    }

    fn page_rows(dataset: &Dataset) -> Vec<Value> {
        dataset
            .current_documents()
            .iter()
            .map(Document::to_json)
            .collect()
    }
}
