use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use crossterm::style::Stylize;
use data_explorer::data::document::{Document, Field};
use data_explorer::data::query::FacetResult;
use data_explorer::data::transform::PreviewRow;
use data_explorer::data::value_compare::display_value;
use serde_json::Value;
use std::collections::BTreeMap;

fn header(labels: impl IntoIterator<Item = impl Into<String>>) -> Vec<Cell> {
    labels
        .into_iter()
        .map(|l| Cell::new(l.into()).add_attribute(Attribute::Bold))
        .collect()
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::Null) => "NULL".to_string(),
        Some(v) => display_value(v),
        None => String::new(),
    }
}

pub fn display_page(fields: &[Field], documents: &[Document], total: usize, offset: usize) {
    if documents.is_empty() {
        println!("{}", "No results found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(fields.iter().map(|f| f.label().to_string())));
    for doc in documents {
        table.add_row(fields.iter().map(|f| cell_text(doc.get(&f.id))));
    }

    println!("{table}");
    println!(
        "\n{}",
        format!(
            "Showing {} to {} of {}",
            offset + 1,
            offset + documents.len(),
            total
        )
        .green()
    );
}

pub fn display_facets(facets: &BTreeMap<String, FacetResult>) {
    for facet in facets.values() {
        let mut table = Table::new();
        table.set_header(header([facet.id.clone(), "count".to_string()]));
        for term in &facet.terms {
            table.add_row(vec![term.term.clone(), term.count.to_string()]);
        }
        if facet.missing > 0 {
            table.add_row(vec![
                Cell::new("(missing)").add_attribute(Attribute::Italic),
                Cell::new(facet.missing),
            ]);
        }
        println!("{table}");
    }
}

pub fn display_preview(rows: &[PreviewRow]) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header(["before", "after"]));
    for row in rows {
        let after = if row.before == row.after {
            Cell::new(&row.after)
        } else {
            Cell::new(&row.after).add_attribute(Attribute::Bold)
        };
        table.add_row(vec![Cell::new(&row.before), after]);
    }
    println!("{table}");
}
