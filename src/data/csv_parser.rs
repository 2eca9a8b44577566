//! Permissive CSV parser
//!
//! Never rejects input: unbalanced quotes and stray characters simply become
//! field content. Rows end on CR, LF or CRLF; a final line terminator does
//! not produce an empty trailing row. Cells are always strings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field separator
    pub separator: char,
    /// Quote character
    pub delimiter: char,
    /// Strip surrounding whitespace from unquoted fields
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            delimiter: '"',
            trim: false,
        }
    }
}

impl CsvOptions {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteClosed,
}

struct RowBuilder {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    field: String,
    quoted: bool,
    trim: bool,
}

impl RowBuilder {
    fn end_field(&mut self) {
        let raw = std::mem::take(&mut self.field);
        let value = if self.trim && !self.quoted {
            raw.trim().to_string()
        } else {
            raw
        };
        self.row.push(value);
        self.quoted = false;
    }

    fn end_row(&mut self) {
        self.end_field();
        self.rows.push(std::mem::take(&mut self.row));
    }
}

/// Split raw text into rows of raw string cells
pub fn parse_csv(text: &str, options: &CsvOptions) -> Vec<Vec<String>> {
    let CsvOptions {
        separator,
        delimiter,
        trim,
    } = *options;
    let mut out = RowBuilder {
        rows: Vec::new(),
        row: Vec::new(),
        field: String::new(),
        quoted: false,
        trim,
    };
    let mut state = State::FieldStart;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\r' || c == '\n' {
            if state == State::Quoted {
                out.field.push(c);
                continue;
            }
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.end_row();
            state = State::FieldStart;
            continue;
        }

        match state {
            State::FieldStart => {
                if c == delimiter {
                    // leading blanks before a quote are dropped when trimming
                    out.field.clear();
                    out.quoted = true;
                    state = State::Quoted;
                } else if c == separator {
                    out.end_field();
                } else {
                    out.field.push(c);
                    if !(trim && c.is_whitespace()) {
                        state = State::Unquoted;
                    }
                }
            }
            State::Unquoted => {
                if c == separator {
                    out.end_field();
                    state = State::FieldStart;
                } else {
                    out.field.push(c);
                }
            }
            State::Quoted => {
                if c == delimiter {
                    if chars.peek() == Some(&delimiter) {
                        chars.next();
                        out.field.push(delimiter);
                    } else {
                        state = State::QuoteClosed;
                    }
                } else {
                    out.field.push(c);
                }
            }
            State::QuoteClosed => {
                if c == separator {
                    out.end_field();
                    state = State::FieldStart;
                } else if !(trim && c.is_whitespace()) {
                    out.field.push(c);
                }
            }
        }
    }

    if state != State::FieldStart || !out.row.is_empty() || !out.field.is_empty() {
        out.end_row();
    }
    out.rows
}

/// Rows of a CSV file whose first row names the columns
#[derive(Debug, Clone, PartialEq)]
pub struct CsvDocuments {
    pub headers: Vec<String>,
    pub rows: Vec<Value>,
}

/// Parse with the first row as header. Each later row becomes an object
/// keyed by header name; cells beyond the header width are ignored.
pub fn parse_csv_documents(text: &str, options: &CsvOptions) -> CsvDocuments {
    let mut rows = parse_csv(text, options).into_iter();
    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .map(|cells| {
            let object: Map<String, Value> = headers
                .iter()
                .zip(cells)
                .map(|(header, cell)| (header.clone(), Value::String(cell)))
                .collect();
            Value::Object(object)
        })
        .collect();
    CsvDocuments { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_line_endings() {
        let expected = strings(&[&["a", "b"], &["c", "d"], &["e", "f"]]);
        let options = CsvOptions::default();
        assert_eq!(parse_csv("a,b\nc,d\ne,f", &options), expected);
        assert_eq!(parse_csv("a,b\r\nc,d\r\ne,f\r\n", &options), expected);
        assert_eq!(parse_csv("a,b\rc,d\re,f\r", &options), expected);
    }

    #[test]
    fn test_quoted_line_break_and_separator() {
        let rows = parse_csv("\"a\nb\",\"c,d\"\n", &CsvOptions::default());
        assert_eq!(rows, strings(&[&["a\nb", "c,d"]]));
    }

    #[test]
    fn test_empty_fields() {
        let rows = parse_csv("a,,\n,b\n", &CsvOptions::default());
        assert_eq!(rows, strings(&[&["a", "", ""], &["", "b"]]));
        assert!(parse_csv("", &CsvOptions::default()).is_empty());
    }

    #[test]
    fn test_interior_blank_line() {
        let rows = parse_csv("a\n\nb\n", &CsvOptions::default());
        assert_eq!(rows, strings(&[&["a"], &[""], &["b"]]));
    }

    #[test]
    fn test_trim_keeps_quoted_whitespace() {
        let options = CsvOptions::default().with_trim(true);
        let rows = parse_csv("  x  , \" y \" ,z\n", &options);
        assert_eq!(rows, strings(&[&["x", " y ", "z"]]));

        let untrimmed = parse_csv("  x  ,z\n", &CsvOptions::default());
        assert_eq!(untrimmed, strings(&[&["  x  ", "z"]]));
    }

    #[test]
    fn test_permissive_input() {
        let options = CsvOptions::default();
        // unterminated quote runs to end of input
        assert_eq!(parse_csv("\"abc,def", &options), strings(&[&["abc,def"]]));
        // quote in the middle of an unquoted field is literal
        assert_eq!(parse_csv("ab\"c,d", &options), strings(&[&["ab\"c", "d"]]));
        // text after a closing quote is kept
        assert_eq!(parse_csv("\"ab\"c,d", &options), strings(&[&["abc", "d"]]));
    }

    #[test]
    fn test_header_mapping_ignores_extra_cells() {
        let docs = parse_csv_documents("a,b\n1,2,3\n4\n", &CsvOptions::default());
        assert_eq!(docs.headers, vec!["a", "b"]);
        assert_eq!(docs.rows[0], serde_json::json!({"a": "1", "b": "2"}));
        assert_eq!(docs.rows[1], serde_json::json!({"a": "4"}));
    }
}
