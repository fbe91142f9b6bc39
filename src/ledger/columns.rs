//! Header-row column resolution for the spreadsheet-backed tables.
//!
//! Column positions are never assumed: every operation re-reads the header
//! row and resolves the logical field names it needs against it, so the
//! service tolerates column reordering between requests at the cost of one
//! extra read. A missing header means the backing table's structure has
//! drifted and is surfaced as a `SchemaError`, not a client error.

use std::collections::HashMap;

use crate::errors::ServiceError;

/// Mapping from logical field name to zero-based physical column index,
/// derived fresh from a table's header row on every operation.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndexMap {
    indices: HashMap<String, usize>,
}

impl ColumnIndexMap {
    /// Resolve each of `required` against `header_row` by exact,
    /// case-sensitive match.
    pub fn resolve(header_row: &[String], required: &[&str]) -> Result<Self, ServiceError> {
        let mut indices = HashMap::with_capacity(required.len());
        for name in required {
            match header_row.iter().position(|cell| cell == name) {
                Some(idx) => {
                    indices.insert((*name).to_string(), idx);
                }
                None => {
                    return Err(ServiceError::SchemaError(format!(
                        "required column '{}' not found in header row",
                        name
                    )));
                }
            }
        }
        Ok(Self { indices })
    }

    /// Index of a previously resolved column. Asking for a name that was not
    /// in the required set is a programming error surfaced as `SchemaError`.
    pub fn index_of(&self, name: &str) -> Result<usize, ServiceError> {
        self.indices.get(name).copied().ok_or_else(|| {
            ServiceError::SchemaError(format!("column '{}' was not resolved", name))
        })
    }
}

/// Spreadsheet-style column label for a zero-based index, bijective base-26:
/// 0 → "A", 25 → "Z", 26 → "AA".
pub fn column_letter(index: usize) -> String {
    let mut n = index as i64;
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (n % 26) as u8);
        n = n / 26 - 1;
        if n < 0 {
            break;
        }
    }
    letters.reverse();
    // Only ASCII uppercase bytes are ever pushed
    String::from_utf8(letters).unwrap_or_default()
}
