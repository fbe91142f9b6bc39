//! Column bands of the transaction-log table.
//!
//! One physical table holds three logically independent sub-ledgers side by
//! side: issuances in A–J, receipts in K–S, no-code additions in T–AA. Each
//! band keeps its own header row, so insertion-row arithmetic is per band.
//! The table is pre-formatted (data validation, formulas) well past the last
//! written record, which is why new records go into the *first blank* row of
//! a band rather than blindly after the last fetched row.

use crate::ledger::columns::column_letter;

/// Descriptor for one column band of the log table. Header row positions are
/// configuration, not literals: the receipt band's header sits one row lower
/// than the others.
#[derive(Debug, Clone, Copy)]
pub struct LogBand {
    pub name: &'static str,
    /// Zero-based index of the band's first column
    pub start_col: usize,
    /// Number of columns the band occupies
    pub width: usize,
    /// 1-based physical row holding the band's header
    pub header_row: usize,
}

/// Issuance log, columns A–J.
pub const ISSUANCE_BAND: LogBand = LogBand {
    name: "issuance",
    start_col: 0,
    width: 10,
    header_row: 1,
};

/// Receipt log, columns K–S. Its header sits at physical row 2.
pub const RECEIPT_BAND: LogBand = LogBand {
    name: "receipt",
    start_col: 10,
    width: 9,
    header_row: 2,
};

/// No-code addition log, columns T–AA.
pub const NO_CODE_BAND: LogBand = LogBand {
    name: "no-code addition",
    start_col: 19,
    width: 8,
    header_row: 1,
};

impl LogBand {
    /// A1 range covering the band's data rows (everything below the header),
    /// e.g. `"Form Responses!A2:J"`.
    pub fn data_range(&self, sheet: &str) -> String {
        format!(
            "{}!{}{}:{}",
            sheet,
            column_letter(self.start_col),
            self.header_row + 1,
            column_letter(self.start_col + self.width - 1)
        )
    }

    /// A1 range addressing one physical row within the band,
    /// e.g. `"Form Responses!A7:J7"`.
    pub fn row_range(&self, sheet: &str, row: usize) -> String {
        format!(
            "{}!{}{}:{}{}",
            sheet,
            column_letter(self.start_col),
            row,
            column_letter(self.start_col + self.width - 1),
            row
        )
    }

    /// Pick the insertion row for a new record given the band's data rows as
    /// fetched from `data_range` (first fetched row is physical row
    /// `header_row + 1`).
    ///
    /// Returns the 1-based physical row of the first blank row, or the row
    /// immediately after the last fetched row when no blank row exists.
    pub fn find_insertion_row(&self, band_rows: &[Vec<String>]) -> usize {
        for (i, row) in band_rows.iter().enumerate() {
            if self.is_blank(row) {
                return self.header_row + 1 + i;
            }
        }
        self.header_row + 1 + band_rows.len()
    }

    /// A row is blank iff every cell among the band's first `width` positions
    /// is absent or whitespace-only.
    fn is_blank(&self, row: &[String]) -> bool {
        row.iter().take(self.width).all(|cell| cell.trim().is_empty())
    }
}
