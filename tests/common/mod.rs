//! In-memory fakes for the tabular store and the file store, plus fixture
//! helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sheetstock_api::errors::ServiceError;
use sheetstock_api::ledger::LedgerEngine;
use sheetstock_api::sheets::{FileStore, TabularStore};

/// One cell reference like `A`, `E2` or `AA7`: optional column letters,
/// optional 1-based row.
#[derive(Debug, Clone, Copy)]
struct CellRef {
    col: Option<usize>,
    row: Option<usize>,
}

fn parse_ref(s: &str) -> CellRef {
    let letters: String = s.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits: String = s.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();
    let col = if letters.is_empty() {
        None
    } else {
        let mut n = 0usize;
        for c in letters.chars() {
            n = n * 26 + (c as usize - 'A' as usize + 1);
        }
        Some(n - 1)
    };
    let row = digits.parse::<usize>().ok();
    CellRef { col, row }
}

fn parse_range(range: &str) -> (String, CellRef, Option<CellRef>) {
    let (sheet, rest) = range.split_once('!').expect("range must include sheet name");
    match rest.split_once(':') {
        Some((start, end)) => (sheet.to_string(), parse_ref(start), Some(parse_ref(end))),
        None => (sheet.to_string(), parse_ref(rest), None),
    }
}

/// In-memory spreadsheet: a dense grid per sheet, addressed with the same A1
/// labels the production client sends. Ranges listed in `fail_on_update`
/// error out, for exercising the partial-commit path.
#[derive(Default)]
pub struct FakeSheets {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    pub fail_on_update: Mutex<HashSet<String>>,
}

impl FakeSheets {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, sheet: &str, rows: &[&[&str]]) {
        let grid = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.sheets.lock().unwrap().insert(sheet.to_string(), grid);
    }

    pub fn fail_update(&self, range: &str) {
        self.fail_on_update
            .lock()
            .unwrap()
            .insert(range.to_string());
    }

    /// Cell content at a 1-based (row, zero-based col) position, empty when
    /// out of bounds.
    pub fn cell(&self, sheet: &str, row: usize, col: usize) -> String {
        self.sheets
            .lock()
            .unwrap()
            .get(sheet)
            .and_then(|grid| grid.get(row - 1))
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default()
    }

    /// Number of rows with any content in the given column window.
    pub fn rows_with_content(&self, sheet: &str, start_col: usize, width: usize) -> usize {
        self.sheets
            .lock()
            .unwrap()
            .get(sheet)
            .map(|grid| {
                grid.iter()
                    .filter(|row| {
                        row.iter()
                            .skip(start_col)
                            .take(width)
                            .any(|c| !c.trim().is_empty())
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    fn write_at(grid: &mut Vec<Vec<String>>, row0: usize, col0: usize, rows: &[Vec<String>]) {
        for (i, source) in rows.iter().enumerate() {
            while grid.len() <= row0 + i {
                grid.push(Vec::new());
            }
            let target = &mut grid[row0 + i];
            for (j, value) in source.iter().enumerate() {
                while target.len() <= col0 + j {
                    target.push(String::new());
                }
                target[col0 + j] = value.clone();
            }
        }
    }
}

#[async_trait]
impl TabularStore for FakeSheets {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, ServiceError> {
        let (sheet, start, end) = parse_range(range);
        let sheets = self.sheets.lock().unwrap();
        let grid = match sheets.get(&sheet) {
            Some(grid) => grid,
            None => return Ok(Vec::new()),
        };

        let start_col = start.col.unwrap_or(0);
        let end_col = end.and_then(|e| e.col).unwrap_or(start_col);
        let start_row = start.row.unwrap_or(1);
        let end_row = end
            .and_then(|e| e.row)
            .unwrap_or_else(|| grid.len().max(start_row));

        let mut rows: Vec<Vec<String>> = (start_row..=end_row)
            .map(|r| {
                let row = grid.get(r - 1).cloned().unwrap_or_default();
                (start_col..=end_col)
                    .map(|c| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        // The remote API omits trailing empty rows within the window.
        while rows
            .last()
            .map(|r: &Vec<String>| r.iter().all(|c| c.trim().is_empty()))
            .unwrap_or(false)
        {
            rows.pop();
        }
        Ok(rows)
    }

    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError> {
        let (sheet, start, _) = parse_range(range);
        let start_col = start.col.unwrap_or(0);
        let mut sheets = self.sheets.lock().unwrap();
        let grid = sheets.entry(sheet).or_default();
        let last_data_row = grid
            .iter()
            .rposition(|row| row.iter().any(|c| !c.trim().is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0);
        FakeSheets::write_at(grid, last_data_row, start_col, &rows);
        Ok(())
    }

    async fn update_range(&self, range: &str, rows: Vec<Vec<String>>) -> Result<(), ServiceError> {
        if self.fail_on_update.lock().unwrap().contains(range) {
            return Err(ServiceError::RemoteService(format!(
                "injected failure for {}",
                range
            )));
        }
        let (sheet, start, _) = parse_range(range);
        let row0 = start.row.expect("update requires a row") - 1;
        let col0 = start.col.unwrap_or(0);
        let mut sheets = self.sheets.lock().unwrap();
        let grid = sheets.entry(sheet).or_default();
        FakeSheets::write_at(grid, row0, col0, &rows);
        Ok(())
    }
}

/// File store fake: records uploads and hands back predictable links.
#[derive(Default)]
pub struct FakeFiles {
    pub uploads: Mutex<Vec<String>>,
    pub fail: Mutex<bool>,
}

impl FakeFiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let files = Self::default();
        *files.fail.lock().unwrap() = true;
        Arc::new(files)
    }
}

#[async_trait]
impl FileStore for FakeFiles {
    async fn upload(
        &self,
        file_name: &str,
        _mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, ServiceError> {
        if *self.fail.lock().unwrap() {
            return Err(ServiceError::UploadError("upload rejected".into()));
        }
        self.uploads.lock().unwrap().push(file_name.to_string());
        Ok(format!("https://files.example/{}", file_name))
    }
}

pub const INVENTORY_SHEET: &str = "Inventory";
pub const LOG_SHEET: &str = "Form Responses";

pub const INVENTORY_HEADER: &[&str] = &[
    "Location",
    "Item Code",
    "Description",
    "UOM",
    "Qty",
    "Condition",
    "Returnable Item",
    "Category",
    "Date Counted",
    "Image Link",
];

/// Inventory table with one row: X1 at W1, qty 10.
pub fn seed_single_item(store: &FakeSheets) {
    store.seed(
        INVENTORY_SHEET,
        &[
            INVENTORY_HEADER,
            &[
                "W1", "X1", "Hex bolt", "EA", "10", "Good", "No", "Hardware", "2026-08-01", "",
            ],
        ],
    );
    // Log sheet exists but holds no records yet
    store.seed(LOG_SHEET, &[&[]]);
}

pub fn engine(store: Arc<FakeSheets>, files: Arc<FakeFiles>) -> LedgerEngine {
    LedgerEngine::new(store, files, INVENTORY_SHEET, LOG_SHEET)
}
