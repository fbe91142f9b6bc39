//! The ledger engine.
//!
//! Every operation runs the same sequence: validate input, locate the target
//! row in the inventory table, compute the quantity delta, write the
//! transaction record into its log band, then write the running quantity
//! cell. The two writes are independent remote calls; when the log write
//! lands but the quantity update fails, the tables diverge permanently and
//! the caller receives a `PartialCommit` error naming the divergence.

use std::sync::Arc;

use chrono::{Datelike, Local};
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::ledger::bands::{LogBand, ISSUANCE_BAND, NO_CODE_BAND, RECEIPT_BAND};
use crate::ledger::columns::{column_letter, ColumnIndexMap};
use crate::ledger::timestamp;
use crate::sheets::{FileStore, TabularStore};

/// Logical column names of the inventory table.
pub const COL_LOCATION: &str = "Location";
pub const COL_ITEM_CODE: &str = "Item Code";
pub const COL_DESCRIPTION: &str = "Description";
pub const COL_UOM: &str = "UOM";
pub const COL_QTY: &str = "Qty";
pub const COL_CONDITION: &str = "Condition";
pub const COL_RETURNABLE: &str = "Returnable Item";
pub const COL_CATEGORY: &str = "Category";
pub const COL_DATE_COUNTED: &str = "Date Counted";
pub const COL_IMAGE_LINK: &str = "Image Link";

/// Fields of a new inventory row as submitted by the client. Field names
/// match the table's column headers.
#[derive(Debug, Clone, serde::Deserialize, ToSchema)]
pub struct NewInventoryEntry {
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Item Code")]
    pub item_code: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "UOM")]
    pub uom: String,
    #[serde(rename = "Qty")]
    #[schema(value_type = Object)]
    pub qty: Value,
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "Returnable Item")]
    pub returnable_item: String,
    #[serde(rename = "Category")]
    pub category: String,
}

/// An image received from the client, ready for the file store.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct IssueCommand {
    pub item_code: String,
    pub issuance_qty: Value,
    pub issued_by: String,
    pub activity: String,
    pub notes: Option<String>,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct ReceiveCommand {
    pub item_code: String,
    pub receipt_qty: Value,
    pub received_by: String,
    pub notes: Option<String>,
    pub location: String,
}

#[derive(Debug, Clone)]
pub struct AddNewItemCommand {
    pub receipt_qty: Value,
    pub location: String,
    pub description: String,
    pub returnable_item: String,
    pub received_by: String,
    pub notes: Option<String>,
    pub image: Option<UploadedImage>,
}

/// One appended transaction-log row, echoed back to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,
    pub quantity_delta: f64,
    pub location: String,
    pub description: String,
    pub returnable_item: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    pub notes: String,
    pub image_link: String,
}

/// Outcome of an issue/receive movement: the log row that was written plus
/// the quantity cell's new value.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovementReceipt {
    pub transaction: TransactionRecord,
    pub new_qty: f64,
    /// Physical row of the log table the record landed in
    pub log_row: usize,
}

/// Outcome of a no-code addition: the log row only, since no inventory row
/// exists to key a quantity against.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdditionReceipt {
    pub transaction: TransactionRecord,
    pub log_row: usize,
}

struct LocatedRow {
    /// 1-based physical row in the inventory table
    row_number: usize,
    current_qty: f64,
    description: String,
    returnable_item: String,
    qty_col: usize,
}

/// Parse a requested quantity from either a JSON number or a numeric string;
/// it must be a positive finite number.
fn parse_positive_qty(value: &Value, field: &str) -> Result<f64, ServiceError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(qty) if qty.is_finite() && qty > 0.0 => Ok(qty),
        _ => Err(ServiceError::ValidationError(format!(
            "{} must be a positive number",
            field
        ))),
    }
}

/// String form for a quantity cell. Whole numbers are written without a
/// fractional part so the sheet shows `6`, not `6.0`.
fn format_qty(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Coordinates reads and the paired log/quantity writes against the two
/// backing tables. Holds the injected store clients for the process
/// lifetime; no other state survives between requests.
pub struct LedgerEngine {
    store: Arc<dyn TabularStore>,
    files: Arc<dyn FileStore>,
    inventory_sheet: String,
    log_sheet: String,
}

impl LedgerEngine {
    pub fn new(
        store: Arc<dyn TabularStore>,
        files: Arc<dyn FileStore>,
        inventory_sheet: impl Into<String>,
        log_sheet: impl Into<String>,
    ) -> Self {
        Self {
            store,
            files,
            inventory_sheet: inventory_sheet.into(),
            log_sheet: log_sheet.into(),
        }
    }

    fn inventory_range(&self) -> String {
        format!("{}!A:J", self.inventory_sheet)
    }

    /// Issue stock against an existing `(itemCode, location)` row. Rejects
    /// the request when the requested quantity exceeds current stock.
    #[instrument(skip(self, cmd), fields(item_code = %cmd.item_code, location = %cmd.location))]
    pub async fn issue(&self, cmd: IssueCommand) -> Result<MovementReceipt, ServiceError> {
        let qty = parse_positive_qty(&cmd.issuance_qty, "issuanceQty")?;
        let table = self.read_inventory().await?;
        let cols = self.resolve_inventory_columns(&table)?;
        let located = self.locate(&table, &cols, &cmd.item_code, &cmd.location)?;

        if located.current_qty < qty {
            return Err(ServiceError::InsufficientStock(format!(
                "requested {}, only {} available for {} at {}",
                format_qty(qty),
                format_qty(located.current_qty),
                cmd.item_code,
                cmd.location
            )));
        }
        let new_qty = located.current_qty - qty;

        let record = TransactionRecord {
            timestamp: timestamp::now_string(),
            item_code: Some(cmd.item_code),
            quantity_delta: qty,
            location: cmd.location,
            description: located.description.clone(),
            returnable_item: located.returnable_item.clone(),
            actor: cmd.issued_by,
            activity: Some(cmd.activity),
            notes: cmd.notes.unwrap_or_default(),
            image_link: String::new(),
        };
        let cells = vec![
            record.timestamp.clone(),
            record.item_code.clone().unwrap_or_default(),
            format_qty(record.quantity_delta),
            record.location.clone(),
            record.description.clone(),
            record.returnable_item.clone(),
            record.actor.clone(),
            record.activity.clone().unwrap_or_default(),
            record.notes.clone(),
            record.image_link.clone(),
        ];

        let log_row = self.write_log_row(&ISSUANCE_BAND, cells).await?;
        self.write_quantity(&located, new_qty, &ISSUANCE_BAND, log_row)
            .await?;

        Ok(MovementReceipt {
            transaction: record,
            new_qty,
            log_row,
        })
    }

    /// Receive stock into an existing `(itemCode, location)` row. No upper
    /// bound applies.
    #[instrument(skip(self, cmd), fields(item_code = %cmd.item_code, location = %cmd.location))]
    pub async fn receive(&self, cmd: ReceiveCommand) -> Result<MovementReceipt, ServiceError> {
        let qty = parse_positive_qty(&cmd.receipt_qty, "receiptQty")?;
        let table = self.read_inventory().await?;
        let cols = self.resolve_inventory_columns(&table)?;
        let located = self.locate(&table, &cols, &cmd.item_code, &cmd.location)?;

        let new_qty = located.current_qty + qty;

        let record = TransactionRecord {
            timestamp: timestamp::now_string(),
            item_code: Some(cmd.item_code),
            quantity_delta: qty,
            location: cmd.location,
            description: located.description.clone(),
            returnable_item: located.returnable_item.clone(),
            actor: cmd.received_by,
            activity: None,
            notes: cmd.notes.unwrap_or_default(),
            image_link: String::new(),
        };
        let cells = vec![
            record.timestamp.clone(),
            record.item_code.clone().unwrap_or_default(),
            format_qty(record.quantity_delta),
            record.location.clone(),
            record.description.clone(),
            record.returnable_item.clone(),
            record.actor.clone(),
            record.notes.clone(),
            record.image_link.clone(),
        ];

        let log_row = self.write_log_row(&RECEIPT_BAND, cells).await?;
        self.write_quantity(&located, new_qty, &RECEIPT_BAND, log_row)
            .await?;

        Ok(MovementReceipt {
            transaction: record,
            new_qty,
            log_row,
        })
    }

    /// Case-insensitive substring search over every cell of the inventory
    /// table, projecting matches into header-keyed objects. An absent table
    /// is `NotFound`, never an empty success.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        keyword: &str,
    ) -> Result<Vec<serde_json::Map<String, Value>>, ServiceError> {
        let table = self.store.read_range(&self.inventory_range()).await?;
        if table.is_empty() {
            return Err(ServiceError::NotFound("no inventory data found".into()));
        }

        let header = &table[0];
        let needle = keyword.to_lowercase();
        let results = table[1..]
            .iter()
            .filter(|row| {
                row.iter()
                    .any(|cell| cell.to_lowercase().contains(&needle))
            })
            .map(|row| {
                header
                    .iter()
                    .enumerate()
                    .map(|(i, name)| (name.clone(), Value::String(cell(row, i).to_string())))
                    .collect()
            })
            .collect();
        Ok(results)
    }

    /// Insert a brand-new inventory row: upload the image, then append the
    /// entry (plus today's date and the image link) to the inventory table.
    /// No lookup, no quantity validation. An uploaded file orphaned by a
    /// later append failure stays in the file store.
    #[instrument(skip(self, entry, image), fields(item_code = %entry.item_code))]
    pub async fn add_with_image(
        &self,
        entry: NewInventoryEntry,
        image: UploadedImage,
    ) -> Result<serde_json::Map<String, Value>, ServiceError> {
        let link = self
            .files
            .upload(&image.file_name, &image.content_type, image.bytes)
            .await?;

        // An empty inventory sheet here is a missing header row, which is
        // server-side drift rather than a lookup miss.
        let table = self.store.read_range(&self.inventory_range()).await?;
        let header = table.first().ok_or_else(|| {
            ServiceError::SchemaError(format!(
                "{} table has no header row",
                self.inventory_sheet
            ))
        })?;
        let cols = ColumnIndexMap::resolve(
            header,
            &[
                COL_LOCATION,
                COL_ITEM_CODE,
                COL_DESCRIPTION,
                COL_UOM,
                COL_QTY,
                COL_CONDITION,
                COL_RETURNABLE,
                COL_CATEGORY,
                COL_DATE_COUNTED,
                COL_IMAGE_LINK,
            ],
        )?;

        let today = {
            let now = Local::now();
            format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day())
        };
        let qty_text = match &entry.qty {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut row = vec![String::new(); header.len()];
        row[cols.index_of(COL_LOCATION)?] = entry.location.clone();
        row[cols.index_of(COL_ITEM_CODE)?] = entry.item_code.clone();
        row[cols.index_of(COL_DESCRIPTION)?] = entry.description.clone();
        row[cols.index_of(COL_UOM)?] = entry.uom.clone();
        row[cols.index_of(COL_QTY)?] = qty_text.clone();
        row[cols.index_of(COL_CONDITION)?] = entry.condition.clone();
        row[cols.index_of(COL_RETURNABLE)?] = entry.returnable_item.clone();
        row[cols.index_of(COL_CATEGORY)?] = entry.category.clone();
        row[cols.index_of(COL_DATE_COUNTED)?] = today.clone();
        row[cols.index_of(COL_IMAGE_LINK)?] = link.clone();

        self.store
            .append_rows(&self.inventory_range(), vec![row])
            .await?;

        let mut stored = serde_json::Map::new();
        stored.insert(COL_LOCATION.into(), Value::String(entry.location));
        stored.insert(COL_ITEM_CODE.into(), Value::String(entry.item_code));
        stored.insert(COL_DESCRIPTION.into(), Value::String(entry.description));
        stored.insert(COL_UOM.into(), Value::String(entry.uom));
        stored.insert(COL_QTY.into(), Value::String(qty_text));
        stored.insert(COL_CONDITION.into(), Value::String(entry.condition));
        stored.insert(COL_RETURNABLE.into(), Value::String(entry.returnable_item));
        stored.insert(COL_CATEGORY.into(), Value::String(entry.category));
        stored.insert(COL_DATE_COUNTED.into(), Value::String(today));
        stored.insert(COL_IMAGE_LINK.into(), Value::String(link));
        Ok(stored)
    }

    /// Record the arrival of an item that has no code yet. Writes only the
    /// no-code log band; the inventory table is untouched because there is
    /// nothing to key a quantity cell against.
    #[instrument(skip(self, cmd), fields(location = %cmd.location))]
    pub async fn add_new_item_without_code(
        &self,
        cmd: AddNewItemCommand,
    ) -> Result<AdditionReceipt, ServiceError> {
        let qty = parse_positive_qty(&cmd.receipt_qty, "receiptQty")?;

        let link = match cmd.image {
            Some(image) => {
                self.files
                    .upload(&image.file_name, &image.content_type, image.bytes)
                    .await?
            }
            None => String::new(),
        };

        let record = TransactionRecord {
            timestamp: timestamp::now_string(),
            item_code: None,
            quantity_delta: qty,
            location: cmd.location,
            description: cmd.description,
            returnable_item: cmd.returnable_item,
            actor: cmd.received_by,
            activity: None,
            notes: cmd.notes.unwrap_or_default(),
            image_link: link,
        };
        let cells = vec![
            record.timestamp.clone(),
            format_qty(record.quantity_delta),
            record.location.clone(),
            record.description.clone(),
            record.returnable_item.clone(),
            record.actor.clone(),
            record.notes.clone(),
            record.image_link.clone(),
        ];

        let log_row = self.write_log_row(&NO_CODE_BAND, cells).await?;
        Ok(AdditionReceipt {
            transaction: record,
            log_row,
        })
    }

    async fn read_inventory(&self) -> Result<Vec<Vec<String>>, ServiceError> {
        let table = self.store.read_range(&self.inventory_range()).await?;
        if table.is_empty() {
            return Err(ServiceError::NotFound("no inventory data found".into()));
        }
        Ok(table)
    }

    fn resolve_inventory_columns(
        &self,
        table: &[Vec<String>],
    ) -> Result<ColumnIndexMap, ServiceError> {
        ColumnIndexMap::resolve(
            &table[0],
            &[
                COL_LOCATION,
                COL_ITEM_CODE,
                COL_DESCRIPTION,
                COL_QTY,
                COL_RETURNABLE,
            ],
        )
    }

    /// Find the first `(itemCode, location)` match in the inventory table.
    /// Lookup is first-match-wins; duplicate keys further down are shadowed,
    /// which the table is not supposed to contain, so a duplicate gets a
    /// warning.
    fn locate(
        &self,
        table: &[Vec<String>],
        cols: &ColumnIndexMap,
        item_code: &str,
        location: &str,
    ) -> Result<LocatedRow, ServiceError> {
        let code_col = cols.index_of(COL_ITEM_CODE)?;
        let loc_col = cols.index_of(COL_LOCATION)?;
        let qty_col = cols.index_of(COL_QTY)?;
        let desc_col = cols.index_of(COL_DESCRIPTION)?;
        let ret_col = cols.index_of(COL_RETURNABLE)?;

        let mut found: Option<LocatedRow> = None;
        for (i, row) in table.iter().enumerate().skip(1) {
            if cell(row, code_col).trim() != item_code || cell(row, loc_col).trim() != location {
                continue;
            }
            if found.is_some() {
                warn!(
                    item_code,
                    location,
                    shadowed_row = i + 1,
                    "duplicate (itemCode, location) row shadowed by first match"
                );
                break;
            }
            found = Some(LocatedRow {
                row_number: i + 1,
                current_qty: cell(row, qty_col).trim().parse::<f64>().unwrap_or(0.0),
                description: cell(row, desc_col).to_string(),
                returnable_item: cell(row, ret_col).to_string(),
                qty_col,
            });
        }

        found.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "item {} at location {} not found",
                item_code, location
            ))
        })
    }

    /// Write a record into the first blank row of its band, returning the
    /// physical row it landed in.
    async fn write_log_row(
        &self,
        band: &LogBand,
        cells: Vec<String>,
    ) -> Result<usize, ServiceError> {
        let band_rows = self.store.read_range(&band.data_range(&self.log_sheet)).await?;
        let row = band.find_insertion_row(&band_rows);
        self.store
            .update_range(&band.row_range(&self.log_sheet, row), vec![cells])
            .await?;
        Ok(row)
    }

    /// Second write of the movement saga. A failure here leaves the log and
    /// the running quantity diverged with no compensating action.
    async fn write_quantity(
        &self,
        located: &LocatedRow,
        new_qty: f64,
        band: &LogBand,
        log_row: usize,
    ) -> Result<(), ServiceError> {
        let qty_cell = format!(
            "{}!{}{}",
            self.inventory_sheet,
            column_letter(located.qty_col),
            located.row_number
        );
        self.store
            .update_range(&qty_cell, vec![vec![format_qty(new_qty)]])
            .await
            .map_err(|e| {
                ServiceError::PartialCommit(format!(
                    "transaction logged in the {} band at row {} but the quantity update for {} failed: {}",
                    band.name, log_row, qty_cell, e
                ))
            })
    }
}
