//! Ledger engine scenarios against the in-memory store fakes.

mod common;

use assert_matches::assert_matches;
use serde_json::json;

use common::{engine, seed_single_item, FakeFiles, FakeSheets, INVENTORY_HEADER, INVENTORY_SHEET, LOG_SHEET};
use sheetstock_api::errors::ServiceError;
use sheetstock_api::ledger::engine::{
    AddNewItemCommand, IssueCommand, NewInventoryEntry, ReceiveCommand, UploadedImage,
};

fn issue_cmd(qty: serde_json::Value) -> IssueCommand {
    IssueCommand {
        item_code: "X1".into(),
        issuance_qty: qty,
        issued_by: "alice".into(),
        activity: "maintenance".into(),
        notes: Some("routine".into()),
        location: "W1".into(),
    }
}

fn receive_cmd(qty: serde_json::Value) -> ReceiveCommand {
    ReceiveCommand {
        item_code: "X1".into(),
        receipt_qty: qty,
        received_by: "bob".into(),
        notes: None,
        location: "W1".into(),
    }
}

#[tokio::test]
async fn issue_decrements_quantity_and_appends_one_log_row() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.issue(issue_cmd(json!(4))).await.unwrap();

    assert_eq!(receipt.new_qty, 6.0);
    assert_eq!(receipt.transaction.quantity_delta, 4.0);
    assert_eq!(receipt.log_row, 2);

    // Quantity cell (Inventory row 2, column E) was rewritten
    assert_eq!(store.cell(INVENTORY_SHEET, 2, 4), "6");
    // Exactly one record landed in the issuance band
    assert_eq!(store.rows_with_content(LOG_SHEET, 0, 10), 1);
    assert_eq!(store.cell(LOG_SHEET, 2, 1), "X1");
    assert_eq!(store.cell(LOG_SHEET, 2, 2), "4");
    assert_eq!(store.cell(LOG_SHEET, 2, 6), "alice");
    assert_eq!(store.cell(LOG_SHEET, 2, 7), "maintenance");
}

#[tokio::test]
async fn issue_beyond_stock_is_rejected_with_no_writes() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let err = ledger.issue(issue_cmd(json!(20))).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // Neither the log band nor the quantity cell was touched
    assert_eq!(store.cell(INVENTORY_SHEET, 2, 4), "10");
    assert_eq!(store.rows_with_content(LOG_SHEET, 0, 10), 0);
}

#[tokio::test]
async fn issue_accepts_string_quantities() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.issue(issue_cmd(json!("3"))).await.unwrap();
    assert_eq!(receipt.new_qty, 7.0);
}

#[tokio::test]
async fn issue_rejects_non_numeric_and_non_positive_quantities() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    for bad in [json!("abc"), json!(0), json!(-2)] {
        let err = ledger.issue(issue_cmd(bad)).await.unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn issue_unknown_item_is_not_found() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let mut cmd = issue_cmd(json!(1));
    cmd.item_code = "X9".into();
    let err = ledger.issue(cmd).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn issue_reuses_first_blank_band_row() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    // Band rows at physical rows 2 and 3 are taken, row 4 is blank, row 5 is
    // taken again (pre-formatted sheet with a hole)
    store.seed(
        LOG_SHEET,
        &[
            &["Issued At", "Item"],
            &["2026-01-02, 9:15:00 AM", "A1"],
            &["2026-01-02, 9:20:00 AM", "A2"],
            &["", ""],
            &["2026-01-03, 1:05:11 PM", "A3"],
        ],
    );
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.issue(issue_cmd(json!(1))).await.unwrap();
    assert_eq!(receipt.log_row, 4);
    assert_eq!(store.cell(LOG_SHEET, 4, 1), "X1");
    // The later record was not disturbed
    assert_eq!(store.cell(LOG_SHEET, 5, 1), "A3");
}

#[tokio::test]
async fn issue_appends_when_band_has_no_blank_row() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    store.seed(
        LOG_SHEET,
        &[
            &["Issued At", "Item"],
            &["2026-01-02, 9:15:00 AM", "A1"],
            &["2026-01-02, 9:20:00 AM", "A2"],
        ],
    );
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.issue(issue_cmd(json!(1))).await.unwrap();
    assert_eq!(receipt.log_row, 4);
}

#[tokio::test]
async fn failed_quantity_write_reports_partial_commit() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    store.fail_update("Inventory!E2");
    let ledger = engine(store.clone(), FakeFiles::new());

    let err = ledger.issue(issue_cmd(json!(4))).await.unwrap_err();
    assert_matches!(err, ServiceError::PartialCommit(_));

    // The log row committed; the quantity did not. This divergence is the
    // documented outcome, not a rollback.
    assert_eq!(store.rows_with_content(LOG_SHEET, 0, 10), 1);
    assert_eq!(store.cell(INVENTORY_SHEET, 2, 4), "10");
}

#[tokio::test]
async fn receive_increments_quantity_into_receipt_band() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.receive(receive_cmd(json!(5))).await.unwrap();

    assert_eq!(receipt.new_qty, 15.0);
    assert_eq!(store.cell(INVENTORY_SHEET, 2, 4), "15");
    // Receipt band header sits at row 2, so the first record lands at row 3,
    // column K onwards
    assert_eq!(receipt.log_row, 3);
    assert_eq!(store.cell(LOG_SHEET, 3, 11), "X1");
    assert_eq!(store.cell(LOG_SHEET, 3, 12), "5");
    assert_eq!(store.cell(LOG_SHEET, 3, 16), "bob");
    // Nothing leaked into the issuance band
    assert_eq!(store.rows_with_content(LOG_SHEET, 0, 10), 0);
}

#[tokio::test]
async fn search_returns_header_keyed_matches() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let results = ledger.search("w1").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].get("Location").unwrap(), "W1");
    assert_eq!(results[0].get("Item Code").unwrap(), "X1");
}

#[tokio::test]
async fn search_on_missing_table_is_not_found() {
    let store = FakeSheets::new();
    let ledger = engine(store.clone(), FakeFiles::new());

    let err = ledger.search("anything").await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn search_with_no_matches_is_an_empty_success() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let results = ledger.search("zzz-no-such").await.unwrap();
    assert!(results.is_empty());
}

fn sample_entry() -> NewInventoryEntry {
    serde_json::from_value(json!({
        "Location": "W2",
        "Item Code": "Y7",
        "Description": "Washer",
        "UOM": "EA",
        "Qty": "25",
        "Condition": "New",
        "Returnable Item": "No",
        "Category": "Hardware"
    }))
    .unwrap()
}

fn sample_image() -> UploadedImage {
    UploadedImage {
        file_name: "washer.jpg".into(),
        content_type: "image/jpeg".into(),
        bytes: vec![0xFF, 0xD8],
    }
}

#[tokio::test]
async fn add_with_image_appends_row_with_link() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let files = FakeFiles::new();
    let ledger = engine(store.clone(), files.clone());

    let stored = ledger.add_with_image(sample_entry(), sample_image()).await.unwrap();

    assert_eq!(
        stored.get("Image Link").unwrap(),
        "https://files.example/washer.jpg"
    );
    assert_eq!(files.uploads.lock().unwrap().len(), 1);
    // Appended after the existing data row
    assert_eq!(store.cell(INVENTORY_SHEET, 3, 1), "Y7");
    assert_eq!(store.cell(INVENTORY_SHEET, 3, 4), "25");
    assert_eq!(
        store.cell(INVENTORY_SHEET, 3, 9),
        "https://files.example/washer.jpg"
    );
}

#[tokio::test]
async fn add_with_image_surfaces_upload_failure() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::failing());

    let err = ledger
        .add_with_image(sample_entry(), sample_image())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::UploadError(_));
    // No row was appended
    assert_eq!(store.cell(INVENTORY_SHEET, 3, 1), "");
}

#[tokio::test]
async fn add_with_image_on_empty_table_is_schema_drift() {
    // A missing header row on the add path is server-side drift, not a
    // lookup miss
    let store = FakeSheets::new();
    let ledger = engine(store.clone(), FakeFiles::new());

    let err = ledger
        .add_with_image(sample_entry(), sample_image())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SchemaError(_));
}

#[tokio::test]
async fn add_with_image_detects_schema_drift() {
    let store = FakeSheets::new();
    let header: Vec<&str> = INVENTORY_HEADER
        .iter()
        .copied()
        .filter(|h| *h != "Image Link")
        .collect();
    store.seed(INVENTORY_SHEET, &[header.as_slice()]);
    let ledger = engine(store.clone(), FakeFiles::new());

    let err = ledger
        .add_with_image(sample_entry(), sample_image())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::SchemaError(_));
}

#[tokio::test]
async fn add_new_item_without_code_writes_only_the_no_code_band() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger
        .add_new_item_without_code(AddNewItemCommand {
            receipt_qty: json!("12"),
            location: "W3".into(),
            description: "Unlabeled gasket".into(),
            returnable_item: "No".into(),
            received_by: "carol".into(),
            notes: None,
            image: None,
        })
        .await
        .unwrap();

    assert_eq!(receipt.log_row, 2);
    assert!(receipt.transaction.item_code.is_none());
    // Band starts at column T (index 19)
    assert_eq!(store.cell(LOG_SHEET, 2, 20), "12");
    assert_eq!(store.cell(LOG_SHEET, 2, 21), "W3");
    // Inventory table untouched
    assert_eq!(store.cell(INVENTORY_SHEET, 3, 0), "");
    // No image means an empty link cell
    assert_eq!(store.cell(LOG_SHEET, 2, 26), "");
}

#[tokio::test]
async fn add_new_item_uploads_optional_image() {
    let store = FakeSheets::new();
    seed_single_item(&store);
    let files = FakeFiles::new();
    let ledger = engine(store.clone(), files.clone());

    let receipt = ledger
        .add_new_item_without_code(AddNewItemCommand {
            receipt_qty: json!(3),
            location: "W3".into(),
            description: "Unlabeled gasket".into(),
            returnable_item: "No".into(),
            received_by: "carol".into(),
            notes: Some("found in crate".into()),
            image: Some(sample_image()),
        })
        .await
        .unwrap();

    assert_eq!(
        receipt.transaction.image_link,
        "https://files.example/washer.jpg"
    );
    assert_eq!(store.cell(LOG_SHEET, 2, 26), "https://files.example/washer.jpg");
}

#[tokio::test]
async fn duplicate_rows_are_shadowed_by_first_match() {
    let store = FakeSheets::new();
    store.seed(
        INVENTORY_SHEET,
        &[
            INVENTORY_HEADER,
            &["W1", "X1", "Hex bolt", "EA", "10", "Good", "No", "Hardware", "", ""],
            &["W1", "X1", "Hex bolt (dup)", "EA", "99", "Good", "No", "Hardware", "", ""],
        ],
    );
    store.seed(LOG_SHEET, &[&[]]);
    let ledger = engine(store.clone(), FakeFiles::new());

    let receipt = ledger.issue(issue_cmd(json!(4))).await.unwrap();
    // First row won: 10 - 4, and the duplicate stayed at 99
    assert_eq!(receipt.new_qty, 6.0);
    assert_eq!(store.cell(INVENTORY_SHEET, 2, 4), "6");
    assert_eq!(store.cell(INVENTORY_SHEET, 3, 4), "99");
}
