//! OpenAPI documentation for the HTTP surface.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::inventory;
use crate::ledger::engine::{AdditionReceipt, MovementReceipt, NewInventoryEntry, TransactionRecord};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "sheetstock-api",
        description = "Inventory ledger backend over a spreadsheet-backed store"
    ),
    paths(
        inventory::add_inventory,
        inventory::search_inventory,
        inventory::issue_inventory,
        inventory::receive_inventory,
        inventory::add_new_item,
    ),
    components(schemas(
        ErrorResponse,
        NewInventoryEntry,
        TransactionRecord,
        MovementReceipt,
        AdditionReceipt,
        inventory::IssueRequest,
        inventory::ReceiveRequest,
    )),
    tags(
        (name = "inventory", description = "Inventory ledger operations")
    )
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
