//! REST API for the product catalog
//!
//! Thin boundary over the repository: request parsing and status-code
//! mapping live here, all catalog semantics live in `database` and
//! `csv_transfer`.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::csv_transfer::{self, ImportReport, EXPORT_FILENAME};
use crate::database::{self, ProductFilter};
use crate::error::CatalogError;
use crate::models::{Product, ProductInput, StockChangeRecord, DEFAULT_ACTOR};

/// Shared application state (thread-safe database connection)
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// Query parameters for the product listing
#[derive(Deserialize)]
struct ListParams {
    search: Option<String>,
    category: Option<String>,
}

/// Query parameters for name search
#[derive(Deserialize)]
struct SearchParams {
    name: Option<String>,
}

/// API response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

type ApiResult<T> = (StatusCode, Json<ApiResponse<T>>);

fn respond<T>(status: StatusCode, data: T) -> ApiResult<T> {
    (
        status,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
}

fn ok<T>(data: T) -> ApiResult<T> {
    respond(StatusCode::OK, data)
}

fn fail<T>(err: CatalogError) -> ApiResult<T> {
    if let CatalogError::Database(ref e) = err {
        log::error!("Database error: {}", e);
    }
    (
        error_status(&err),
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
}

fn error_status(err: &CatalogError) -> StatusCode {
    match err {
        CatalogError::NotFound => StatusCode::NOT_FOUND,
        CatalogError::Conflict(_) | CatalogError::InvalidArgument(_) | CatalogError::Csv(_) => {
            StatusCode::BAD_REQUEST
        }
        CatalogError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/products?search={term}&category={category}
async fn list_products_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Product>> {
    let conn = state.db.lock().unwrap();
    let filter = ProductFilter {
        search: params.search,
        category: params.category,
    };
    match database::list_products(&conn, &filter) {
        Ok(products) => ok(products),
        Err(e) => fail(e),
    }
}

/// GET /api/products/search?name={term}
async fn search_products_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<Product>> {
    let conn = state.db.lock().unwrap();
    match database::search_products(&conn, params.name.as_deref().unwrap_or("")) {
        Ok(products) => ok(products),
        Err(e) => fail(e),
    }
}

/// GET /api/products/{id}
async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Product> {
    let conn = state.db.lock().unwrap();
    match database::get_product(&conn, id) {
        Ok(product) => ok(product),
        Err(e) => fail(e),
    }
}

/// POST /api/products
async fn create_product_handler(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Product> {
    let conn = state.db.lock().unwrap();
    match database::create_product(&conn, &input) {
        Ok(product) => respond(StatusCode::CREATED, product),
        Err(e) => fail(e),
    }
}

/// PUT /api/products/{id}
async fn update_product_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<ProductInput>,
) -> ApiResult<Product> {
    let mut conn = state.db.lock().unwrap();
    match database::update_product(&mut conn, id, &input, DEFAULT_ACTOR) {
        Ok(product) => ok(product),
        Err(e) => fail(e),
    }
}

/// DELETE /api/products/{id}
async fn delete_product_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<String> {
    let conn = state.db.lock().unwrap();
    match database::delete_product(&conn, id) {
        Ok(()) => ok("Product deleted successfully".to_string()),
        Err(e) => fail(e),
    }
}

/// GET /api/inventory/{id}/history
async fn stock_history_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<StockChangeRecord>> {
    let conn = state.db.lock().unwrap();
    match database::stock_history(&conn, id) {
        Ok(history) => ok(history),
        Err(e) => fail(e),
    }
}

/// POST /api/inventory/import
///
/// Takes the CSV document as the request body; upload mechanics are the
/// caller's concern.
async fn import_handler(State(state): State<AppState>, body: String) -> ApiResult<ImportReport> {
    let rows = match csv_transfer::parse_import(&body) {
        Ok(rows) => rows,
        Err(e) => return fail(e),
    };

    let conn = state.db.lock().unwrap();
    match csv_transfer::import_products(&conn, &rows) {
        Ok(report) => ok(report),
        Err(e) => fail(e),
    }
}

/// GET /api/inventory/export
async fn export_handler(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    match csv_transfer::export_products(&conn) {
        Ok(document) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/csv")
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILENAME),
            )
            .body(Body::from(document))
            .unwrap(),
        Err(e) => {
            log::error!("Export failed: {}", e);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from(format!("Export failed: {}", e)))
                .unwrap()
        }
    }
}

/// Build the API router
pub fn create_router(db: Arc<Mutex<Connection>>) -> Router {
    let state = AppState { db };

    Router::new()
        .route(
            "/api/products",
            get(list_products_handler).post(create_product_handler),
        )
        .route("/api/products/search", get(search_products_handler))
        .route(
            "/api/products/{id}",
            get(get_product_handler)
                .put(update_product_handler)
                .delete(delete_product_handler),
        )
        .route("/api/inventory/import", post(import_handler))
        .route("/api/inventory/export", get(export_handler))
        .route("/api/inventory/{id}/history", get(stock_history_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server (async)
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(db: Arc<Mutex<Connection>>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(db);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Catalog API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
