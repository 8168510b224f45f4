//! Database operations for the product catalog
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! A product update and its audit record are written in one transaction so
//! either both persist or neither does.

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use crate::error::{CatalogError, Result};
use crate::models::{stock_status, Product, ProductInput, StockChangeRecord};

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `products`: the catalog, one row per product, name unique (case-insensitive)
/// - `stock_changes`: append-only audit trail, cascade-deleted with its product
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        -- Product catalog table
        CREATE TABLE IF NOT EXISTS products (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL COLLATE NOCASE UNIQUE,
            unit        TEXT NOT NULL,
            category    TEXT NOT NULL,
            brand       TEXT NOT NULL,
            stock       INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
            status      TEXT NOT NULL,
            image       TEXT,
            price       REAL NOT NULL DEFAULT 0 CHECK (price >= 0),
            description TEXT,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

        -- Stock change audit trail
        CREATE TABLE IF NOT EXISTS stock_changes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id  INTEGER NOT NULL,
            old_stock   INTEGER NOT NULL,
            new_stock   INTEGER NOT NULL,
            changed_by  TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_stock_changes_product ON stock_changes(product_id);
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Current UTC time with microsecond precision.
///
/// Written by the application rather than SQL defaults so audit records
/// made within the same second still order deterministically.
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn product_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
        category: row.get(3)?,
        brand: row.get(4)?,
        stock: row.get(5)?,
        status: row.get(6)?,
        image: row.get(7)?,
        price: row.get(8)?,
        description: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

const PRODUCT_COLUMNS: &str =
    "id, name, unit, category, brand, stock, status, image, price, description, \
     created_at, updated_at";

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

/// Listing filter: a substring search over `name` or an exact category
/// match. When both are present the search term wins.
#[derive(Debug, Default, Clone)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

/// List products, most recently created first.
///
/// A category of "all" means no category filter, matching the UI's
/// catch-all dropdown entry.
pub fn list_products(conn: &Connection, filter: &ProductFilter) -> Result<Vec<Product>> {
    let search = filter.search.as_deref().filter(|s| !s.is_empty());
    let category = filter
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "all");

    let products = if let Some(term) = search {
        let pattern = format!("%{}%", term);
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE name LIKE ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![pattern], product_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    } else if let Some(category) = category {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE category = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![category], product_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    } else {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], product_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    Ok(products)
}

/// List the full catalog ordered by name, for export.
pub fn list_products_by_name(conn: &Connection) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"
    ))?;
    let rows = stmt.query_map([], product_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Get a product by id
pub fn get_product(conn: &Connection, id: i64) -> Result<Product> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        params![id],
        product_from_row,
    )
    .optional()?
    .ok_or(CatalogError::NotFound)
}

/// Search products by name (case-insensitive substring match), ordered
/// alphabetically. An empty term is rejected.
pub fn search_products(conn: &Connection, term: &str) -> Result<Vec<Product>> {
    if term.trim().is_empty() {
        return Err(CatalogError::InvalidArgument(
            "Name parameter is required".into(),
        ));
    }

    let pattern = format!("%{}%", term);
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE name LIKE ?1
         ORDER BY name"
    ))?;
    let rows = stmt.query_map(params![pattern], product_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Create a new product.
///
/// Status is derived from the stock quantity. The unique index on `name`
/// makes concurrent creates with colliding names mutually exclusive: one
/// succeeds, the other observes `Conflict`.
pub fn create_product(conn: &Connection, input: &ProductInput) -> Result<Product> {
    input.validate()?;

    let status = stock_status(input.stock);
    let now = now_timestamp();
    let result = conn.execute(
        "INSERT INTO products
         (name, unit, category, brand, stock, status, image, price, description,
          created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            input.name,
            input.unit,
            input.category,
            input.brand,
            input.stock,
            status,
            input.image,
            input.price,
            input.description,
            now,
        ],
    );

    match result {
        Ok(_) => get_product(conn, conn.last_insert_rowid()),
        Err(e) if is_constraint_violation(&e) => Err(CatalogError::Conflict(input.name.clone())),
        Err(e) => Err(e.into()),
    }
}

/// Update a product, re-validating and re-deriving status exactly as
/// `create_product` does.
///
/// When the new stock differs from the value the product held immediately
/// before, an audit record is appended in the same transaction.
pub fn update_product(
    conn: &mut Connection,
    id: i64,
    input: &ProductInput,
    actor: &str,
) -> Result<Product> {
    input.validate()?;

    let tx = conn.transaction()?;

    let old_stock: i64 = tx
        .query_row(
            "SELECT stock FROM products WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(CatalogError::NotFound)?;

    let status = stock_status(input.stock);
    let result = tx.execute(
        "UPDATE products
         SET name = ?1, unit = ?2, category = ?3, brand = ?4, stock = ?5,
             status = ?6, image = ?7, price = ?8, description = ?9, updated_at = ?10
         WHERE id = ?11",
        params![
            input.name,
            input.unit,
            input.category,
            input.brand,
            input.stock,
            status,
            input.image,
            input.price,
            input.description,
            now_timestamp(),
            id,
        ],
    );
    if let Err(e) = result {
        return Err(if is_constraint_violation(&e) {
            CatalogError::Conflict(input.name.clone())
        } else {
            e.into()
        });
    }

    if old_stock != input.stock {
        record_stock_change(&tx, id, old_stock, input.stock, actor)?;
    }

    let product = tx.query_row(
        &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
        params![id],
        product_from_row,
    )?;
    tx.commit()?;
    Ok(product)
}

/// Delete a product and, via cascade, its entire audit trail.
pub fn delete_product(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(CatalogError::NotFound);
    }
    Ok(())
}

/// Look up a product id by name (case-insensitive exact match).
pub fn find_id_by_name(conn: &Connection, name: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM products WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

/// Total number of products in the catalog
pub fn product_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .map_err(Into::into)
}

/// Append a stock change to the audit trail within the caller's
/// transaction. Records are never updated or deleted individually.
pub fn record_stock_change(
    tx: &Transaction<'_>,
    product_id: i64,
    old_stock: i64,
    new_stock: i64,
    actor: &str,
) -> Result<()> {
    tx.execute(
        "INSERT INTO stock_changes (product_id, old_stock, new_stock, changed_by, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![product_id, old_stock, new_stock, actor, now_timestamp()],
    )?;
    Ok(())
}

/// Audit trail for a product, most recent change first.
///
/// No existence check: an unknown product id yields an empty history,
/// the same as a product that never changed.
pub fn stock_history(conn: &Connection, product_id: i64) -> Result<Vec<StockChangeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, product_id, old_stock, new_stock, changed_by, timestamp
         FROM stock_changes
         WHERE product_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![product_id], |row| {
        Ok(StockChangeRecord {
            id: row.get(0)?,
            product_id: row.get(1)?,
            old_stock: row.get(2)?,
            new_stock: row.get(3)?,
            changed_by: row.get(4)?,
            timestamp: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
