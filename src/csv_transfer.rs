//! CSV bulk import and export for the product catalog
//!
//! Import applies an idempotent add-or-skip policy per row: rows whose name
//! already exists (case-insensitive) are reported as duplicates and never
//! merged; any other per-row failure is counted as skipped without aborting
//! the batch. Export renders the full catalog ordered by name.

use csv::{QuoteStyle, ReaderBuilder, Trim, WriterBuilder};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::database::{self, now_timestamp};
use crate::error::Result;
use crate::models::stock_status;

/// Attachment filename hint for the export payload
pub const EXPORT_FILENAME: &str = "products.csv";

const EXPORT_HEADER: &str = "name,unit,category,brand,stock,status,image";

/// One candidate row from the tabular import feed, fields still raw text.
///
/// The `status` column is accepted for feed compatibility but ignored:
/// status is always derived from the parsed stock.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub image: String,
}

/// An incoming row rejected because its name matches an existing product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRow {
    pub name: String,
    #[serde(rename = "existingId")]
    pub existing_id: i64,
}

/// Aggregate outcome of an import batch; every input row is reflected
/// exactly once as added, skipped, or duplicate.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub added: usize,
    pub skipped: usize,
    pub duplicates: Vec<DuplicateRow>,
}

/// Parse CSV text into candidate rows.
///
/// The feed is expected to carry the same seven columns the export writes;
/// extra columns are tolerated, missing ones default to empty.
pub fn parse_import(content: &str) -> Result<Vec<ImportRow>> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: ImportRow = result?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reconcile a batch of candidate rows against the catalog.
///
/// Each row is decided by a single `INSERT OR IGNORE` against the unique
/// name index, so the duplicate check and the insert cannot race another
/// writer. A rejected insert is classified as a duplicate when the name
/// exists, otherwise as skipped.
pub fn import_products(conn: &Connection, rows: &[ImportRow]) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    if rows.is_empty() {
        return Ok(report);
    }

    for row in rows {
        let stock = row.stock.trim().parse::<i64>().unwrap_or(0);
        let status = stock_status(stock);
        let image = if row.image.is_empty() {
            None
        } else {
            Some(row.image.as_str())
        };

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO products
             (name, unit, category, brand, stock, status, image, price, description,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, ?8, ?8)",
            params![
                row.name,
                row.unit,
                row.category,
                row.brand,
                stock,
                status,
                image,
                now_timestamp(),
            ],
        );

        match inserted {
            Ok(0) => match database::find_id_by_name(conn, &row.name) {
                Ok(Some(existing_id)) => {
                    report.duplicates.push(DuplicateRow {
                        name: row.name.clone(),
                        existing_id,
                    });
                }
                Ok(None) => {
                    log::warn!("Import row '{}' rejected by constraint, skipping", row.name);
                    report.skipped += 1;
                }
                Err(e) => {
                    log::warn!("Failed to resolve duplicate '{}': {}", row.name, e);
                    report.skipped += 1;
                }
            },
            Ok(_) => report.added += 1,
            Err(e) => {
                log::warn!("Failed to import row '{}': {}", row.name, e);
                report.skipped += 1;
            }
        }
    }

    log::info!(
        "Import finished: {} added, {} skipped, {} duplicates",
        report.added,
        report.skipped,
        report.duplicates.len()
    );
    Ok(report)
}

/// Render the full catalog as a CSV document, ordered by name.
///
/// Text fields are quoted (embedded quotes doubled per RFC 4180), the
/// numeric stock column is left bare.
pub fn export_products(conn: &Connection) -> Result<String> {
    let products = database::list_products_by_name(conn)?;

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::NonNumeric)
        .has_headers(false)
        .from_writer(Vec::new());

    for product in &products {
        writer.write_record([
            product.name.as_str(),
            product.unit.as_str(),
            product.category.as_str(),
            product.brand.as_str(),
            &product.stock.to_string(),
            product.status.as_str(),
            product.image.as_deref().unwrap_or(""),
        ])?;
    }

    let body = writer.into_inner().map_err(|e| {
        csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;

    let mut document = String::with_capacity(EXPORT_HEADER.len() + 1 + body.len());
    document.push_str(EXPORT_HEADER);
    document.push('\n');
    document.push_str(&String::from_utf8_lossy(&body));
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{create_product, init_schema, product_count, stock_history};
    use crate::models::{ProductInput, STATUS_IN_STOCK, STATUS_OUT_OF_STOCK};

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn input(name: &str, stock: i64) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            unit: "piece".to_string(),
            category: "Electronics".to_string(),
            brand: "Acme".to_string(),
            stock,
            image: None,
            price: 19.99,
            description: None,
        }
    }

    fn row(name: &str, stock: &str) -> ImportRow {
        ImportRow {
            name: name.to_string(),
            unit: "piece".to_string(),
            category: "Electronics".to_string(),
            brand: "Acme".to_string(),
            stock: stock.to_string(),
            status: String::new(),
            image: String::new(),
        }
    }

    #[test]
    fn import_empty_batch_yields_zero_report() {
        let conn = test_db();
        let report = import_products(&conn, &[]).unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.skipped, 0);
        assert!(report.duplicates.is_empty());
        assert_eq!(product_count(&conn).unwrap(), 0);
    }

    #[test]
    fn import_adds_new_and_reports_duplicates() {
        let conn = test_db();
        let widget = create_product(&conn, &input("Widget", 5)).unwrap();

        // Duplicate detection is case-insensitive
        let rows = vec![row("widget", "3"), row("Gadget", "7")];
        let report = import_products(&conn, &rows).unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            report.duplicates,
            vec![DuplicateRow {
                name: "widget".to_string(),
                existing_id: widget.id,
            }]
        );
        // Every row accounted for exactly once
        assert_eq!(
            report.added + report.skipped + report.duplicates.len(),
            rows.len()
        );

        // The duplicate row was not applied: the existing record is untouched
        let existing = crate::database::get_product(&conn, widget.id).unwrap();
        assert_eq!(existing.name, "Widget");
        assert_eq!(existing.stock, 5);
    }

    #[test]
    fn import_derives_status_ignoring_row_value() {
        let conn = test_db();

        let mut zero = row("Empty Shelf", "0");
        zero.status = STATUS_IN_STOCK.to_string();
        let mut stocked = row("Full Shelf", "4");
        stocked.status = STATUS_OUT_OF_STOCK.to_string();

        import_products(&conn, &[zero, stocked]).unwrap();

        let empty_id = database::find_id_by_name(&conn, "Empty Shelf")
            .unwrap()
            .unwrap();
        let full_id = database::find_id_by_name(&conn, "Full Shelf")
            .unwrap()
            .unwrap();
        assert_eq!(
            crate::database::get_product(&conn, empty_id).unwrap().status,
            STATUS_OUT_OF_STOCK
        );
        assert_eq!(
            crate::database::get_product(&conn, full_id).unwrap().status,
            STATUS_IN_STOCK
        );
    }

    #[test]
    fn import_unparseable_stock_defaults_to_zero() {
        let conn = test_db();
        import_products(&conn, &[row("Widget", "lots")]).unwrap();

        let id = database::find_id_by_name(&conn, "Widget").unwrap().unwrap();
        let product = crate::database::get_product(&conn, id).unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(product.status, STATUS_OUT_OF_STOCK);
    }

    #[test]
    fn import_constraint_rejected_row_is_skipped_not_fatal() {
        let conn = test_db();
        // Negative stock violates the CHECK constraint; the row is skipped
        // and the rest of the batch still lands.
        let rows = vec![row("Broken", "-3"), row("Fine", "2")];
        let report = import_products(&conn, &rows).unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.duplicates.is_empty());
        assert_eq!(product_count(&conn).unwrap(), 1);
    }

    #[test]
    fn import_does_not_touch_audit_trail() {
        let conn = test_db();
        create_product(&conn, &input("Widget", 5)).unwrap();
        import_products(&conn, &[row("widget", "9"), row("Gadget", "1")]).unwrap();

        let widget_id = database::find_id_by_name(&conn, "Widget").unwrap().unwrap();
        let gadget_id = database::find_id_by_name(&conn, "Gadget").unwrap().unwrap();
        assert!(stock_history(&conn, widget_id).unwrap().is_empty());
        assert!(stock_history(&conn, gadget_id).unwrap().is_empty());
    }

    #[test]
    fn parse_import_reads_header_and_rows() {
        let content = "name,unit,category,brand,stock,status,image\n\
                       \"Widget\",\"piece\",\"Electronics\",\"Acme\",5,\"In Stock\",\"\"\n\
                       Gadget,piece,Tools,Bolt,0,Out of Stock,http://example.com/g.png\n";
        let rows = parse_import(content).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Widget");
        assert_eq!(rows[0].stock, "5");
        assert_eq!(rows[1].name, "Gadget");
        assert_eq!(rows[1].image, "http://example.com/g.png");
    }

    #[test]
    fn parse_import_empty_document() {
        assert!(parse_import("").unwrap().is_empty());
        assert!(parse_import("name,unit,category,brand,stock,status,image\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn export_writes_fixed_header_and_quoted_text() {
        let conn = test_db();
        let mut widget = input("Widget", 5);
        widget.image = Some("http://example.com/w.png".to_string());
        create_product(&conn, &widget).unwrap();

        let document = export_products(&conn).unwrap();
        let mut lines = document.lines();
        assert_eq!(lines.next(), Some(EXPORT_HEADER));
        assert_eq!(
            lines.next(),
            Some(
                "\"Widget\",\"piece\",\"Electronics\",\"Acme\",5,\"In Stock\",\
                 \"http://example.com/w.png\""
            )
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn export_orders_by_name() {
        let conn = test_db();
        create_product(&conn, &input("Zebra", 1)).unwrap();
        create_product(&conn, &input("Apple", 1)).unwrap();

        let document = export_products(&conn).unwrap();
        let names: Vec<&str> = document
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(names, vec!["\"Apple\"", "\"Zebra\""]);
    }

    #[test]
    fn export_escapes_embedded_quotes_and_commas() {
        let conn = test_db();
        create_product(&conn, &input("Monitor 27\", curved", 2)).unwrap();

        let document = export_products(&conn).unwrap();
        // Embedded quote doubled, field still one quoted cell
        assert!(document.contains("\"Monitor 27\"\", curved\""));

        // And the document round-trips through the import parser
        let rows = parse_import(&document).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Monitor 27\", curved");
    }

    #[test]
    fn export_then_import_reports_all_duplicates() {
        let conn = test_db();
        create_product(&conn, &input("Widget", 5)).unwrap();
        create_product(&conn, &input("Gadget", 0)).unwrap();

        let document = export_products(&conn).unwrap();
        let rows = parse_import(&document).unwrap();
        let report = import_products(&conn, &rows).unwrap();

        assert_eq!(report.added, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.duplicates.len(), 2);
        assert_eq!(product_count(&conn).unwrap(), 2);
    }
}
