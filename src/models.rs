//! Domain types for the product catalog.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Display status of a product that has stock on hand
pub const STATUS_IN_STOCK: &str = "In Stock";
/// Display status of a product with zero stock
pub const STATUS_OUT_OF_STOCK: &str = "Out of Stock";

/// Actor label recorded on stock changes when no identity is supplied.
/// There is no authentication model; callers thread this through
/// explicitly rather than the recorder hardcoding it.
pub const DEFAULT_ACTOR: &str = "admin";

/// Derives the display status from a stock quantity.
///
/// `status` is denormalized into the products table but is never accepted
/// as client input; every write recomputes it through this function.
pub fn stock_status(stock: i64) -> &'static str {
    if stock > 0 {
        STATUS_IN_STOCK
    } else {
        STATUS_OUT_OF_STOCK
    }
}

/// A persisted catalog product
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub category: String,
    pub brand: String,
    pub stock: i64,
    pub status: String,
    pub image: Option<String>,
    pub price: f64,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One entry in a product's stock-change audit trail.
///
/// Created exactly once when an update changes the stock quantity, never
/// mutated, deleted only as a cascade of the owning product's deletion.
#[derive(Debug, Clone, Serialize)]
pub struct StockChangeRecord {
    pub id: i64,
    pub product_id: i64,
    pub old_stock: i64,
    pub new_stock: i64,
    pub changed_by: String,
    pub timestamp: String,
}

/// Client-supplied fields for creating or updating a product.
///
/// Deliberately has no `status` field: status is derived from `stock`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub unit: String,
    pub category: String,
    pub brand: String,
    pub stock: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductInput {
    /// Validates the required fields, shared by create and update.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidArgument("Name is required".into()));
        }
        if self.unit.trim().is_empty() {
            return Err(CatalogError::InvalidArgument("Unit is required".into()));
        }
        if self.category.trim().is_empty() {
            return Err(CatalogError::InvalidArgument("Category is required".into()));
        }
        if self.brand.trim().is_empty() {
            return Err(CatalogError::InvalidArgument("Brand is required".into()));
        }
        if self.stock < 0 {
            return Err(CatalogError::InvalidArgument(
                "Stock must be a non-negative integer".into(),
            ));
        }
        if self.price < 0.0 {
            return Err(CatalogError::InvalidArgument(
                "Price must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            unit: "piece".to_string(),
            category: "Electronics".to_string(),
            brand: "Acme".to_string(),
            stock: 5,
            image: None,
            price: 9.99,
            description: None,
        }
    }

    #[test]
    fn status_follows_stock() {
        assert_eq!(stock_status(0), STATUS_OUT_OF_STOCK);
        assert_eq!(stock_status(1), STATUS_IN_STOCK);
        assert_eq!(stock_status(250), STATUS_IN_STOCK);
    }

    #[test]
    fn validate_accepts_complete_input() {
        assert!(input("Widget").validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_required_fields() {
        assert!(input("").validate().is_err());
        assert!(input("   ").validate().is_err());

        let mut no_unit = input("Widget");
        no_unit.unit = String::new();
        assert!(no_unit.validate().is_err());

        let mut no_category = input("Widget");
        no_category.category = String::new();
        assert!(no_category.validate().is_err());

        let mut no_brand = input("Widget");
        no_brand.brand = String::new();
        assert!(no_brand.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_stock() {
        let mut negative = input("Widget");
        negative.stock = -1;
        let err = negative.validate().unwrap_err();
        assert!(matches!(err, CatalogError::InvalidArgument(_)));
    }

    #[test]
    fn validate_rejects_negative_price() {
        let mut negative = input("Widget");
        negative.price = -0.01;
        assert!(negative.validate().is_err());
    }
}
