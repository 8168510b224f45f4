//! Catalog Server - Inventory Management Backend
//!
//! Relational-backed product catalog with a stock-change audit trail,
//! CSV bulk import/export, and a REST API on top.

pub mod csv_transfer;
pub mod database;
pub mod error;
pub mod models;
pub mod web;

pub use error::{CatalogError, Result};
pub use models::{Product, ProductInput, StockChangeRecord};
