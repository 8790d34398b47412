//! Product and inventory lot models

use serde::{Deserialize, Serialize};

use crate::types::{Collection, Record};

/// Stock status tier derived from the aggregate total
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

/// Classify a product's stock level
pub fn classify_stock(total_stock: i64, min_stock: i64) -> StockStatus {
    if total_stock <= 0 {
        StockStatus::OutOfStock
    } else if total_stock <= min_stock {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// A catalog product. `total_stock` caches the sum of its lot quantities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub total_stock: i64,
    #[serde(default)]
    pub min_stock: i64,
    #[serde(default)]
    pub status: StockStatus,
}

impl Record for Product {
    const COLLECTION: Collection = Collection::Products;
    const NAME: &'static str = "product";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A batch of a product with its own quantity and expiration date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    #[serde(default)]
    pub id: String,
    pub product_id: String,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    #[serde(default)]
    pub expiration_date: Option<String>,
}

impl InventoryLot {
    pub fn batch_label(&self) -> &str {
        self.batch.as_deref().unwrap_or(&self.id)
    }
}

impl Record for InventoryLot {
    const COLLECTION: Collection = Collection::Inventory;
    const NAME: &'static str = "inventory lot";

    fn id(&self) -> &str {
        &self.id
    }
}
