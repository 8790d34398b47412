//! Validation utilities for documents consumed by the engine

use crate::models::{AlertConfig, InventoryLot, ReturnRecord, WasteRecord};

// ============================================================================
// Configuration Validations
// ============================================================================

/// Validate FEFO thresholds: non-negative, and warning never below critical
pub fn validate_alert_config(config: &AlertConfig) -> Result<(), &'static str> {
    if config.critical_days < 0 || config.warning_days < 0 {
        return Err("FEFO thresholds cannot be negative");
    }
    if config.warning_days < config.critical_days {
        return Err("Warning threshold must be at least the critical threshold");
    }
    for exception in &config.exceptions {
        if exception.product_id.trim().is_empty() {
            return Err("FEFO exception must name a product");
        }
        if exception.critical_days < 0 {
            return Err("FEFO exception threshold cannot be negative");
        }
    }
    Ok(())
}

// ============================================================================
// Stock Validations
// ============================================================================

/// Validate a lot quantity (int >= 0)
pub fn validate_lot(lot: &InventoryLot) -> Result<(), &'static str> {
    if lot.product_id.trim().is_empty() {
        return Err("Lot must reference a product");
    }
    if lot.quantity < 0 {
        return Err("Lot quantity cannot be negative");
    }
    Ok(())
}

/// Validate a write-off before it is announced
pub fn validate_waste(waste: &WasteRecord) -> Result<(), &'static str> {
    if waste.quantity <= 0 {
        return Err("Write-off quantity must be positive");
    }
    Ok(())
}

/// Validate a return before it is announced or cascaded
pub fn validate_return(record: &ReturnRecord) -> Result<(), &'static str> {
    if record.quantity <= 0 {
        return Err("Return quantity must be positive");
    }
    if record.product_name.trim().is_empty() {
        return Err("Return must name a product");
    }
    Ok(())
}
