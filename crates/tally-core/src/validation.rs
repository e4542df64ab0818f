//! # Validation Module
//!
//! Input validation for catalog writes, search input and reversal plans.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin tool / front-end                                       │
//! │  └── Argument parsing, basic format checks                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: tally-engine services                                        │
//! │  └── THIS MODULE: rules checked before any write                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  ├── UNIQUE (idempotency_key)                                          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{NewProduct, ProductUpdate, SaleItemWithStock};
use crate::MAX_SUGGESTIONS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("RICE-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name: non-empty, at most 200 characters.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a category label: non-empty when given, at most 100 characters.
pub fn validate_category(category: &str) -> ValidationResult<()> {
    let category = category.trim();

    if category.is_empty() {
        return Err(ValidationError::Required {
            field: "category".to_string(),
        });
    }

    if category.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "category".to_string(),
            max: 100,
        });
    }

    Ok(())
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string. Empty is allowed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price in cents. Zero is allowed (free items).
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    non_negative("price", cents)
}

/// Stock can never be negative.
pub fn validate_stock_quantity(quantity: i64) -> ValidationResult<()> {
    non_negative("stock_quantity", quantity)
}

pub fn validate_reorder_level(level: i64) -> ValidationResult<()> {
    non_negative("reorder_level", level)
}

/// Validates a suggestion limit (1 to MAX_SUGGESTIONS).
pub fn validate_suggestion_limit(limit: usize) -> ValidationResult<()> {
    if limit == 0 || limit > MAX_SUGGESTIONS {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_SUGGESTIONS as i64,
        });
    }

    Ok(())
}

fn non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field of a product about to be created.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    if let Some(category) = &product.category {
        validate_category(category)?;
    }
    if let Some(sku) = &product.sku {
        validate_sku(sku)?;
    }
    validate_price_cents(product.price_cents)?;
    validate_stock_quantity(product.stock_quantity)?;
    validate_reorder_level(product.reorder_level)?;
    Ok(())
}

/// Validates only the fields an update actually sets.
pub fn validate_product_update(update: &ProductUpdate) -> ValidationResult<()> {
    if let Some(name) = &update.name {
        validate_product_name(name)?;
    }
    if let Some(category) = &update.category {
        validate_category(category)?;
    }
    if let Some(sku) = &update.sku {
        validate_sku(sku)?;
    }
    if let Some(price) = update.price_cents {
        validate_price_cents(price)?;
    }
    if let Some(stock) = update.stock_quantity {
        validate_stock_quantity(stock)?;
    }
    if let Some(level) = update.reorder_level {
        validate_reorder_level(level)?;
    }
    Ok(())
}

/// Checks that a line item can be restocked.
///
/// Negative quantities are rejected. Zero quantities and items whose product
/// is gone pass; callers skip them because they change no stock.
pub fn validate_restock_item(item: &SaleItemWithStock) -> CoreResult<()> {
    if item.quantity < 0 {
        return Err(CoreError::NegativeQuantity {
            sale_item_id: item.sale_item_id,
            quantity: item.quantity,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
