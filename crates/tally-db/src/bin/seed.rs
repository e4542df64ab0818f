//! # Seed Data Generator
//!
//! Populates a ledger database with a small catalog and a few sales for
//! development and manual testing of the admin tool.
//!
//! ## Usage
//! ```bash
//! # Seed ./tally_dev.db for tenant 1
//! cargo run -p tally-db --bin seed
//!
//! # Specify database path, tenant and branch
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --tenant 2 --branch 5
//! ```
//!
//! ## Generated Data
//! - Products across five categories, with stock levels spread over the
//!   in-stock / low-stock / out-of-stock buckets
//! - One fully paid sale with line items
//! - One partially paid sale whose state lives only in the legacy notes
//!   annotation (as older tills wrote it)
//! - One partially paid sale using the structured columns

use std::env;
use tally_core::{
    Money, NewProduct, NewSale, NewSaleItem, PartialPayment, PaymentMethod, Product, Scope,
};
use tally_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (category, [(name, price_cents, stock, reorder_level)])
const CATALOG: &[(&str, &[(&str, i64, i64, i64)])] = &[
    (
        "Beverages",
        &[
            ("Coca-Cola 330ml", 150, 48, 12),
            ("Sparkling Water 1L", 90, 6, 10),
            ("Orange Juice 1L", 280, 0, 5),
            ("Iced Tea 500ml", 190, 24, 10),
        ],
    ),
    (
        "Snacks",
        &[
            ("Salted Crisps", 120, 30, 10),
            ("Chocolate Bar", 110, 9, 10),
            ("Peanuts 200g", 240, 15, 5),
        ],
    ),
    (
        "Dairy",
        &[
            ("Whole Milk 1L", 130, 20, 8),
            ("Greek Yogurt", 210, 3, 6),
            ("Cheddar 250g", 390, 0, 4),
        ],
    ),
    (
        "Bakery",
        &[
            ("White Bread", 200, 12, 10),
            ("Croissant", 95, 40, 15),
        ],
    ),
    (
        "Grocery",
        &[
            ("Rice 1kg", 250, 10, 10),
            ("Pasta Penne 500g", 160, 35, 10),
            ("Olive Oil 750ml", 790, 7, 3),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tally_dev.db");
    let mut tenant_id: i64 = 1;
    let mut branch_id: Option<i64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].parse().unwrap_or(1);
                    i += 1;
                }
            }
            "--branch" | "-b" => {
                if i + 1 < args.len() {
                    branch_id = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>      Database file path (default: ./tally_dev.db)");
                println!("  -t, --tenant <ID>    Tenant to seed (default: 1)");
                println!("  -b, --branch <ID>    Branch to seed (default: none)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let scope = Scope { tenant_id, branch_id };
    info!(path = %db_path, scope = %scope, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    // Check existing products
    let existing = db.products().count(&scope).await?;
    if existing > 0 {
        warn!(existing = existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let mut products: Vec<Product> = Vec::new();
    for (category, entries) in CATALOG {
        for (name, price_cents, stock, reorder_level) in entries.iter() {
            let new_product = NewProduct::new(*name, *price_cents)
                .with_category(*category)
                .with_stock(*stock)
                .with_reorder_level(*reorder_level);

            match db.products().insert(&scope, &new_product).await {
                Ok(product) => products.push(product),
                Err(e) => warn!(name = %name, error = %e, "Failed to insert product"),
            }
        }
    }
    info!(count = products.len(), "Products created");

    if products.len() < 3 {
        warn!("Not enough products to build sample sales");
        return Ok(());
    }

    // Fully paid sale
    let lines = [(&products[0], 2), (&products[4], 1)];
    let total: Money = lines
        .iter()
        .map(|(p, qty)| p.price().multiply_quantity(*qty))
        .sum();
    let full = db
        .sales()
        .insert_sale(
            &scope,
            &NewSale {
                total_cents: total.cents(),
                payment_method: PaymentMethod::Card,
                customer_id: None,
                cashier_id: Some(1),
                discount_cents: 0,
                notes: Some("Counter sale".to_string()),
                partial: None,
            },
        )
        .await?;
    for (product, qty) in lines {
        db.sales().add_item(full.id, &line(product, qty)).await?;
    }
    info!(sale_id = full.id, total = %total, "Created full sale");

    // Legacy partial sale: state only in the notes annotation
    let legacy_payment = PartialPayment::new(Money::from_cents(3000), Money::from_cents(2000))
        .with_notes("Customer pays the rest on Friday");
    let legacy = db
        .sales()
        .insert_sale(
            &scope,
            &NewSale {
                total_cents: legacy_payment.paid_today.cents(),
                payment_method: PaymentMethod::Cash,
                customer_id: Some(7),
                cashier_id: Some(1),
                discount_cents: 0,
                notes: Some(legacy_payment.encode()),
                partial: None,
            },
        )
        .await?;
    db.sales().add_item(legacy.id, &line(&products[1], 3)).await?;
    info!(sale_id = legacy.id, "Created legacy partial sale");

    // Structured partial sale
    let structured_payment = PartialPayment::new(Money::from_cents(1500), Money::from_cents(500));
    let structured = db
        .sales()
        .insert_sale(
            &scope,
            &NewSale {
                total_cents: structured_payment.paid_today.cents(),
                payment_method: PaymentMethod::MobileMoney,
                customer_id: Some(8),
                cashier_id: Some(2),
                discount_cents: 0,
                notes: None,
                partial: Some(structured_payment),
            },
        )
        .await?;
    db.sales().add_item(structured.id, &line(&products[2], 1)).await?;
    info!(sale_id = structured.id, "Created structured partial sale");

    info!("Seed complete");
    Ok(())
}

fn line(product: &Product, quantity: i64) -> NewSaleItem {
    NewSaleItem {
        product_id: product.id.clone(),
        quantity,
        weight: None,
        unit_price_cents: product.price_cents,
    }
}
