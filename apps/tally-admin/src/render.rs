//! Human-readable output.

use std::fmt::Write;

use tally_core::{CatalogEntry, Money, Product, RestockOutcome, StockSummary};
use tally_engine::{ResolutionReport, ReversalReport, ReversalStatus};

pub fn resolution(report: &ResolutionReport) -> String {
    format!(
        "Sale #{} resolved: {} + {} = {} (was {})",
        report.sale_id, report.paid_today, report.remaining, report.total, report.previous_total
    )
}

pub fn reversal(report: &ReversalReport) -> String {
    let mut out = format!(
        "Sale #{} deleted: {} item(s) restocked, {} already restocked earlier",
        report.sale_id,
        report.applied(),
        report.already_applied()
    );
    if report.skipped_items > 0 {
        let _ = write!(out, ", {} zero-quantity item(s) skipped", report.skipped_items);
    }
    if !report.missing_products.is_empty() {
        let _ = write!(
            out,
            ", {} item(s) not restocked (product gone: {})",
            report.missing_products.len(),
            report.missing_products.join(", ")
        );
    }

    for line in &report.lines {
        let detail = match line.outcome {
            RestockOutcome::Applied {
                old_stock,
                new_stock,
            } => format!("{old_stock} -> {new_stock}"),
            RestockOutcome::AlreadyApplied => "already applied".to_string(),
        };
        let _ = write!(
            out,
            "\n  item {:>6}  +{:<4} {}  ({detail})",
            line.sale_item_id, line.quantity, line.product_id
        );
    }
    out
}

pub fn status(sale_id: i64, status: &ReversalStatus) -> String {
    match status {
        ReversalStatus::Clean => format!("Sale #{sale_id}: not reversed"),
        ReversalStatus::Pending { applied } => format!(
            "Sale #{sale_id}: all {applied} item(s) restocked, sale not yet removed; re-run delete"
        ),
        ReversalStatus::PartiallyReversed { applied, remaining } => format!(
            "Sale #{sale_id}: {applied} item(s) restocked, {remaining} outstanding; re-run delete"
        ),
        ReversalStatus::Orphaned { applied } => {
            format!("Sale #{sale_id}: deleted, {applied} restock movement(s) in the ledger")
        }
    }
}

pub fn summary(summary: &StockSummary) -> String {
    format!(
        "Products: {}\n  in stock:     {}\n  low stock:    {}\n  out of stock: {}",
        summary.total, summary.in_stock, summary.low_stock, summary.out_of_stock
    )
}

pub fn entries(entries: &[CatalogEntry]) -> String {
    entries
        .iter()
        .map(|e| match &e.category {
            Some(category) => format!("{}  [{category}]  {}", e.name, e.id),
            None => format!("{}  {}", e.name, e.id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn products(products: &[Product]) -> String {
    products
        .iter()
        .map(|p| {
            format!(
                "{}  {}  stock {}  {}",
                p.name,
                Money::from_cents(p.price_cents),
                p.stock_quantity,
                p.sku.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
