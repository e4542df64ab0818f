//! # Partial Payment Codec
//!
//! Converts between a sale's free-text annotation and structured
//! partial-payment amounts.
//!
//! ## Two Representations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LEGACY (text inside sales.notes)        STRUCTURED (PaymentState)      │
//! │                                                                         │
//! │  PARTIAL PAYMENT                          Partial(PartialPayment {      │
//! │  Amount Paid Today: €30.00      decode      paid_today: 30.00,          │
//! │  Remaining Balance: €20.00    ─────────►    remaining:  20.00,          │
//! │                               ◄─────────    notes: "pay friday",        │
//! │  Partial Payment Notes: pay friday encode })                            │
//! │                                                                         │
//! │  resolve: mark_resolved() rewrites the block to                         │
//! │           "PAYMENT COMPLETED — Full amount paid"                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decoding Never Fails
//! Annotations are typed by people and rewritten by older clients. Every
//! missing or malformed segment degrades to zero (amounts) or empty (notes);
//! [`decode`] has no error path.
//!
//! Detection is case-insensitive on any of three markers. When a label is
//! repeated, only its first occurrence counts. Amounts are the first decimal
//! number on the label's line, so `€30.00`, `30.00 EUR` and `: 30` all read
//! as thirty.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Markers
// =============================================================================

/// Header line of an encoded partial-payment block.
pub const MARKER_PARTIAL: &str = "PARTIAL PAYMENT";

/// Label preceding the amount collected at sale time.
pub const LABEL_PAID_TODAY: &str = "Amount Paid Today";

/// Label preceding the amount still owed.
pub const LABEL_REMAINING: &str = "Remaining Balance";

/// Label preceding the optional free-text notes.
pub const LABEL_NOTES: &str = "Partial Payment Notes";

/// Text written over the partial block when a sale is resolved.
pub const RESOLVED_MARKER: &str = "PAYMENT COMPLETED — Full amount paid";

/// Currency symbol used by [`PartialPayment::encode`].
pub const DEFAULT_CURRENCY_SYMBOL: &str = "€";

struct Patterns {
    any_marker: Regex,
    paid_today: Regex,
    remaining: Regex,
    notes: Regex,
    number: Regex,
    blank_line: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Patterns {
            any_marker: Regex::new(r"(?i)partial payment|amount paid today|remaining balance")?,
            paid_today: Regex::new(r"(?i)amount paid today")?,
            remaining: Regex::new(r"(?i)remaining balance")?,
            notes: Regex::new(r"(?i)partial payment notes[ \t]*:?")?,
            number: Regex::new(r"\d+(?:\.\d+)?")?,
            blank_line: Regex::new(r"\n[ \t\r]*\n")?,
        })
    }
}

/// Compiled once. `None` only if a pattern failed to compile, in which case
/// every annotation decodes as not partial.
fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns::compile().ok()).as_ref()
}

// =============================================================================
// Decoded Record
// =============================================================================

/// Flat result of decoding an annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartialState {
    pub is_partial: bool,
    pub paid_today: Money,
    pub remaining_balance: Money,
    pub notes: String,
}

/// Decodes an annotation into a [`PartialState`].
///
/// ## Example
/// ```rust
/// use tally_core::partial::decode;
///
/// let state = decode("PARTIAL PAYMENT\nAmount Paid Today: €30.00\nRemaining Balance: €20.00");
/// assert!(state.is_partial);
/// assert_eq!(state.paid_today.cents(), 3000);
/// assert_eq!(state.remaining_balance.cents(), 2000);
///
/// assert!(!decode("thanks for shopping").is_partial);
/// ```
pub fn decode(text: &str) -> PartialState {
    let Some(p) = patterns() else {
        return PartialState::default();
    };

    if !p.any_marker.is_match(text) {
        return PartialState::default();
    }

    PartialState {
        is_partial: true,
        paid_today: amount_after(p, &p.paid_today, text),
        remaining_balance: amount_after(p, &p.remaining, text),
        notes: notes_segment(p, text),
    }
}

/// Whether the annotation carries any partial-payment marker.
pub fn is_partial(text: &str) -> bool {
    patterns().is_some_and(|p| p.any_marker.is_match(text))
}

/// First decimal number on the same line as the first occurrence of `label`.
fn amount_after(p: &Patterns, label: &Regex, text: &str) -> Money {
    let Some(found) = label.find(text) else {
        return Money::zero();
    };

    let line = text[found.end()..].lines().next().unwrap_or("");
    p.number
        .find(line)
        .and_then(|n| Money::parse_decimal(n.as_str()))
        .unwrap_or_default()
}

/// Text after the notes label up to the next blank line or `---`.
fn notes_segment(p: &Patterns, text: &str) -> String {
    let Some(found) = p.notes.find(text) else {
        return String::new();
    };

    let rest = &text[found.end()..];
    let blank = p.blank_line.find(rest).map_or(rest.len(), |m| m.start());
    let separator = rest.find("---").unwrap_or(rest.len());

    rest[..blank.min(separator)].trim().to_string()
}

/// Reconstructs the full order value.
///
/// Partial: `paid_today + remaining_balance`. Otherwise `stored_total`
/// unchanged.
///
/// Annotations are free text, so the two amounts can be arbitrarily large;
/// `None` when their sum overflows.
pub fn compute_full_total(state: &PartialState, stored_total: Money) -> Option<Money> {
    if state.is_partial {
        state.paid_today.checked_add(state.remaining_balance)
    } else {
        Some(stored_total)
    }
}

/// Replaces the partial block (first marker to end of text) with
/// [`RESOLVED_MARKER`].
///
/// Text before the block is kept. Without any marker the result is the
/// resolved marker alone.
///
/// ## Example
/// ```rust
/// use tally_core::partial::{mark_resolved, RESOLVED_MARKER};
///
/// let text = "Table 4\n\nPARTIAL PAYMENT\nAmount Paid Today: €30.00";
/// assert_eq!(mark_resolved(text), format!("Table 4\n\n{RESOLVED_MARKER}"));
/// assert_eq!(mark_resolved("no block here"), RESOLVED_MARKER);
/// ```
pub fn mark_resolved(text: &str) -> String {
    let start = patterns()
        .and_then(|p| p.any_marker.find(text))
        .map(|m| m.start());

    let prefix = match start {
        Some(index) => text[..index].trim_end(),
        None => "",
    };

    if prefix.is_empty() {
        RESOLVED_MARKER.to_string()
    } else {
        format!("{prefix}\n\n{RESOLVED_MARKER}")
    }
}

// =============================================================================
// Structured State
// =============================================================================

/// Amounts of an open partial payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PartialPayment {
    pub paid_today: Money,
    pub remaining: Money,
    pub notes: String,
}

impl PartialPayment {
    pub fn new(paid_today: Money, remaining: Money) -> Self {
        PartialPayment {
            paid_today,
            remaining,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// `paid_today + remaining`, or `None` on overflow.
    pub fn full_total(&self) -> Option<Money> {
        self.paid_today.checked_add(self.remaining)
    }

    /// Canonical legacy text using [`DEFAULT_CURRENCY_SYMBOL`].
    pub fn encode(&self) -> String {
        self.encode_with_symbol(DEFAULT_CURRENCY_SYMBOL)
    }

    /// Canonical legacy text.
    ///
    /// ```text
    /// PARTIAL PAYMENT
    /// Amount Paid Today: €30.00
    /// Remaining Balance: €20.00
    ///
    /// Partial Payment Notes: pay friday
    /// ```
    ///
    /// The notes section is omitted when notes are blank.
    pub fn encode_with_symbol(&self, currency_symbol: &str) -> String {
        let mut text = format!(
            "{MARKER_PARTIAL}\n{LABEL_PAID_TODAY}: {currency_symbol}{}\n{LABEL_REMAINING}: {currency_symbol}{}",
            self.paid_today.abs(),
            self.remaining.abs(),
        );

        let notes = self.notes.trim();
        if !notes.is_empty() {
            text.push_str(&format!("\n\n{LABEL_NOTES}: {notes}"));
        }

        text
    }
}

impl From<PartialState> for PartialPayment {
    fn from(state: PartialState) -> Self {
        PartialPayment {
            paid_today: state.paid_today,
            remaining: state.remaining_balance,
            notes: state.notes,
        }
    }
}

/// Payment state of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentState {
    /// Paid in full.
    Full { amount: Money },
    /// Partially paid; the remainder is still owed.
    Partial(PartialPayment),
}

impl PaymentState {
    /// Adapter for sales that only carry the legacy text encoding.
    pub fn from_legacy(annotation: Option<&str>, stored_total: Money) -> Self {
        let state = decode(annotation.unwrap_or(""));
        if state.is_partial {
            PaymentState::Partial(state.into())
        } else {
            PaymentState::Full {
                amount: stored_total,
            }
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, PaymentState::Partial(_))
    }

    pub fn as_partial(&self) -> Option<&PartialPayment> {
        match self {
            PaymentState::Partial(p) => Some(p),
            PaymentState::Full { .. } => None,
        }
    }

    /// Full order value regardless of state. `None` only when a partial
    /// payment's amounts overflow.
    pub fn full_total(&self) -> Option<Money> {
        match self {
            PaymentState::Full { amount } => Some(*amount),
            PaymentState::Partial(p) => p.full_total(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
