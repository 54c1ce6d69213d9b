//! Text Analysis Layer
//!
//! Turns ranked OCR readings into card data: the card number and expiration
//! filters, the Luhn validator and the reconciler for repeated reports.

pub mod card_number;
pub mod expiration;
pub mod luhn;
pub mod reconcile;

pub use card_number::{extract_card_number, extract_card_number_with};
pub use expiration::{extract_expiration, extract_expiration_with};
pub use reconcile::{ConfirmedCard, ReconcileMode, ReportReconciler, ReportingSettings};

use serde::{Deserialize, Serialize};

/// Candidates per OCR line the filters look at
pub const DEFAULT_TOP_CANDIDATES: usize = 10;

/// Card data read from one tracked frame; either field may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// 16 ASCII digits, check digit not verified
    pub card_number: Option<String>,
    /// `MM/YY`, `MM/YYYY` or the same without the slash
    pub expiration: Option<String>,
}

impl ExtractionResult {
    /// Whether nothing was read
    pub fn is_empty(&self) -> bool {
        self.card_number.is_none() && self.expiration.is_none()
    }

    /// Luhn check on the card number, `false` when absent
    pub fn has_valid_card_number(&self) -> bool {
        self.card_number.as_deref().is_some_and(luhn::is_valid)
    }
}
