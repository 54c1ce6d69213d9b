//! Reconciliation of repeated extraction reports
//!
//! While a card stays tracked, every frame produces an independent extraction
//! attempt, and attempts may finish out of order with different OCR readings.
//! The reconciler lives with whoever consumes reports and decides when one
//! reading is trustworthy enough to act on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::luhn;
use crate::analysis::ExtractionResult;

/// How competing card number readings are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// The first reported number wins
    FirstMatch,
    /// A number wins once it has been read `min_votes` times
    #[default]
    Majority,
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingSettings {
    /// Resolution strategy
    pub policy: ReconcileMode,
    /// Readings required before a number is confirmed (majority only)
    pub min_votes: usize,
    /// Ignore numbers that fail the Luhn check
    pub require_valid_checksum: bool,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            policy: ReconcileMode::Majority,
            min_votes: 2,
            require_valid_checksum: true,
        }
    }
}

/// A card number the reconciler has settled on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedCard {
    pub card_number: String,
    /// Most frequently read expiration among reports agreeing on the number
    pub expiration: Option<String>,
    /// Reports that agreed on the number
    pub votes: usize,
    pub checksum_valid: bool,
}

#[derive(Debug, Default)]
struct Tally {
    number: String,
    votes: usize,
    /// (expiration, count) in first-seen order
    expirations: Vec<(String, usize)>,
}

impl Tally {
    fn add_expiration(&mut self, expiration: &str) {
        match self.expirations.iter_mut().find(|(e, _)| e == expiration) {
            Some((_, count)) => *count += 1,
            None => self.expirations.push((expiration.to_string(), 1)),
        }
    }

    /// Most common expiration, earliest seen on ties
    fn best_expiration(&self) -> Option<String> {
        self.expirations
            .iter()
            .fold(None::<&(String, usize)>, |best, entry| match best {
                Some(b) if b.1 >= entry.1 => Some(b),
                _ => Some(entry),
            })
            .map(|(e, _)| e.clone())
    }
}

/// Accumulates extraction results until one card number is confirmed
#[derive(Debug)]
pub struct ReportReconciler {
    settings: ReportingSettings,
    tallies: Vec<Tally>,
    confirmed: Option<ConfirmedCard>,
    reports_seen: usize,
}

impl ReportReconciler {
    pub fn new(settings: ReportingSettings) -> Self {
        Self {
            settings,
            tallies: Vec::new(),
            confirmed: None,
            reports_seen: 0,
        }
    }

    /// The settled card, if any
    pub fn confirmed(&self) -> Option<&ConfirmedCard> {
        self.confirmed.as_ref()
    }

    pub fn reports_seen(&self) -> usize {
        self.reports_seen
    }

    /// Forget everything, e.g. when a new card is presented
    pub fn reset(&mut self) {
        self.tallies.clear();
        self.confirmed = None;
        self.reports_seen = 0;
    }

    /// Feed one extraction result. Returns the card at the moment it becomes
    /// confirmed; later reports are ignored until [`reset`](Self::reset).
    pub fn observe(&mut self, result: &ExtractionResult) -> Option<ConfirmedCard> {
        if self.confirmed.is_some() {
            return None;
        }
        self.reports_seen += 1;

        let number = result.card_number.as_deref()?;
        let checksum_valid = luhn::is_valid(number);
        if self.settings.require_valid_checksum && !checksum_valid {
            debug!("Ignoring reading {} with bad check digit", luhn::mask(number));
            return None;
        }

        let index = match self.tallies.iter().position(|t| t.number == number) {
            Some(index) => index,
            None => {
                self.tallies.push(Tally {
                    number: number.to_string(),
                    ..Default::default()
                });
                self.tallies.len() - 1
            }
        };

        let tally = &mut self.tallies[index];
        tally.votes += 1;
        if let Some(expiration) = &result.expiration {
            tally.add_expiration(expiration);
        }

        let required = match self.settings.policy {
            ReconcileMode::FirstMatch => 1,
            ReconcileMode::Majority => self.settings.min_votes.max(1),
        };
        if tally.votes < required {
            return None;
        }

        let card = ConfirmedCard {
            card_number: tally.number.clone(),
            expiration: tally.best_expiration(),
            votes: tally.votes,
            checksum_valid,
        };
        info!(
            "Confirmed card {} after {} readings ({} reports)",
            luhn::mask(&card.card_number),
            card.votes,
            self.reports_seen
        );
        self.confirmed = Some(card.clone());
        Some(card)
    }
}
