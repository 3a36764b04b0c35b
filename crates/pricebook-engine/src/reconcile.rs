//! Reconciliation of split price records and billing term derivation.
//!
//! Reserved prices with an upfront component arrive as two rows
//! sharing a SKU and term code: a one-time `Quantity` row carrying
//! the upfront amount and an `Hrs` row carrying the hourly rate.
//! Rows pair up across the stream in no guaranteed order, so the
//! first half is buffered until its partner shows up.

use std::collections::HashMap;

use regex::Regex;
use std::sync::LazyLock;

use crate::model::{round3, PriceTerm, HOURS_PER_MONTH};
use pricebook_common::{PricebookError, Result};

static UPFRONT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(All|Partial)\s*Upfront").unwrap());
static LEASE_YEARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*yr").unwrap());
// "3 year No Upfront Compute Savings Plan"
static PLAN_FLEET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) year\s+(.*?)\s+Compute Savings Plan").unwrap());
// "3 year Partial Upfront r5 Instance Savings Plan in eu-west-3"
static PLAN_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) year\s+(.*?)\s+(\S+)\s+Instance Savings Plan\s+in\s+(\S+)").unwrap()
});

/// Whether a row belongs to a split (two-row) price record.
pub fn is_split(term_type: &str, purchase_option: &str) -> bool {
    term_type.eq_ignore_ascii_case("Reserved") && UPFRONT.is_match(purchase_option)
}

/// Join key for pairing the halves of a split record.
pub fn join_key(sku: &str, term_code: &str, region: &str) -> String {
    format!("{sku}:{term_code}:{region}")
}

/// Commitment length in months parsed from a lease label such as
/// `3yr` or `1 yr`; zero when absent.
pub fn lease_months(lease: &str) -> f64 {
    LEASE_YEARS
        .captures(lease)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|years| years * 12.0)
        .unwrap_or(0.0)
}

/// The three cost figures of a reconciled price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconciledCost {
    /// One-time upfront payment.
    pub initial: f64,
    /// Effective monthly cost, upfront amortized over the period.
    pub per_month: f64,
    /// Total cost over the whole commitment.
    pub period: f64,
}

/// Cost of a plain single-row price: an hourly rate, optionally over
/// a commitment period.
pub fn single_cost(hourly: f64, period_months: f64) -> ReconciledCost {
    let per_month = round3(hourly * HOURS_PER_MONTH);
    ReconciledCost {
        initial: 0.0,
        per_month,
        period: round3(per_month * period_months.max(1.0)),
    }
}

/// One half of a split record.
#[derive(Debug, Clone, Copy)]
pub struct SplitHalf {
    /// True for the one-time `Quantity` row, false for `Hrs`.
    pub one_time: bool,
    pub amount: f64,
}

/// Merge the two halves of a split record into the final cost.
///
/// `period_months` comes from the term's lease length and is always
/// positive for reserved terms; a zero is clamped to one month to
/// keep the amortization finite.
pub fn reconcile_pair(a: SplitHalf, b: SplitHalf, period_months: f64) -> Result<ReconciledCost> {
    let (upfront, hourly) = match (a.one_time, b.one_time) {
        (true, false) => (a.amount, b.amount),
        (false, true) => (b.amount, a.amount),
        _ => {
            return Err(PricebookError::FeedRow(
                "split record halves have the same billing unit".to_string(),
            ))
        }
    };
    let period = period_months.max(1.0);
    Ok(ReconciledCost {
        initial: round3(upfront),
        per_month: round3(hourly * HOURS_PER_MONTH + upfront / period),
        period: round3(upfront + hourly * period * HOURS_PER_MONTH),
    })
}

/// Build the term describing a tabular row: code from the feed's
/// term code, name assembled from term type, lease length, purchase
/// option and offering class.
pub fn derive_term(
    term_code: &str,
    term_type: &str,
    lease: &str,
    purchase_option: &str,
    offering_class: &str,
) -> PriceTerm {
    let mut term = PriceTerm::new(term_code);
    let mut parts: Vec<String> = vec![term_type.to_string()];
    let lease_compact = lease.replace(' ', "");
    if !lease_compact.is_empty() {
        parts.push(lease_compact);
    }
    // "AllUpfront" and "All Upfront" both occur in the wild.
    let option = purchase_option
        .replace("AllUpfront", "All Upfront")
        .replace("PartialUpfront", "Partial Upfront")
        .replace("NoUpfront", "No Upfront");
    if !option.is_empty() {
        parts.push(option.clone());
    }
    if !offering_class.is_empty() && !offering_class.eq_ignore_ascii_case("standard") {
        parts.push(offering_class.to_string());
    }
    term.name = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    term.period = lease_months(lease);
    term.upfront = UPFRONT.is_match(&option);
    term.reservation = term_type.eq_ignore_ascii_case("Reserved");
    let convertible = offering_class.eq_ignore_ascii_case("convertible");
    term.convertible_type = convertible;
    term.convertible_family = convertible;
    term.convertible_os = convertible;
    term.convertible_location = false;
    term.convertible_engine = false;
    term
}

/// Build the term of a savings plan: code from the plan SKU, name
/// normalized from the vendor description.
///
/// Fleet-wide plans discount any type, family or region; family
/// plans are pinned to one type family in one region.
pub fn savings_plan_term(sku: &str, description: &str, duration_years: u32) -> PriceTerm {
    let mut term = PriceTerm::new(sku);
    let fleet_wide = description.contains("Compute Savings Plan");
    term.name = if fleet_wide {
        PLAN_FLEET
            .replace(description, "Compute Savings Plan, ${1}yr, $2")
            .into_owned()
    } else {
        PLAN_FAMILY
            .replace(description, "Instance Savings Plan, ${1}yr, $2, $3 $4")
            .into_owned()
    };
    term.period = f64::from(duration_years) * 12.0;
    term.upfront = UPFRONT.is_match(description);
    term.reservation = false;
    term.convertible_type = true;
    term.convertible_os = true;
    term.convertible_family = fleet_wide;
    term.convertible_location = fleet_wide;
    term
}

/// The spot market term, shared by every spot price.
pub fn spot_term() -> PriceTerm {
    let mut term = PriceTerm::new("spot");
    term.name = "Spot".to_string();
    term.variable = true;
    term.ephemeral = true;
    term
}

/// Pending-join buffer for split records, owned by one region pass.
#[derive(Debug, Default)]
pub struct PendingJoins<T> {
    entries: HashMap<String, T>,
}

impl<T> PendingJoins<T> {
    pub fn new() -> Self {
        PendingJoins {
            entries: HashMap::new(),
        }
    }

    /// Buffer a half, or take its already-buffered partner out.
    pub fn offer(&mut self, key: String, half: T) -> Option<(T, T)> {
        match self.entries.remove(&key) {
            Some(partner) => Some((partner, half)),
            None => {
                self.entries.insert(key, half);
                None
            }
        }
    }

    /// Entries still waiting for a partner; drained at region end for
    /// orphan accounting.
    pub fn orphans(&self) -> usize {
        self.entries.len()
    }

    pub fn drain_orphans(&mut self) -> impl Iterator<Item = (String, T)> + '_ {
        self.entries.drain()
    }
}
