//! Rule-based spending patterns: duplicate charges, same-merchant bursts and
//! time-of-week habits
//!
//! These complement the statistical detector. Each rule is a pure function over
//! the canonical set; `detect_patterns` bundles their results for the engine.

use super::normalizer::{CanonicalRecord, RecordId};
use super::rollup::TimeBucket;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Two charges closer than this in amount count as the same amount
pub const DUPLICATE_AMOUNT_TOLERANCE: f64 = 0.01;
/// Two charges closer than this in time may be a duplicate
pub const DUPLICATE_WINDOW_SECS: i64 = 24 * 60 * 60;
/// More charges than this at one merchant on one day is a burst
pub const MAX_DAILY_MERCHANT_CHARGES: usize = 3;
/// Weekend spending per day must exceed weekday spending per day by this factor
pub const WEEKEND_RATIO: f64 = 1.2;
/// More night transactions than this is worth calling out
pub const MAX_NIGHT_TRANSACTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCharge {
    /// The earlier of the two charges
    pub original: RecordId,
    /// The later charge, which is the suspected duplicate
    pub record: CanonicalRecord,
    pub gap_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantBurst {
    pub date: NaiveDate,
    pub merchant: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimePatterns {
    pub weekend_total: f64,
    pub weekday_total: f64,
    pub weekend_days: usize,
    pub weekday_days: usize,
    pub night_count: usize,
    pub night_total: f64,
}

impl TimePatterns {
    pub fn weekend_daily_avg(&self) -> f64 {
        if self.weekend_days == 0 {
            return 0.0;
        }
        self.weekend_total / self.weekend_days as f64
    }

    pub fn weekday_daily_avg(&self) -> f64 {
        if self.weekday_days == 0 {
            return 0.0;
        }
        self.weekday_total / self.weekday_days as f64
    }

    /// Percent by which weekend days out-spend weekdays, when above `WEEKEND_RATIO`.
    /// Needs at least one day of each kind.
    pub fn weekend_premium(&self) -> Option<f64> {
        if self.weekend_days == 0 || self.weekday_days == 0 {
            return None;
        }
        let weekend = self.weekend_daily_avg();
        let weekday = self.weekday_daily_avg();
        if weekday <= 0.0 || weekend <= weekday * WEEKEND_RATIO {
            return None;
        }
        Some((weekend / weekday - 1.0) * 100.0)
    }

    pub fn late_night_flagged(&self) -> bool {
        self.night_count > MAX_NIGHT_TRANSACTIONS
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternReport {
    pub duplicates: Vec<DuplicateCharge>,
    pub bursts: Vec<MerchantBurst>,
    pub time: TimePatterns,
}

impl PatternReport {
    /// Number of individual findings, counting each time-pattern flag once
    pub fn flag_count(&self) -> usize {
        self.duplicates.len()
            + self.bursts.len()
            + usize::from(self.time.weekend_premium().is_some())
            + usize::from(self.time.late_night_flagged())
    }

    /// One line per finding, duplicates first
    pub fn insights(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for duplicate in &self.duplicates {
            lines.push(format!(
                "Possible duplicate: {} {:.2} charged again after {}h{:02}m",
                duplicate.record.merchant,
                duplicate.record.amount,
                duplicate.gap_minutes / 60,
                duplicate.gap_minutes % 60
            ));
        }

        for burst in &self.bursts {
            lines.push(format!(
                "{} charges at {} on {}",
                burst.count, burst.merchant, burst.date
            ));
        }

        if let Some(premium) = self.time.weekend_premium() {
            lines.push(format!(
                "Weekend spending {:.0}% above weekdays ({:.2}/day vs {:.2}/day)",
                premium,
                self.time.weekend_daily_avg(),
                self.time.weekday_daily_avg()
            ));
        }

        if self.time.late_night_flagged() {
            lines.push(format!(
                "{} late-night transactions (00:00-06:00) totaling {:.2}",
                self.time.night_count, self.time.night_total
            ));
        }

        lines
    }
}

/// Flag a charge that repeats the previous charge (in time order) at the same
/// merchant for the same amount within 24 hours
///
/// Records without a merchant never match. Equal timestamps keep canonical order.
pub fn detect_duplicates(records: &[CanonicalRecord]) -> Vec<DuplicateCharge> {
    let mut order: Vec<&CanonicalRecord> = records.iter().collect();
    order.sort_by_key(|r| r.occurred_at);

    order
        .windows(2)
        .filter_map(|pair| {
            let (earlier, later) = (pair[0], pair[1]);
            if earlier.merchant.is_empty() || earlier.merchant != later.merchant {
                return None;
            }
            if (earlier.amount - later.amount).abs() >= DUPLICATE_AMOUNT_TOLERANCE {
                return None;
            }
            let gap = later.occurred_at - earlier.occurred_at;
            if gap.num_seconds() >= DUPLICATE_WINDOW_SECS {
                return None;
            }
            Some(DuplicateCharge {
                original: earlier.id.clone(),
                record: later.clone(),
                gap_minutes: gap.num_minutes(),
            })
        })
        .collect()
}

/// Merchants charged more than `MAX_DAILY_MERCHANT_CHARGES` times on one day,
/// ordered by date then merchant
pub fn detect_merchant_bursts(records: &[CanonicalRecord]) -> Vec<MerchantBurst> {
    let mut counts: BTreeMap<(NaiveDate, &str), usize> = BTreeMap::new();
    for record in records.iter().filter(|r| !r.merchant.is_empty()) {
        *counts.entry((record.date, record.merchant.as_str())).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > MAX_DAILY_MERCHANT_CHARGES)
        .map(|((date, merchant), count)| MerchantBurst {
            date,
            merchant: merchant.to_string(),
            count,
        })
        .collect()
}

/// Weekend vs weekday spending per active day, and night-time activity
///
/// Weekend figures use debits only. Night counts every record in the Night bucket.
pub fn time_patterns(records: &[CanonicalRecord]) -> TimePatterns {
    let mut patterns = TimePatterns::default();
    let mut weekend_dates = HashSet::new();
    let mut weekday_dates = HashSet::new();

    for record in records {
        if !record.is_credit {
            if matches!(record.date.weekday(), Weekday::Sat | Weekday::Sun) {
                patterns.weekend_total += record.amount;
                weekend_dates.insert(record.date);
            } else {
                patterns.weekday_total += record.amount;
                weekday_dates.insert(record.date);
            }
        }

        if record.bucket == TimeBucket::Night {
            patterns.night_count += 1;
            patterns.night_total += record.amount;
        }
    }

    patterns.weekend_days = weekend_dates.len();
    patterns.weekday_days = weekday_dates.len();
    patterns
}

pub fn detect_patterns(records: &[CanonicalRecord]) -> PatternReport {
    PatternReport {
        duplicates: detect_duplicates(records),
        bursts: detect_merchant_bursts(records),
        time: time_patterns(records),
    }
}
