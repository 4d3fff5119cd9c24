//! Rollups over the canonical record set
//!
//! Every function here is a pure, total function over `&[CanonicalRecord]`:
//! the empty slice yields empty (or all-zero) rollups. Sums accumulate in the
//! insertion order of the slice.

use super::normalizer::CanonicalRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimeBucket {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Night => "Night",
            TimeBucket::Morning => "Morning",
            TimeBucket::Afternoon => "Afternoon",
            TimeBucket::Evening => "Evening",
        }
    }

    /// `[0,6)` Night, `[6,12)` Morning, `[12,18)` Afternoon, `[18,24)` Evening
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => TimeBucket::Night,
            6..=11 => TimeBucket::Morning,
            12..=17 => TimeBucket::Afternoon,
            _ => TimeBucket::Evening,
        }
    }

    pub fn hour_range(&self) -> (u32, u32) {
        match self {
            TimeBucket::Night => (0, 6),
            TimeBucket::Morning => (6, 12),
            TimeBucket::Afternoon => (12, 18),
            TimeBucket::Evening => (18, 24),
        }
    }

    /// Fixed display order
    pub fn all() -> [TimeBucket; 4] {
        [
            TimeBucket::Night,
            TimeBucket::Morning,
            TimeBucket::Afternoon,
            TimeBucket::Evening,
        ]
    }

    fn index(&self) -> usize {
        match self {
            TimeBucket::Night => 0,
            TimeBucket::Morning => 1,
            TimeBucket::Afternoon => 2,
            TimeBucket::Evening => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
    pub count: usize,
}

impl CategoryTotal {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Per-category totals in first-appearance order, plus the grand total
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryRollup {
    pub entries: Vec<CategoryTotal>,
    pub grand_total: f64,
}

impl CategoryRollup {
    /// Percentage of the grand total, 0 when the grand total is 0
    pub fn share_of_total(&self, entry: &CategoryTotal) -> f64 {
        if self.grand_total == 0.0 {
            0.0
        } else {
            entry.total / self.grand_total * 100.0
        }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryTotal> {
        self.entries.iter().find(|e| e.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// Ascending by date
pub type DailyRollup = Vec<DailyTotal>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketTotal {
    pub bucket: TimeBucket,
    pub total: f64,
}

/// Always four entries in `TimeBucket::all()` order
pub type TimeBucketRollup = Vec<BucketTotal>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub total: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub num_transactions: usize,
    pub total_income: f64,
    pub total_spending: f64,
    pub net: f64,
    pub avg_transaction: f64,
}

/// One scatter point: x = time of day, y = amount. Coordinates are exact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub id: super::normalizer::RecordId,
    pub date: NaiveDate,
    pub time_of_day: f64,
    pub amount: f64,
    pub category: String,
}

pub fn category_rollup(records: &[CanonicalRecord]) -> CategoryRollup {
    let mut rollup = CategoryRollup::default();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.category.as_str()).or_insert_with(|| {
            rollup.entries.push(CategoryTotal {
                category: record.category.clone(),
                total: 0.0,
                count: 0,
            });
            rollup.entries.len() - 1
        });

        let entry = &mut rollup.entries[slot];
        entry.total += record.amount;
        entry.count += 1;
        rollup.grand_total += record.amount;
    }

    rollup
}

pub fn daily_rollup(records: &[CanonicalRecord]) -> DailyRollup {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for record in records {
        *days.entry(record.date).or_insert(0.0) += record.amount;
    }

    days.into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

pub fn time_bucket_rollup(records: &[CanonicalRecord]) -> TimeBucketRollup {
    let mut totals = [0.0_f64; 4];

    for record in records {
        totals[record.bucket.index()] += record.amount;
    }

    TimeBucket::all()
        .into_iter()
        .map(|bucket| BucketTotal {
            bucket,
            total: totals[bucket.index()],
        })
        .collect()
}

/// Distinct categories, lexicographically ascending
pub fn category_domain(records: &[CanonicalRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.category.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// The canonical set as points, optionally restricted to one category (exact match)
pub fn point_set(records: &[CanonicalRecord], category: Option<&str>) -> Vec<ScatterPoint> {
    records
        .iter()
        .filter(|r| category.map_or(true, |c| r.category == c))
        .map(|r| ScatterPoint {
            id: r.id.clone(),
            date: r.date,
            time_of_day: r.time_of_day(),
            amount: r.amount,
            category: r.category.clone(),
        })
        .collect()
}

/// Totals per non-empty merchant, largest first, ties by first appearance
pub fn merchant_rollup(records: &[CanonicalRecord], limit: usize) -> Vec<MerchantTotal> {
    let mut merchants: Vec<MerchantTotal> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records.iter().filter(|r| !r.merchant.is_empty()) {
        let slot = *index.entry(record.merchant.as_str()).or_insert_with(|| {
            merchants.push(MerchantTotal {
                merchant: record.merchant.clone(),
                total: 0.0,
                count: 0,
            });
            merchants.len() - 1
        });

        merchants[slot].total += record.amount;
        merchants[slot].count += 1;
    }

    // sort_by is stable, so equal totals keep first-appearance order
    merchants.sort_by(|a, b| b.total.total_cmp(&a.total));
    merchants.truncate(limit);
    merchants
}

pub fn spending_summary(records: &[CanonicalRecord]) -> SpendingSummary {
    let mut summary = SpendingSummary {
        num_transactions: records.len(),
        ..Default::default()
    };
    let mut debit_count = 0usize;

    for record in records {
        if record.is_credit {
            summary.total_income += record.amount;
        } else {
            summary.total_spending += record.amount;
            debit_count += 1;
        }
    }

    summary.net = summary.total_income - summary.total_spending;
    if debit_count > 0 {
        summary.avg_transaction = summary.total_spending / debit_count as f64;
    }

    summary
}
