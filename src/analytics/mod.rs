//! Analytics Core - pure derivations over the canonical record set
//!
//! # Architecture
//!
//! ```text
//! RawRecord[] (backend JSON)
//!     ↓
//! normalize (drop malformed, default category/merchant, derive day/hour/bucket)
//!     ↓
//! CanonicalRecord[]
//!     ↓
//! ├─ rollup    (category, daily, time-bucket, domain, point set, merchants, summary)
//! ├─ ranking   (top/bottom N, stable)
//! ├─ detector  (mean + kσ threshold, zero-variance override)
//! └─ patterns  (duplicate charges, merchant bursts, weekend and night habits)
//! ```
//!
//! Nothing in this module suspends, allocates shared state, or fails: each
//! function takes an immutable slice and returns a fresh value.

pub mod detector;
pub mod normalizer;
pub mod patterns;
pub mod ranking;
pub mod rollup;

pub use detector::{AnomalyDetector, AnomalyResult};
pub use normalizer::{normalize, CanonicalRecord, RawAmount, RawRecord, RecordId};
pub use patterns::{detect_patterns, DuplicateCharge, MerchantBurst, PatternReport, TimePatterns};
pub use ranking::{rank, RankDirection, RankingEntry};
pub use rollup::{
    category_domain, category_rollup, daily_rollup, merchant_rollup, point_set, spending_summary,
    time_bucket_rollup, CategoryRollup, CategoryTotal, DailyRollup, DailyTotal, MerchantTotal,
    ScatterPoint, SpendingSummary, TimeBucket, TimeBucketRollup,
};
