//! Recompute orchestrator - owns the canonical set and derives every view from it
//!
//! ## Architecture
//!
//! ```text
//! CanonicalRecord[] (replaced wholesale)   RankDirection   category filter
//!          └──────────────┬──────────────────────┴──────────────┘
//!                         ↓
//!            DashboardEngine::recompute()
//!                         ↓
//! category → daily → time buckets → domain + points → ranking → anomalies
//!          → patterns → merchants + summary
//!                         ↓
//!               Arc<DashboardViews>
//! ```
//!
//! The engine never recomputes partially: any input change rebuilds the whole
//! bundle, and the bundle is only handed out as an immutable `Arc`.

use crate::analytics::detector::{AnomalyDetector, AnomalyResult, DEFAULT_SIGMA};
use crate::analytics::normalizer::CanonicalRecord;
use crate::analytics::patterns::{detect_patterns, PatternReport};
use crate::analytics::ranking::{rank, RankDirection, RankingEntry, DEFAULT_RANKING_LIMIT};
use crate::analytics::rollup::{
    category_domain, category_rollup, daily_rollup, merchant_rollup, point_set, spending_summary,
    time_bucket_rollup, CategoryRollup, DailyRollup, MerchantTotal, ScatterPoint, SpendingSummary,
    TimeBucketRollup,
};
use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_MERCHANT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub ranking_limit: usize,
    pub merchant_limit: usize,
    pub anomaly_sigma: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ranking_limit: DEFAULT_RANKING_LIMIT,
            merchant_limit: DEFAULT_MERCHANT_LIMIT,
            anomaly_sigma: DEFAULT_SIGMA,
        }
    }
}

/// Every view model derived from one canonical set
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardViews {
    pub record_count: usize,
    pub categories: CategoryRollup,
    pub daily: DailyRollup,
    pub time_buckets: TimeBucketRollup,
    pub category_domain: Vec<String>,
    pub category_filter: Option<String>,
    pub points: Vec<ScatterPoint>,
    pub ranking_direction: RankDirection,
    pub ranking: Vec<RankingEntry>,
    pub anomalies: AnomalyResult,
    pub patterns: PatternReport,
    pub merchants: Vec<MerchantTotal>,
    pub summary: SpendingSummary,
}

pub struct DashboardEngine {
    settings: EngineSettings,
    detector: AnomalyDetector,

    records: Arc<Vec<CanonicalRecord>>,
    direction: RankDirection,
    category_filter: Option<String>,

    views: Arc<DashboardViews>,
}

impl DashboardEngine {
    pub fn new(settings: EngineSettings) -> Self {
        let mut engine = Self {
            settings,
            detector: AnomalyDetector::new(settings.anomaly_sigma),
            records: Arc::new(Vec::new()),
            direction: RankDirection::default(),
            category_filter: None,
            views: Arc::new(DashboardViews::default()),
        };
        engine.recompute();
        engine
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Replace the canonical set. The category filter and ranking direction survive.
    pub fn install(&mut self, records: Vec<CanonicalRecord>) {
        self.records = Arc::new(records);
        self.recompute();
    }

    pub fn set_direction(&mut self, direction: RankDirection) {
        if self.direction != direction {
            self.direction = direction;
            self.recompute();
        }
    }

    pub fn toggle_direction(&mut self) {
        self.set_direction(self.direction.toggled());
    }

    pub fn direction(&self) -> RankDirection {
        self.direction
    }

    /// Restrict the point set to one category (exact match), or `None` for all
    pub fn set_category_filter(&mut self, filter: Option<String>) {
        if self.category_filter != filter {
            self.category_filter = filter;
            self.recompute();
        }
    }

    /// All → first category → ... → last category → All
    pub fn cycle_category_filter(&mut self) {
        let domain = &self.views.category_domain;
        let next = match &self.category_filter {
            None => domain.first().cloned(),
            Some(current) => domain
                .iter()
                .position(|c| c == current)
                .and_then(|i| domain.get(i + 1))
                .cloned(),
        };
        self.set_category_filter(next);
    }

    pub fn category_filter(&self) -> Option<&str> {
        self.category_filter.as_deref()
    }

    pub fn records(&self) -> Arc<Vec<CanonicalRecord>> {
        Arc::clone(&self.records)
    }

    pub fn views(&self) -> Arc<DashboardViews> {
        Arc::clone(&self.views)
    }

    fn recompute(&mut self) {
        let records = self.records.as_slice();

        let categories = category_rollup(records);
        let daily = daily_rollup(records);
        let time_buckets = time_bucket_rollup(records);
        let domain = category_domain(records);
        let points = point_set(records, self.category_filter.as_deref());
        let ranking = rank(records, self.direction, self.settings.ranking_limit);
        let anomalies = self.detector.detect(records);
        let patterns = detect_patterns(records);
        let merchants = merchant_rollup(records, self.settings.merchant_limit);
        let summary = spending_summary(records);

        log::debug!(
            "Recomputed: {} records, {} categories, {} days, {} points, {} anomalies, {} flags",
            records.len(),
            categories.entries.len(),
            daily.len(),
            points.len(),
            anomalies.count,
            patterns.flag_count()
        );

        self.views = Arc::new(DashboardViews {
            record_count: records.len(),
            categories,
            daily,
            time_buckets,
            category_domain: domain,
            category_filter: self.category_filter.clone(),
            points,
            ranking_direction: self.direction,
            ranking,
            anomalies,
            patterns,
            merchants,
            summary,
        });
    }
}

impl Default for DashboardEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}
