//! Statistical anomaly detection with a configurable sigma multiplier

use super::normalizer::CanonicalRecord;
use serde::Serialize;

pub const DEFAULT_SIGMA: f64 = 3.0;
pub const TOP_ANOMALIES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub mean: f64,
    pub std_dev: f64,
    pub sigma: f64,
    pub threshold: f64,
    /// Every record above the threshold, not only those in `top`
    pub count: usize,
    pub top: Vec<CanonicalRecord>,
}

impl AnomalyResult {
    /// Human-readable summary. Always quotes the sigma actually applied.
    pub fn explain(&self) -> String {
        if self.count == 0 {
            return format!(
                "No transactions above mean + {}σ ({:.2})",
                self.sigma, self.threshold
            );
        }

        format!(
            "{} transaction{} above mean + {}σ ({:.2}); mean {:.2}, σ {:.2}",
            self.count,
            if self.count == 1 { "" } else { "s" },
            self.sigma,
            self.threshold,
            self.mean,
            self.std_dev
        )
    }
}

pub struct AnomalyDetector {
    sigma: f64,
}

impl AnomalyDetector {
    pub fn new(sigma: f64) -> Self {
        Self { sigma }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SIGMA)
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Flag records whose amount exceeds `mean + sigma * sd`
    ///
    /// # Policy
    /// - `sd` is the sample standard deviation (n - 1)
    /// - Zero variance (fewer than two records, or all amounts equal) flags nothing,
    ///   whatever the raw threshold comparison would give
    /// - Anomalies are reported largest first; ties keep canonical order
    pub fn detect(&self, records: &[CanonicalRecord]) -> AnomalyResult {
        let (mean, std_dev) = mean_and_sample_std_dev(records);
        let threshold = mean + self.sigma * std_dev;

        let mut result = AnomalyResult {
            mean,
            std_dev,
            sigma: self.sigma,
            threshold,
            count: 0,
            top: Vec::new(),
        };

        if std_dev == 0.0 {
            return result;
        }

        let mut anomalies: Vec<&CanonicalRecord> =
            records.iter().filter(|r| r.amount > threshold).collect();
        anomalies.sort_by(|a, b| b.amount.total_cmp(&a.amount));

        result.count = anomalies.len();
        result.top = anomalies
            .into_iter()
            .take(TOP_ANOMALIES)
            .cloned()
            .collect();
        result
    }
}

fn mean_and_sample_std_dev(records: &[CanonicalRecord]) -> (f64, f64) {
    let n = records.len();
    if n == 0 {
        return (0.0, 0.0);
    }

    let mean = records.iter().map(|r| r.amount).sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }

    let variance = records
        .iter()
        .map(|r| (r.amount - mean).powi(2))
        .sum::<f64>()
        / (n - 1) as f64;

    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::normalizer::{normalize, RawAmount, RawRecord, RecordId};

    fn create_test_records(amounts: &[f64]) -> Vec<CanonicalRecord> {
        let raw: Vec<RawRecord> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| RawRecord {
                id: Some(RecordId::Number(i as i64)),
                timestamp: Some("2024-01-05T12:00:00".to_string()),
                amount: Some(RawAmount::Number(*amount)),
                ..Default::default()
            })
            .collect();
        normalize(&raw)
    }

    #[test]
    fn test_all_equal_amounts_flag_nothing() {
        let detector = AnomalyDetector::with_defaults();
        let result = detector.detect(&create_test_records(&[25.0; 12]));

        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.threshold, 25.0);
        assert_eq!(result.count, 0);
        assert!(result.top.is_empty());
    }

    #[test]
    fn test_degenerate_sets() {
        let detector = AnomalyDetector::with_defaults();

        let empty = detector.detect(&[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.threshold, 0.0);

        let single = detector.detect(&create_test_records(&[500.0]));
        assert_eq!(single.count, 0);
        assert_eq!(single.mean, 500.0);
    }

    #[test]
    fn test_dominant_outlier_flagged() {
        let mut amounts = vec![10.0; 20];
        amounts.push(1000.0);

        let result = AnomalyDetector::with_defaults().detect(&create_test_records(&amounts));

        assert_eq!(result.count, 1);
        assert_eq!(result.top.len(), 1);
        assert_eq!(result.top[0].amount, 1000.0);
        assert!(result.threshold < 1000.0);
    }

    #[test]
    fn test_five_point_outlier_needs_lower_sigma() {
        // With five samples the largest reachable z-score is 4/sqrt(5) ≈ 1.79
        let records = create_test_records(&[10.0, 10.0, 10.0, 10.0, 1000.0]);

        assert_eq!(AnomalyDetector::with_defaults().detect(&records).count, 0);

        let result = AnomalyDetector::new(1.5).detect(&records);
        assert_eq!(result.count, 1);
        assert_eq!(result.top[0].amount, 1000.0);
    }

    #[test]
    fn test_top_capped_at_three_sorted_descending() {
        let mut amounts = vec![1.0; 200];
        amounts.extend([500.0, 900.0, 700.0, 800.0]);

        let result = AnomalyDetector::with_defaults().detect(&create_test_records(&amounts));

        assert_eq!(result.count, 4);
        let top: Vec<f64> = result.top.iter().map(|r| r.amount).collect();
        assert_eq!(top, vec![900.0, 800.0, 700.0]);
    }

    #[test]
    fn test_sample_std_dev() {
        let records = create_test_records(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let (mean, sd) = mean_and_sample_std_dev(&records);
        assert_eq!(mean, 5.0);
        assert!((sd - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_explain_quotes_sigma_used() {
        let records = create_test_records(&[10.0, 10.0, 10.0, 10.0, 1000.0]);

        let text = AnomalyDetector::new(1.5).detect(&records).explain();
        assert!(text.starts_with("1 transaction above mean + 1.5σ"), "{}", text);

        let text = AnomalyDetector::with_defaults().detect(&records).explain();
        assert!(text.contains("mean + 3σ"), "{}", text);
    }
}
