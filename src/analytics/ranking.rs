//! Top-N selection by amount

use super::normalizer::CanonicalRecord;
use serde::Serialize;

pub const DEFAULT_RANKING_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RankDirection {
    #[default]
    Highest,
    Lowest,
}

impl RankDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankDirection::Highest => "Highest",
            RankDirection::Lowest => "Lowest",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            RankDirection::Highest => RankDirection::Lowest,
            RankDirection::Lowest => RankDirection::Highest,
        }
    }
}

/// A record selected into a top-N list, with its position in the canonical set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub position: usize,
    pub record: CanonicalRecord,
}

/// Select the first `limit` records by amount.
///
/// The sort is stable: equal amounts keep their canonical-set order, so
/// repeated calls on an unchanged set return identical lists.
pub fn rank(
    records: &[CanonicalRecord],
    direction: RankDirection,
    limit: usize,
) -> Vec<RankingEntry> {
    let mut order: Vec<usize> = (0..records.len()).collect();

    match direction {
        RankDirection::Highest => {
            order.sort_by(|&a, &b| records[b].amount.total_cmp(&records[a].amount))
        }
        RankDirection::Lowest => {
            order.sort_by(|&a, &b| records[a].amount.total_cmp(&records[b].amount))
        }
    }

    order
        .into_iter()
        .take(limit)
        .map(|position| RankingEntry {
            position,
            record: records[position].clone(),
        })
        .collect()
}
