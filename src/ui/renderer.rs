// Renderer module - formatting utilities and the scatter jitter adapter
// Layout code lives in layout.rs; nothing here draws.

use crate::analytics::normalizer::RecordId;
use crate::analytics::rollup::ScatterPoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Horizontal jitter, in hours, applied to scatter points
pub const JITTER_SPREAD: f64 = 0.15;

/// Format a money amount for display
pub fn format_amount(amount: f64) -> String {
    format!("{:.2}", amount)
}

/// Format a percentage for display
pub fn format_percent(share: f64) -> String {
    format!("{:.1}%", share)
}

/// Truncate to `width` characters, marking the cut with '…'
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Maps exact scatter points to plotted coordinates.
///
/// Each record gets one random x offset the first time it is seen and keeps it
/// across redraws, so points do not dance between frames. The y value is never
/// changed; the views keep the exact coordinates.
pub struct ScatterAdapter {
    offsets: HashMap<RecordId, f64>,
    rng: StdRng,
}

impl ScatterAdapter {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            offsets: HashMap::new(),
            rng,
        }
    }

    /// Plot coordinates, in the same order as `points`
    pub fn plot(&mut self, points: &[ScatterPoint]) -> Vec<(f64, f64)> {
        let present: HashSet<&RecordId> = points.iter().map(|p| &p.id).collect();
        self.offsets.retain(|id, _| present.contains(id));

        points
            .iter()
            .map(|point| {
                let rng = &mut self.rng;
                let offset = *self
                    .offsets
                    .entry(point.id.clone())
                    .or_insert_with(|| rng.gen_range(-JITTER_SPREAD..=JITTER_SPREAD));
                ((point.time_of_day + offset).clamp(0.0, 24.0), point.amount)
            })
            .collect()
    }

    pub fn tracked(&self) -> usize {
        self.offsets.len()
    }
}

impl Default for ScatterAdapter {
    fn default() -> Self {
        Self::new()
    }
}
