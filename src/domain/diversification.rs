//! Sector diversification when several signals compete for free slots.

use std::collections::HashMap;

use crate::domain::signal::Signal;

pub const DEFAULT_MAX_PER_SECTOR: usize = 2;

/// Chooses which candidates to open. `candidates` arrive best first;
/// `open_sectors` has one entry per already-open position.
pub trait SectorSelector {
    fn select(
        &self,
        candidates: &[Signal],
        capacity: usize,
        open_sectors: &[&str],
    ) -> Vec<Signal>;
}

/// Admits candidates in order while their sector holds fewer than
/// `max_per_sector` positions, counting open positions and earlier picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorCapSelector {
    pub max_per_sector: usize,
}

impl Default for SectorCapSelector {
    fn default() -> Self {
        SectorCapSelector {
            max_per_sector: DEFAULT_MAX_PER_SECTOR,
        }
    }
}

impl SectorSelector for SectorCapSelector {
    fn select(
        &self,
        candidates: &[Signal],
        capacity: usize,
        open_sectors: &[&str],
    ) -> Vec<Signal> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for sector in open_sectors {
            *counts.entry(*sector).or_default() += 1;
        }

        let mut picks = Vec::new();
        for candidate in candidates {
            if picks.len() >= capacity {
                break;
            }
            let count = counts.entry(candidate.sector.as_str()).or_default();
            if *count < self.max_per_sector {
                *count += 1;
                picks.push(candidate.clone());
            }
        }
        picks
    }
}

/// Score descending, ticker ascending on ties.
pub fn rank_candidates(candidates: &mut [Signal]) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ticker.cmp(&b.ticker)));
}
