//! Structuring detection: repeated bursts of near-threshold amounts.
//!
//! Reporting thresholds sit just above the bands watched here; repeated
//! 48h windows packed with band amounts on either side of an account are
//! the classic just-under-the-limit pattern. Structuring only labels the
//! account — it never proposes a ring.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use fraudgraph_core::{AccountId, PatternLabel, PatternSet, TransactionGraph};

/// Bands and window thresholds for structuring detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuringConfig {
    /// Inclusive near-threshold amount bands.
    pub bands: Vec<(f64, f64)>,
    /// Sliding window length, in hours.
    pub window_hours: i64,
    /// Band transactions required inside one window.
    pub min_hits_per_window: usize,
    /// Qualifying windows required for the label.
    pub min_windows: usize,
    /// Minimum gap between emitted window starts, in hours.
    pub min_window_gap_hours: i64,
}

impl Default for StructuringConfig {
    fn default() -> Self {
        Self {
            bands: vec![(8000.0, 9999.0), (4000.0, 4999.0)],
            window_hours: 48,
            min_hits_per_window: 5,
            min_windows: 2,
            min_window_gap_hours: 48,
        }
    }
}

/// Label accounts with repeated qualifying near-threshold windows.
pub fn detect_structuring(
    graph: &TransactionGraph,
    config: &StructuringConfig,
) -> BTreeMap<AccountId, PatternSet> {
    let in_band = |amount: f64| {
        config
            .bands
            .iter()
            .any(|&(lo, hi)| amount >= lo && amount <= hi)
    };

    // Band timestamps per account; a transaction counts once per involved
    // account, on either side. Transactions are timestamp-sorted, so the
    // per-account lists are too.
    let mut band_times: BTreeMap<&AccountId, Vec<DateTime<Utc>>> = BTreeMap::new();
    for tx in graph.transactions() {
        if !in_band(tx.amount) {
            continue;
        }
        band_times.entry(&tx.sender).or_default().push(tx.timestamp);
        if tx.receiver != tx.sender {
            band_times
                .entry(&tx.receiver)
                .or_default()
                .push(tx.timestamp);
        }
    }

    let window = Duration::hours(config.window_hours);
    let min_gap = Duration::hours(config.min_window_gap_hours);
    let mut labels = BTreeMap::new();

    for (account, times) in band_times {
        if times.len() < config.min_hits_per_window {
            continue;
        }

        let mut emitted: Vec<DateTime<Utc>> = Vec::new();
        let mut right = 0usize;
        for left in 0..times.len() {
            let w_start = times[left];
            let w_end = w_start + window;
            while right < times.len() && times[right] <= w_end {
                right += 1;
            }
            if right - left >= config.min_hits_per_window {
                let far_enough = emitted
                    .last()
                    .map_or(true, |prev| w_start - *prev >= min_gap);
                if far_enough {
                    emitted.push(w_start);
                }
            }
        }

        if emitted.len() >= config.min_windows {
            let mut set = PatternSet::EMPTY;
            set.insert(PatternLabel::Structuring);
            labels.insert(account.clone(), set);
        }
    }

    labels
}
