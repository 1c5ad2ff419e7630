//! Velocity and variance signals.
//!
//! These are supporting signals, not ring detectors: rapid in-out turnover,
//! 24h bursts, suspiciously uniform amounts, and the high-degree commercial
//! hubs that suppression later consults. An account carrying only these
//! signals is never flagged on its own.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use fraudgraph_core::{
    coefficient_of_variation, AccountId, AdaptiveStats, PatternLabel, PatternSet,
    TransactionGraph,
};

/// Thresholds for the velocity, variance, and hub signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Tier 1: inbound re-transmitted within this many hours.
    pub reship_window_hours: i64,
    /// Tier 2: sliding window length in hours.
    pub burst_window_hours: i64,
    /// Tier 2: events required inside one window.
    pub burst_min_events: usize,
    /// CV below which amounts count as low-variance.
    pub low_variance_cv: f64,
    /// Hub: minimum total degree.
    pub hub_min_degree: usize,
    /// Hub: minimum activity span as a fraction of the dataset span.
    pub hub_min_span_ratio: f64,
    /// Hub: minimum amount CV (hubs have varied amounts, mules do not).
    pub hub_min_cv: f64,
    /// Hub: maximum inter-event gap as a fraction of the dataset span.
    pub hub_max_gap_ratio: f64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            reship_window_hours: 1,
            burst_window_hours: 24,
            burst_min_events: 5,
            low_variance_cv: 0.2,
            hub_min_degree: 50,
            hub_min_span_ratio: 0.70,
            hub_min_cv: 0.5,
            hub_max_gap_ratio: 0.25,
        }
    }
}

/// Output of the velocity stage. The tier sets feed the scoring bonus; the
/// hub set feeds suppression only.
#[derive(Debug, Default)]
pub struct VelocitySignals {
    /// Tier 1: inbound followed by an outbound within the re-ship window.
    pub velocity: BTreeSet<AccountId>,
    /// Tier 2: 5+ events in some 24h window.
    pub velocity_24h: BTreeSet<AccountId>,
    /// Accounts whose amounts vary by less than the CV floor.
    pub low_variance: BTreeSet<AccountId>,
    /// High-degree commercial hubs; suppression candidates, never labeled.
    pub commercial_hubs: BTreeSet<AccountId>,
    /// Labels for the three labeled signals.
    pub labels: BTreeMap<AccountId, PatternSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Direction {
    // Out sorts before In so that an outbound at the same instant as an
    // inbound is not counted as "after" it.
    Out,
    In,
}

/// Detect the velocity, low-variance, and commercial-hub signals.
pub fn detect_velocity(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    config: &VelocityConfig,
) -> VelocitySignals {
    let mut signals = VelocitySignals::default();

    // Per-account event timeline: every transaction contributes one out
    // event at the sender and one in event at the receiver. Ordering is
    // (timestamp, out-before-in, ingest index).
    let mut events: BTreeMap<&AccountId, Vec<(DateTime<Utc>, Direction, usize)>> =
        BTreeMap::new();
    let mut amounts: BTreeMap<&AccountId, Vec<f64>> = BTreeMap::new();
    for (idx, tx) in graph.transactions().iter().enumerate() {
        events
            .entry(&tx.sender)
            .or_default()
            .push((tx.timestamp, Direction::Out, idx));
        events
            .entry(&tx.receiver)
            .or_default()
            .push((tx.timestamp, Direction::In, idx));
        amounts.entry(&tx.sender).or_default().push(tx.amount);
        amounts.entry(&tx.receiver).or_default().push(tx.amount);
    }
    for timeline in events.values_mut() {
        timeline.sort();
    }

    let reship_window = Duration::hours(config.reship_window_hours);
    let burst_window = Duration::hours(config.burst_window_hours);

    for (account, timeline) in &events {
        let in_positions: Vec<usize> = timeline
            .iter()
            .enumerate()
            .filter(|(_, e)| e.1 == Direction::In)
            .map(|(i, _)| i)
            .collect();
        let out_positions: Vec<usize> = timeline
            .iter()
            .enumerate()
            .filter(|(_, e)| e.1 == Direction::Out)
            .map(|(i, _)| i)
            .collect();

        // Tier 1: for each inbound, the next outbound at a strictly later
        // position; flag when the gap is inside the re-ship window.
        let mut out_ptr = 0usize;
        for &in_pos in &in_positions {
            while out_ptr < out_positions.len() && out_positions[out_ptr] <= in_pos {
                out_ptr += 1;
            }
            let Some(&out_pos) = out_positions.get(out_ptr) else {
                break;
            };
            if timeline[out_pos].0 - timeline[in_pos].0 <= reship_window {
                signals.velocity.insert((*account).clone());
                signals
                    .labels
                    .entry((*account).clone())
                    .or_default()
                    .insert(PatternLabel::HighVelocity);
                break;
            }
        }

        // Tier 2: any window of burst_window_hours holding enough events.
        if timeline.len() >= config.burst_min_events {
            let times: Vec<DateTime<Utc>> = timeline.iter().map(|e| e.0).collect();
            for i in 0..times.len() {
                let end = times[i] + burst_window;
                let upper = times.partition_point(|t| *t <= end);
                if upper - i >= config.burst_min_events {
                    signals.velocity_24h.insert((*account).clone());
                    signals
                        .labels
                        .entry((*account).clone())
                        .or_default()
                        .insert(PatternLabel::HighVelocity24h);
                    break;
                }
            }
        }
    }

    for (account, values) in &amounts {
        if values.len() < 2 {
            continue;
        }
        if coefficient_of_variation(values) < config.low_variance_cv {
            signals.low_variance.insert((*account).clone());
            signals
                .labels
                .entry((*account).clone())
                .or_default()
                .insert(PatternLabel::LowVariance);
        }
    }

    detect_commercial_hubs(graph, stats, config, &events, &amounts, &mut signals);
    signals
}

/// Commercial hubs: very high degree, active across most of the dataset
/// span, varied amounts, and no long dormancy. These look structurally
/// suspicious but behave like businesses; suppression consults this set.
fn detect_commercial_hubs(
    graph: &TransactionGraph,
    stats: &AdaptiveStats,
    config: &VelocityConfig,
    events: &BTreeMap<&AccountId, Vec<(DateTime<Utc>, Direction, usize)>>,
    amounts: &BTreeMap<&AccountId, Vec<f64>>,
    signals: &mut VelocitySignals,
) {
    let dataset_span = stats.time_span_secs;
    if dataset_span <= 0.0 {
        return;
    }

    for account in graph.accounts() {
        if graph.degree(account) <= config.hub_min_degree {
            continue;
        }
        let Some(timeline) = events.get(account) else {
            continue;
        };
        let first = timeline.first().expect("hub has events").0;
        let last = timeline.last().expect("hub has events").0;
        let activity_span = (last - first).num_milliseconds() as f64 / 1000.0;
        if activity_span < config.hub_min_span_ratio * dataset_span {
            continue;
        }

        let Some(values) = amounts.get(account) else {
            continue;
        };
        if values.len() < 2 {
            continue;
        }
        if coefficient_of_variation(values) < config.hub_min_cv {
            continue;
        }

        let max_gap = timeline
            .windows(2)
            .map(|w| (w[1].0 - w[0].0).num_milliseconds() as f64 / 1000.0)
            .fold(0.0f64, f64::max);
        if timeline.len() > 1 && max_gap > config.hub_max_gap_ratio * dataset_span {
            continue;
        }

        signals.commercial_hubs.insert(account.clone());
    }
}
