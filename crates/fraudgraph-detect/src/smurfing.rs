//! Smurfing detection: sliding-window candidate extraction around a
//! collection hub, followed by five-factor soft scoring.
//!
//! A hub that receives from many distinct senders inside a 72h window is a
//! candidate; the window's outbound fan decides how much of the classic
//! collect-and-forward shape is present. Candidates clear a combined score
//! threshold instead of hard per-factor gates.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use fraudgraph_core::{
    coefficient_of_variation, median, round1, AccountId, CandidateKind, CandidateRing,
    PatternLabel, PatternSet, TransactionGraph,
};

use crate::immunity::ImmunityMap;

/// Windows and thresholds for smurfing detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmurfConfig {
    /// Inbound collection window, in hours.
    pub window_hours: i64,
    /// Extra hours after the window during which outbound counts.
    pub outbound_buffer_hours: i64,
    /// Distinct inbound senders required inside one window.
    pub min_unique_senders: usize,
    /// Hard cap on ring membership.
    pub max_ring_size: usize,
    /// Minimum combined factor score (out of 5.0).
    pub min_combined_score: f64,
    /// Minimum ring size after immunity exclusion and capping.
    pub min_ring_size: usize,
}

impl Default for SmurfConfig {
    fn default() -> Self {
        Self {
            window_hours: 72,
            outbound_buffer_hours: 24,
            min_unique_senders: 5,
            max_ring_size: 15,
            min_combined_score: 4.0,
            min_ring_size: 4,
        }
    }
}

/// Output of smurfing detection.
#[derive(Debug, Default)]
pub struct SmurfDetection {
    /// Accepted smurfing candidate rings, in hub order.
    pub candidates: Vec<CandidateRing>,
    /// Labels: hub {smurfing, fan_in}; inbound peers {fan_in}; outbound
    /// peers {fan_out}.
    pub labels: BTreeMap<AccountId, PatternSet>,
}

#[derive(Debug, Clone, Copy)]
struct WindowTx<'a> {
    ts: DateTime<Utc>,
    amount: f64,
    peer: &'a AccountId,
}

struct SmurfWindow<'a> {
    hub: &'a AccountId,
    in_txns: Vec<WindowTx<'a>>,
    out_txns: Vec<WindowTx<'a>>,
}

/// Detect smurfing rings.
pub fn detect_smurfing(
    graph: &TransactionGraph,
    immunity: &ImmunityMap,
    config: &SmurfConfig,
) -> SmurfDetection {
    let windows = extract_windows(graph, config);
    score_windows(graph, immunity, config, windows)
}

/// One candidate window per hub: the first 72h inbound window with enough
/// distinct senders. Immune hubs are extracted too; immunity is applied to
/// membership and during suppression, never to extraction.
fn extract_windows<'a>(
    graph: &'a TransactionGraph,
    config: &SmurfConfig,
) -> Vec<SmurfWindow<'a>> {
    let window = Duration::hours(config.window_hours);
    let buffer = Duration::hours(config.outbound_buffer_hours);
    let mut windows = Vec::new();

    for hub in graph.accounts() {
        let mut in_txns: Vec<(WindowTx<'a>, usize)> = graph
            .incoming_by_peer(hub)
            .flat_map(|(peer, edges)| {
                edges.iter().map(move |&idx| {
                    let tx = graph.tx(idx);
                    (
                        WindowTx {
                            ts: tx.timestamp,
                            amount: tx.amount,
                            peer,
                        },
                        idx,
                    )
                })
            })
            .collect();
        if in_txns.len() < config.min_unique_senders {
            continue;
        }
        in_txns.sort_by_key(|(t, idx)| (t.ts, *idx));
        let in_txns: Vec<WindowTx<'a>> = in_txns.into_iter().map(|(t, _)| t).collect();

        let mut out_txns: Vec<(WindowTx<'a>, usize)> = graph
            .outgoing_by_peer(hub)
            .flat_map(|(peer, edges)| {
                edges.iter().map(move |&idx| {
                    let tx = graph.tx(idx);
                    (
                        WindowTx {
                            ts: tx.timestamp,
                            amount: tx.amount,
                            peer,
                        },
                        idx,
                    )
                })
            })
            .collect();
        out_txns.sort_by_key(|(t, idx)| (t.ts, *idx));
        let out_txns: Vec<WindowTx<'a>> = out_txns.into_iter().map(|(t, _)| t).collect();

        let mut right = 0usize;
        for left in 0..in_txns.len() {
            let w_start = in_txns[left].ts;
            let w_end = w_start + window;
            while right < in_txns.len() && in_txns[right].ts <= w_end {
                right += 1;
            }
            let slice = &in_txns[left..right];
            let unique: BTreeSet<&AccountId> = slice.iter().map(|t| t.peer).collect();
            if unique.len() >= config.min_unique_senders {
                let out_slice: Vec<WindowTx<'a>> = out_txns
                    .iter()
                    .filter(|t| t.ts >= w_start && t.ts <= w_end + buffer)
                    .copied()
                    .collect();
                windows.push(SmurfWindow {
                    hub,
                    in_txns: slice.to_vec(),
                    out_txns: out_slice,
                });
                break;
            }
        }
    }

    windows
}

/// Five-factor soft scoring; a window becomes a ring when the combined
/// score reaches the threshold and enough members survive immunity
/// exclusion and the size cap.
fn score_windows(
    graph: &TransactionGraph,
    immunity: &ImmunityMap,
    config: &SmurfConfig,
    windows: Vec<SmurfWindow<'_>>,
) -> SmurfDetection {
    let mut detection = SmurfDetection::default();
    let mut seen: BTreeSet<Vec<AccountId>> = BTreeSet::new();

    for window in windows {
        let incoming_sum: f64 = window.in_txns.iter().map(|t| t.amount).sum();
        if incoming_sum <= 0.0 {
            continue;
        }
        let outgoing_sum: f64 = window.out_txns.iter().map(|t| t.amount).sum();

        // Factor 1: retention — how much of the collected volume moved on.
        let retention = outgoing_sum / incoming_sum;
        let flow_score = if retention >= 0.6 {
            1.0
        } else if retention >= 0.4 {
            0.5
        } else {
            0.0
        };

        // Factor 2: outbound concentration.
        let unique_out: BTreeSet<&AccountId> = window.out_txns.iter().map(|t| t.peer).collect();
        let concentration_score = if unique_out.len() <= 3 {
            1.0
        } else if unique_out.len() <= 5 {
            0.5
        } else {
            0.0
        };

        // Factor 3: median hold time from each inbound to the next outbound.
        let mut hold_times = Vec::new();
        for ie in &window.in_txns {
            let first_after = window.out_txns.partition_point(|oe| oe.ts < ie.ts);
            if let Some(oe) = window.out_txns.get(first_after) {
                hold_times.push((oe.ts - ie.ts).num_milliseconds() as f64 / 1000.0);
            }
        }
        let hold_score = if hold_times.is_empty() {
            // No matched outbound; leave room for the other factors.
            0.3
        } else {
            let median_hold = median(&hold_times);
            if median_hold < 24.0 * 3600.0 {
                1.0
            } else if median_hold < 48.0 * 3600.0 {
                0.5
            } else {
                0.0
            }
        };

        // Factor 4: uniformity of the inbound amounts.
        let in_amounts: Vec<f64> = window.in_txns.iter().map(|t| t.amount).collect();
        let cv = coefficient_of_variation(&in_amounts);
        let cv_score = if cv <= 0.35 {
            1.0
        } else if cv <= 0.5 {
            0.5
        } else {
            0.0
        };

        // Ring membership: hub + inbound + outbound peers, immune accounts
        // excluded, capped keeping hub then sorted inbound then outbound.
        let inbound_accounts: BTreeSet<AccountId> = window
            .in_txns
            .iter()
            .map(|t| t.peer.clone())
            .filter(|a| !immunity.contains_key(a))
            .collect();
        let outbound_accounts: BTreeSet<AccountId> = window
            .out_txns
            .iter()
            .map(|t| t.peer.clone())
            .filter(|a| !immunity.contains_key(a))
            .collect();
        let hub_included = !immunity.contains_key(window.hub);

        let mut members: BTreeSet<AccountId> = BTreeSet::new();
        if hub_included {
            members.insert(window.hub.clone());
        }
        members.extend(inbound_accounts.iter().cloned());
        members.extend(outbound_accounts.iter().cloned());

        if members.len() > config.max_ring_size {
            let mut kept: BTreeSet<AccountId> = BTreeSet::new();
            if hub_included {
                kept.insert(window.hub.clone());
            }
            for account in &inbound_accounts {
                if kept.len() >= config.max_ring_size {
                    break;
                }
                kept.insert(account.clone());
            }
            for account in &outbound_accounts {
                if kept.len() >= config.max_ring_size {
                    break;
                }
                kept.insert(account.clone());
            }
            members = kept;
        }
        let ring_size = members.len();

        // Factor 5: ring size after exclusion and capping.
        let size_score = if ring_size >= 5 {
            1.0
        } else if ring_size >= 4 {
            0.8
        } else if ring_size >= 3 {
            0.4
        } else {
            0.0
        };

        let combined =
            flow_score + concentration_score + hold_score + cv_score + size_score;
        if combined < config.min_combined_score || ring_size < config.min_ring_size {
            continue;
        }

        let member_list: Vec<AccountId> = members.iter().cloned().collect();
        if seen.contains(&member_list) {
            continue;
        }
        seen.insert(member_list.clone());

        let mut confidence = 0.7 + (combined - config.min_combined_score) / 5.0 * 0.2;
        let mut internal = 0usize;
        let mut external = 0usize;
        for m in &members {
            for succ in graph.successors(m) {
                if members.contains(succ) {
                    internal += 1;
                } else {
                    external += 1;
                }
            }
        }
        if internal > 0 && external <= internal {
            confidence += 0.05;
        }
        if ring_size > config.max_ring_size {
            confidence -= 0.1;
        }
        confidence -= ring_size as f64 * 0.005;

        let risk = 40.0 + combined / 5.0 * 40.0 + ring_size as f64 * 2.0;

        detection.candidates.push(CandidateRing {
            members: member_list.clone(),
            kind: CandidateKind::Smurfing {
                core: window.hub.clone(),
            },
            risk_score: round1(risk.min(100.0)),
            confidence: confidence.clamp(0.1, 1.0),
        });

        for account in &member_list {
            let labels = detection.labels.entry(account.clone()).or_default();
            if account == window.hub {
                labels.insert(PatternLabel::Smurfing);
                labels.insert(PatternLabel::FanIn);
            } else if inbound_accounts.contains(account) {
                labels.insert(PatternLabel::FanIn);
            } else {
                labels.insert(PatternLabel::FanOut);
            }
        }
    }

    detection
}
