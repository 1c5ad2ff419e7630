//! Composite risk scoring and suppression.
//!
//! Scores sum the weights of the surviving labels (capped), add the
//! velocity and anomaly bonuses, then an isolation-cluster pass rewards
//! accounts surrounded by other high-scoring accounts. Suppression runs
//! last: signal-only accounts, immune accounts, and commercial hubs drop to
//! zero unless a strong-fraud label protects them, and everything below the
//! flag threshold is zeroed.

use std::collections::BTreeMap;

use tracing::debug;

use fraudgraph_core::{round1, AccountId, PatternLabel, PatternSet};

use crate::config::ScoringConfig;
use crate::context::AnalysisContext;

/// Score every account and apply suppression. `anomaly_bonus` maps each
/// account to its already-weighted bonus. Writes `suspicion_scores` and
/// `explanations`; may add `isolation_cluster` labels.
pub fn score_accounts(
    ctx: &mut AnalysisContext,
    config: &ScoringConfig,
    anomaly_bonus: &BTreeMap<AccountId, f64>,
) {
    let mut preliminary: BTreeMap<AccountId, f64> = BTreeMap::new();

    // Pass 1: weighted labels + velocity bonus + anomaly bonus. The
    // explanation string reflects this preliminary score.
    for account in ctx.graph.accounts() {
        let labels = ctx.labels_of(account);

        let mut score: f64 = labels.iter().map(|l| l.weight()).sum();
        score = score.min(config.pattern_score_cap);

        let has_structural = labels.intersects(PatternSet::STRUCTURAL);
        let tier1_bonus = ctx.velocity_accounts.contains(account) && has_structural;
        if tier1_bonus {
            score += config.velocity_bonus;
        } else if ctx.velocity_24h_accounts.contains(account) && has_structural {
            score += config.velocity_24h_bonus;
        }

        score += anomaly_bonus.get(account).copied().unwrap_or(0.0);
        preliminary.insert(account.clone(), score);

        let explanation = build_explanation(labels, tier1_bonus, config.velocity_bonus, score);
        ctx.explanations.insert(account.clone(), explanation);
    }

    // Pass 2: isolation-cluster bonus over a snapshot of the preliminary
    // scores, so the +8 is independent of visit order.
    let mut boosted: Vec<AccountId> = Vec::new();
    for account in ctx.graph.accounts() {
        if preliminary[account] <= 0.0 {
            continue;
        }
        let flagged_neighbors = ctx
            .graph
            .neighbors(account)
            .into_iter()
            .filter(|n| {
                preliminary.get(*n).copied().unwrap_or(0.0) > config.isolation_neighbor_score
            })
            .count();
        if flagged_neighbors >= config.isolation_min_neighbors {
            boosted.push(account.clone());
        }
    }
    for account in &boosted {
        *preliminary.get_mut(account).expect("scored in pass 1") += config.isolation_bonus;
        ctx.patterns
            .entry(account.clone())
            .or_default()
            .insert(PatternLabel::IsolationCluster);
    }
    if !boosted.is_empty() {
        debug!(count = boosted.len(), "isolation-cluster bonus applied");
    }

    // Pass 3: suppression and the flag gate.
    let accounts: Vec<AccountId> = ctx.graph.accounts().cloned().collect();
    for account in accounts {
        let mut score = preliminary[&account];
        let labels = ctx.labels_of(&account);

        let active = labels.difference(PatternSet::KEEP_ALWAYS);
        if active.is_subset(PatternSet::SIGNAL_ONLY) {
            score = 0.0;
        }

        let has_strong_fraud = labels.intersects(PatternSet::STRONG_FRAUD);
        if ctx.immunity.contains_key(&account) && !has_strong_fraud {
            score = 0.0;
        }
        if ctx.commercial_hubs.contains(&account) && !has_strong_fraud {
            score = 0.0;
        }

        score = round1(score.clamp(0.0, 100.0));
        if score < config.flag_threshold {
            score = 0.0;
        }
        ctx.suspicion_scores.insert(account, score);
    }
}

/// Assemble the human-readable explanation: one `+W pts` entry per weighted
/// label, the velocity bonus when it fired, and the preliminary score.
/// Accounts without labels get an empty string.
fn build_explanation(
    labels: PatternSet,
    tier1_bonus: bool,
    velocity_bonus: f64,
    score: f64,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    for label in labels.iter() {
        let weight = label.weight();
        if weight > 0.0 {
            parts.push(format!(
                "{} (+{} pts)",
                title_case(label.as_str()),
                weight as i64
            ));
        }
    }
    if tier1_bonus {
        parts.push(format!("High velocity (+{} pts)", velocity_bonus as i64));
    }
    if parts.is_empty() {
        return String::new();
    }
    parts.push(format!("Score: {:.1}", round1(score.clamp(0.0, 100.0))));
    format!("{}.", parts.join(". "))
}

/// Title-case a snake_case label: every letter that follows a non-letter is
/// uppercased ("high_velocity_24h" becomes "High Velocity 24H").
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for ch in name.chars() {
        if ch == '_' {
            out.push(' ');
            prev_alpha = false;
        } else if ch.is_ascii_alphabetic() {
            if prev_alpha {
                out.push(ch.to_ascii_lowercase());
            } else {
                out.push(ch.to_ascii_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
