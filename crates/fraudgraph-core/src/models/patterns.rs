//! Pattern labels and the per-account label bitset.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of detection labels an account can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternLabel {
    /// Member of a validated 3-cycle.
    CycleLength3,
    /// Member of a validated 4-cycle.
    CycleLength4,
    /// Member of a validated 5-cycle.
    CycleLength5,
    /// Intermediary in a shell chain.
    ShellAccount,
    /// Hub of a smurfing ring.
    Smurfing,
    /// Inbound peer of a smurfing ring (or its hub).
    FanIn,
    /// Outbound peer of a smurfing ring.
    FanOut,
    /// Repeated near-threshold transaction windows.
    Structuring,
    /// Inbound funds re-transmitted within one hour.
    HighVelocity,
    /// Five or more events inside a 24h window.
    HighVelocity24h,
    /// Coefficient of variation of amounts below 0.2.
    LowVariance,
    /// Surrounded by other high-scoring accounts.
    IsolationCluster,
    /// Payroll disbursement account (immune).
    Payroll,
    /// Merchant collection account (immune).
    Merchant,
}

impl PatternLabel {
    /// Snake-case name used in the output document.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternLabel::CycleLength3 => "cycle_length_3",
            PatternLabel::CycleLength4 => "cycle_length_4",
            PatternLabel::CycleLength5 => "cycle_length_5",
            PatternLabel::ShellAccount => "shell_account",
            PatternLabel::Smurfing => "smurfing",
            PatternLabel::FanIn => "fan_in",
            PatternLabel::FanOut => "fan_out",
            PatternLabel::Structuring => "structuring",
            PatternLabel::HighVelocity => "high_velocity",
            PatternLabel::HighVelocity24h => "high_velocity_24h",
            PatternLabel::LowVariance => "low_variance",
            PatternLabel::IsolationCluster => "isolation_cluster",
            PatternLabel::Payroll => "payroll",
            PatternLabel::Merchant => "merchant",
        }
    }

    /// Additive scoring weight of the label. Immunity tags and the
    /// isolation-cluster marker carry no weight.
    pub fn weight(&self) -> f64 {
        match self {
            PatternLabel::CycleLength3 => 30.0,
            PatternLabel::CycleLength4 => 25.0,
            PatternLabel::CycleLength5 => 20.0,
            PatternLabel::ShellAccount => 20.0,
            PatternLabel::Smurfing => 15.0,
            PatternLabel::FanIn => 15.0,
            PatternLabel::FanOut => 15.0,
            PatternLabel::Structuring => 12.0,
            PatternLabel::HighVelocity => 5.0,
            PatternLabel::HighVelocity24h => 10.0,
            PatternLabel::LowVariance => 10.0,
            PatternLabel::IsolationCluster
            | PatternLabel::Payroll
            | PatternLabel::Merchant => 0.0,
        }
    }

    /// Label for a validated cycle of the given length (3 to 5).
    pub fn cycle_of_length(length: usize) -> Option<Self> {
        match length {
            3 => Some(PatternLabel::CycleLength3),
            4 => Some(PatternLabel::CycleLength4),
            5 => Some(PatternLabel::CycleLength5),
            _ => None,
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All labels, ordered ascending by their snake-case name. Iteration over a
/// [`PatternSet`] follows this order, so output lists are sorted by
/// construction.
pub const LABELS_BY_NAME: [PatternLabel; 14] = [
    PatternLabel::CycleLength3,
    PatternLabel::CycleLength4,
    PatternLabel::CycleLength5,
    PatternLabel::FanIn,
    PatternLabel::FanOut,
    PatternLabel::HighVelocity,
    PatternLabel::HighVelocity24h,
    PatternLabel::IsolationCluster,
    PatternLabel::LowVariance,
    PatternLabel::Merchant,
    PatternLabel::Payroll,
    PatternLabel::ShellAccount,
    PatternLabel::Smurfing,
    PatternLabel::Structuring,
];

/// Compact set of [`PatternLabel`]s for one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet(u16);

impl PatternSet {
    /// The empty set.
    pub const EMPTY: PatternSet = PatternSet(0);

    /// Every cycle-membership label.
    pub const CYCLES: PatternSet = PatternSet(
        PatternLabel::CycleLength3.bit()
            | PatternLabel::CycleLength4.bit()
            | PatternLabel::CycleLength5.bit(),
    );

    /// Labels that count as structural evidence for the velocity bonus.
    pub const STRUCTURAL: PatternSet = PatternSet(
        Self::CYCLES.0
            | PatternLabel::ShellAccount.bit()
            | PatternLabel::Smurfing.bit()
            | PatternLabel::FanIn.bit()
            | PatternLabel::FanOut.bit()
            | PatternLabel::Structuring.bit()
            | PatternLabel::LowVariance.bit(),
    );

    /// Labels that exempt an account from immunity and hub suppression.
    pub const STRONG_FRAUD: PatternSet = PatternSet(
        Self::CYCLES.0 | PatternLabel::ShellAccount.bit() | PatternLabel::Smurfing.bit(),
    );

    /// Labels outside the classification hierarchy, never pruned.
    pub const KEEP_ALWAYS: PatternSet = PatternSet(
        PatternLabel::IsolationCluster.bit()
            | PatternLabel::Payroll.bit()
            | PatternLabel::Merchant.bit(),
    );

    /// Pure activity signals; accounts carrying only these are suppressed.
    pub const SIGNAL_ONLY: PatternSet = PatternSet(
        PatternLabel::HighVelocity.bit()
            | PatternLabel::HighVelocity24h.bit()
            | PatternLabel::LowVariance.bit(),
    );

    /// Immunity tags kept on immune accounts during cleanup.
    pub const IMMUNITY: PatternSet =
        PatternSet(PatternLabel::Payroll.bit() | PatternLabel::Merchant.bit());

    /// Classification classes in descending priority; hierarchy enforcement
    /// keeps labels from the first class that intersects the account's set.
    pub const HIERARCHY: [PatternSet; 6] = [
        Self::CYCLES,
        PatternSet(PatternLabel::ShellAccount.bit()),
        PatternSet(
            PatternLabel::Smurfing.bit()
                | PatternLabel::FanIn.bit()
                | PatternLabel::FanOut.bit(),
        ),
        PatternSet(PatternLabel::Structuring.bit()),
        PatternSet(PatternLabel::HighVelocity.bit() | PatternLabel::HighVelocity24h.bit()),
        PatternSet(PatternLabel::LowVariance.bit()),
    ];

    /// Add a label.
    pub fn insert(&mut self, label: PatternLabel) {
        self.0 |= label.bit();
    }

    /// Whether the label is present.
    pub fn contains(&self, label: PatternLabel) -> bool {
        self.0 & label.bit() != 0
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of labels present.
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set intersection.
    pub fn intersection(&self, other: PatternSet) -> PatternSet {
        PatternSet(self.0 & other.0)
    }

    /// Set union.
    pub fn union(&self, other: PatternSet) -> PatternSet {
        PatternSet(self.0 | other.0)
    }

    /// Labels in `self` that are not in `other`.
    pub fn difference(&self, other: PatternSet) -> PatternSet {
        PatternSet(self.0 & !other.0)
    }

    /// Whether any label is shared with `other`.
    pub fn intersects(&self, other: PatternSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every label in `self` is contained in `other`.
    pub fn is_subset(&self, other: PatternSet) -> bool {
        self.0 & !other.0 == 0
    }

    /// Labels in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = PatternLabel> + '_ {
        LABELS_BY_NAME.into_iter().filter(|l| self.contains(*l))
    }

    /// Label names in ascending order, for the output document.
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(|l| l.as_str()).collect()
    }
}

impl FromIterator<PatternLabel> for PatternSet {
    fn from_iter<I: IntoIterator<Item = PatternLabel>>(iter: I) -> Self {
        let mut set = PatternSet::EMPTY;
        for label in iter {
            set.insert(label);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_by_name_is_sorted() {
        let names: Vec<&str> = LABELS_BY_NAME.iter().map(|l| l.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn test_set_operations() {
        let mut set = PatternSet::EMPTY;
        set.insert(PatternLabel::Smurfing);
        set.insert(PatternLabel::FanIn);
        assert!(set.contains(PatternLabel::Smurfing));
        assert!(!set.contains(PatternLabel::CycleLength3));
        assert_eq!(set.len(), 2);
        assert!(set.intersects(PatternSet::STRONG_FRAUD));
        assert!(set.is_subset(PatternSet::STRUCTURAL));
        assert_eq!(set.names(), vec!["fan_in", "smurfing"]);
    }

    #[test]
    fn test_signal_only_subset_check() {
        let set: PatternSet = [PatternLabel::HighVelocity, PatternLabel::LowVariance]
            .into_iter()
            .collect();
        assert!(set.is_subset(PatternSet::SIGNAL_ONLY));
        let with_cycle: PatternSet = [PatternLabel::HighVelocity, PatternLabel::CycleLength3]
            .into_iter()
            .collect();
        assert!(!with_cycle.is_subset(PatternSet::SIGNAL_ONLY));
    }

    #[test]
    fn test_hierarchy_masks_cover_classified_labels() {
        let mut all = PatternSet::EMPTY;
        for class in PatternSet::HIERARCHY {
            all = all.union(class);
        }
        for label in LABELS_BY_NAME {
            let classified = all.contains(label);
            let kept_always = PatternSet::KEEP_ALWAYS.contains(label);
            assert!(classified ^ kept_always, "{label} must be in exactly one group");
        }
    }
}
