use chrono::{DateTime, Utc};
use tracing::debug;

use crate::interval::{Domain, Interval};
use crate::set::IntervalSet;

/// How a query is resolved against stored intervals it overlaps.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Policy {
    /// Reuse every stored interval the query touches, whole, and fetch the
    /// gaps between them. Stored intervals are never split.
    #[default]
    Whole,
    /// Reuse only stored intervals fully inside the query and fetch the rest
    /// of the query. Partially overlapping stored intervals are ignored, so the
    /// fetched remainder may repeat range fetched before.
    CoarseSplit,
    /// Fetch what lies outside every stored interval and fragment the
    /// overlapping part into the pieces where stored intervals meet the query.
    /// Pieces that are not stored yet are stored next to the coarser intervals
    /// they were cut from.
    ///
    /// Once a coarse interval and a piece cut from it both meet a query, the
    /// plan lists both, so plans may overlap and the aggregator sees the data
    /// of the piece twice. The aggregator must tolerate duplicates, e.g. by
    /// merging keyed data instead of concatenating or summing it.
    FineSplit,
}

impl Policy {
    /// Select a policy from its two flags.
    pub fn from_flags(require_subintervals: bool, split_existing_on_overlap: bool) -> Self {
        match (require_subintervals, split_existing_on_overlap) {
            (false, _) => Self::Whole,
            (true, false) => Self::CoarseSplit,
            (true, true) => Self::FineSplit,
        }
    }

    /// Whether calls are restricted to sub-intervals of the query.
    pub fn require_subintervals(self) -> bool {
        self != Self::Whole
    }

    /// Whether overlapping stored intervals are split.
    pub fn split_existing_on_overlap(self) -> bool {
        self == Self::FineSplit
    }
}

/// Settings of a ledger.
#[derive(Debug, Clone)]
pub struct LedgerConfig<T: Domain> {
    /// The overlap policy.
    pub policy: Policy,
    /// New intervals at most this wide are dropped instead of fetched.
    pub tolerance: Option<T::Distance>,
}

impl<T: Domain> Default for LedgerConfig<T> {
    fn default() -> Self {
        Self { policy: Policy::default(), tolerance: None }
    }
}

/// A stored interval and when it was stored.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry<T> {
    interval: Interval<T>,
    stored_at: DateTime<Utc>,
}

impl<T> Entry<T> {
    /// The stored interval.
    pub fn interval(&self) -> &Interval<T> {
        &self.interval
    }

    /// When the interval was first served.
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }
}

/// Whether a planned interval is new or was served before.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Origin {
    /// Stored by the query that produced the plan.
    Fresh,
    /// Stored by an earlier query.
    Reused,
}

/// One interval of a call plan.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Step<T> {
    interval: Interval<T>,
    origin: Origin,
}

impl<T> Step<T> {
    fn fresh(interval: Interval<T>) -> Self {
        Self { interval, origin: Origin::Fresh }
    }

    fn reused(interval: Interval<T>) -> Self {
        Self { interval, origin: Origin::Reused }
    }

    /// The interval to call with.
    pub fn interval(&self) -> &Interval<T> {
        &self.interval
    }

    /// Whether the interval is new.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Shorthand for `origin() == Origin::Fresh`.
    pub fn is_fresh(&self) -> bool {
        self.origin == Origin::Fresh
    }
}

/// The ordered atomic intervals a query must actually be called with.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CallPlan<T> {
    steps: Vec<Step<T>>,
}

impl<T: Ord> CallPlan<T> {
    /// Sort the steps by interval and drop repeated intervals.
    fn from_steps(mut steps: Vec<Step<T>>) -> Self {
        steps.sort_by(|a, b| a.interval.cmp(&b.interval));
        steps.dedup_by(|a, b| a.interval == b.interval);
        Self { steps }
    }
}

impl<T> CallPlan<T> {
    /// The number of intervals.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has to be called.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The steps in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Step<T>> {
        self.steps.iter()
    }

    /// The planned intervals in order.
    pub fn intervals(&self) -> impl Iterator<Item = &Interval<T>> {
        self.steps.iter().map(Step::interval)
    }

    /// The intervals stored by this query.
    pub fn fresh(&self) -> impl Iterator<Item = &Interval<T>> {
        self.steps.iter().filter(|step| step.is_fresh()).map(Step::interval)
    }

    /// The intervals served by earlier queries.
    pub fn reused(&self) -> impl Iterator<Item = &Interval<T>> {
        self.steps.iter().filter(|step| !step.is_fresh()).map(Step::interval)
    }
}

impl<T> Default for CallPlan<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> IntoIterator for CallPlan<T> {
    type Item = Step<T>;
    type IntoIter = std::vec::IntoIter<Step<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a CallPlan<T> {
    type Item = &'a Step<T>;
    type IntoIter = std::slice::Iter<'a, Step<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Records which intervals were served and plans the calls for new queries.
///
/// Every stored interval stands for one call that was made, so stored
/// intervals are kept individually: they are never merged with their
/// neighbours and never removed.
#[derive(Debug, Clone)]
pub struct Ledger<T: Domain> {
    entries: Vec<Entry<T>>,
    config: LedgerConfig<T>,
}

impl<T: Domain> Ledger<T> {
    /// Create an empty ledger.
    pub fn new(config: LedgerConfig<T>) -> Self {
        Self { entries: Vec::new(), config }
    }

    /// The overlap policy.
    pub fn policy(&self) -> Policy {
        self.config.policy
    }

    /// The width below which new intervals are dropped.
    pub fn tolerance(&self) -> Option<&T::Distance> {
        self.config.tolerance.as_ref()
    }

    /// The stored intervals in the order they were stored.
    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    /// The number of stored intervals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All values covered by stored intervals.
    pub fn coverage(&self) -> IntervalSet<T> {
        self.entries.iter().map(|entry| entry.interval.clone()).collect()
    }

    /// When `interval` was stored, if it is stored exactly.
    pub fn stored_at(&self, interval: &Interval<T>) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.interval == *interval)
            .map(Entry::stored_at)
    }

    /// Store an interval as served without planning a call for it.
    ///
    /// Subject to the same tolerance as intervals stored by [`Self::serve`].
    /// Returns whether the interval was stored.
    pub fn record(&mut self, interval: Interval<T>) -> bool {
        self.store(interval)
    }

    /// Plan the calls for `query` and store the new intervals among them.
    pub fn serve(&mut self, query: &Interval<T>) -> CallPlan<T> {
        if query.is_empty() {
            return CallPlan::default();
        }

        let mut steps = Vec::new();
        let overlapping: Vec<Interval<T>> = self
            .entries
            .iter()
            .map(|entry| &entry.interval)
            .filter(|stored| stored.overlaps(query))
            .cloned()
            .collect();

        if overlapping.is_empty() {
            self.disjunct(query.clone(), &mut steps);
        } else {
            match self.config.policy {
                Policy::Whole => self.serve_whole(query, overlapping, &mut steps),
                Policy::CoarseSplit => self.serve_coarse(query, &mut steps),
                Policy::FineSplit => self.serve_fine(query, &mut steps),
            }
        }

        let plan = CallPlan::from_steps(steps);
        debug!(
            ?query,
            policy = ?self.config.policy,
            fresh = plan.fresh().count(),
            reused = plan.reused().count(),
            "served interval",
        );
        plan
    }

    fn serve_whole(
        &mut self,
        query: &Interval<T>,
        overlapping: Vec<Interval<T>>,
        steps: &mut Vec<Step<T>>,
    ) {
        let mut covered = IntervalSet::new();
        for stored in overlapping {
            covered.insert(stored.clone());
            steps.push(Step::reused(stored));
        }
        for gap in IntervalSet::from(query.clone()).difference(&covered) {
            self.disjunct(gap, steps);
        }
    }

    fn serve_coarse(&mut self, query: &Interval<T>, steps: &mut Vec<Step<T>>) {
        let mut covered = IntervalSet::new();
        for entry in &self.entries {
            if query.contains(&entry.interval) {
                covered.insert(entry.interval.clone());
                steps.push(Step::reused(entry.interval.clone()));
            }
        }
        for residual in IntervalSet::from(query.clone()).difference(&covered) {
            self.disjunct(residual, steps);
        }
    }

    fn serve_fine(&mut self, query: &Interval<T>, steps: &mut Vec<Step<T>>) {
        let existing: Vec<Interval<T>> =
            self.entries.iter().map(|entry| entry.interval.clone()).collect();

        // The part of the query outside of every stored interval.
        let outside = existing
            .iter()
            .map(|stored| query.difference(stored))
            .reduce(|acc, diff| acc.intersection(&diff))
            .unwrap_or_else(|| IntervalSet::from(query.clone()));
        for piece in outside {
            self.disjunct(piece, steps);
        }

        for stored in &existing {
            let piece = stored.intersection(query);
            if piece.is_empty() || steps.iter().any(|step| step.interval == piece) {
                continue;
            }
            if self.entries.iter().any(|entry| entry.interval == piece) {
                steps.push(Step::reused(piece));
            } else {
                self.disjunct(piece, steps);
            }
        }
    }

    /// Store an interval no stored interval accounts for and plan a call.
    fn disjunct(&mut self, interval: Interval<T>, steps: &mut Vec<Step<T>>) {
        if self.store(interval.clone()) {
            steps.push(Step::fresh(interval));
        }
    }

    fn store(&mut self, interval: Interval<T>) -> bool {
        if interval.is_empty() {
            return false;
        }
        if let (Some(tolerance), Some(width)) = (&self.config.tolerance, interval.width())
            && width <= *tolerance
        {
            debug!(?interval, ?tolerance, "dropped interval within tolerance");
            return false;
        }
        self.entries.push(Entry { interval, stored_at: Utc::now() });
        true
    }
}

impl<T: Domain> Default for Ledger<T> {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(policy: Policy) -> Ledger<i16> {
        Ledger::new(LedgerConfig { policy, tolerance: None })
    }

    fn overlap(entries: &[Entry<i16>]) -> bool {
        entries.iter().enumerate().any(|(i, a)| {
            entries[i + 1..].iter().any(|b| a.interval.overlaps(&b.interval))
        })
    }

    #[test]
    fn test_policy_flags() {
        assert_eq!(Policy::from_flags(false, true), Policy::Whole);
        assert_eq!(Policy::from_flags(true, false), Policy::CoarseSplit);
        assert_eq!(Policy::from_flags(true, true), Policy::FineSplit);
        for policy in [Policy::Whole, Policy::CoarseSplit, Policy::FineSplit] {
            let require = policy.require_subintervals();
            let split = policy.split_existing_on_overlap();
            assert_eq!(Policy::from_flags(require, split), policy);
        }
    }

    #[test]
    fn test_empty_query() {
        let mut ledger = ledger(Policy::Whole);
        assert!(ledger.serve(&Interval::open(1, 1)).is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_stored_at() {
        let mut ledger = ledger(Policy::Whole);
        let before = Utc::now();
        ledger.serve(&Interval::closed(0, 4));
        let stored = ledger.stored_at(&Interval::closed(0, 4)).unwrap();
        assert!(stored >= before && stored <= Utc::now());
        assert_eq!(ledger.stored_at(&Interval::closed(0, 3)), None);
    }

    #[quickcheck_macros::quickcheck]
    fn test_idempotence_quickcheck(seeds: Vec<Interval<i16>>, query: Interval<i16>) -> bool {
        [Policy::Whole, Policy::CoarseSplit, Policy::FineSplit].into_iter().all(|policy| {
            let mut ledger = ledger(policy);
            for seed in &seeds {
                ledger.serve(seed);
            }
            let first = ledger.serve(&query);
            let stored = ledger.len();
            let second = ledger.serve(&query);
            second.fresh().count() == 0
                && stored == ledger.len()
                && second.intervals().eq(first.intervals())
        })
    }

    #[quickcheck_macros::quickcheck]
    fn test_whole_coverage_quickcheck(queries: Vec<Interval<i16>>) -> bool {
        let mut ledger = ledger(Policy::Whole);
        queries.iter().all(|query| {
            let plan = ledger.serve(query);
            let covered: IntervalSet<i16> = plan.intervals().cloned().collect();
            let fresh: IntervalSet<i16> = plan.fresh().cloned().collect();
            covered.contains(query)
                && plan.fresh().all(|interval| query.contains(interval))
                && fresh.len() == plan.fresh().count()
                && !overlap(ledger.entries())
        })
    }

    #[quickcheck_macros::quickcheck]
    fn test_split_plans_stay_inside_quickcheck(queries: Vec<Interval<i16>>) -> bool {
        [Policy::CoarseSplit, Policy::FineSplit].into_iter().all(|policy| {
            let mut ledger = ledger(policy);
            queries.iter().all(|query| {
                let plan = ledger.serve(query);
                let covered: IntervalSet<i16> = plan.intervals().cloned().collect();
                covered == IntervalSet::from(query.clone())
                    && plan.intervals().all(|interval| query.contains(interval))
            })
        })
    }
}
