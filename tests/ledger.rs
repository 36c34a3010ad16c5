use chrono::{NaiveDate, TimeDelta};
use spanmemo::{Interval, Ledger, LedgerConfig, Origin, Policy};

use Origin::{Fresh, Reused};

type Plan = Vec<(Interval<i32>, Origin)>;

fn ledger(policy: Policy) -> Ledger<i32> {
    Ledger::new(LedgerConfig { policy, tolerance: None })
}

fn serve(ledger: &mut Ledger<i32>, query: Interval<i32>) -> Plan {
    ledger
        .serve(&query)
        .into_iter()
        .map(|step| (step.interval().clone(), step.origin()))
        .collect()
}

fn recorded(policy: Policy, seeds: [Interval<i32>; 3]) -> Ledger<i32> {
    let mut ledger = ledger(policy);
    for seed in seeds {
        assert!(ledger.record(seed));
    }
    ledger
}

fn closed_seeds() -> [Interval<i32>; 3] {
    [Interval::closed(-6, -4), Interval::closed(-3, -2), Interval::closed(-2, 0)]
}

fn right_closed_seeds() -> [Interval<i32>; 3] {
    [Interval::open_closed(-6, -4), Interval::open_closed(-3, -2), Interval::open_closed(-2, 0)]
}

#[test]
fn test_whole_reuses_overlapping_intervals() {
    let mut ledger = ledger(Policy::Whole);
    assert_eq!(serve(&mut ledger, Interval::closed(-2, 0)), [(Interval::closed(-2, 0), Fresh)]);
    assert_eq!(serve(&mut ledger, Interval::closed(-3, -2)), [
        (Interval::closed_open(-3, -2), Fresh),
        (Interval::closed(-2, 0), Reused),
    ]);
    assert_eq!(serve(&mut ledger, Interval::closed(-6, -4)), [(Interval::closed(-6, -4), Fresh)]);
    assert_eq!(serve(&mut ledger, Interval::closed(-5, -1)), [
        (Interval::closed(-6, -4), Reused),
        (Interval::open(-4, -3), Fresh),
        (Interval::closed_open(-3, -2), Reused),
        (Interval::closed(-2, 0), Reused),
    ]);
}

#[test]
fn test_whole_with_recorded_intervals() {
    let mut ledger = recorded(Policy::Whole, closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::closed(-5, -1)), [
        (Interval::closed(-6, -4), Reused),
        (Interval::open(-4, -3), Fresh),
        (Interval::closed(-3, -2), Reused),
        (Interval::closed(-2, 0), Reused),
    ]);
}

#[test]
fn test_whole_fills_gaps() {
    let mut ledger = ledger(Policy::Whole);
    serve(&mut ledger, Interval::closed(-2, 0));
    assert_eq!(serve(&mut ledger, Interval::closed(-1, 0)), [(Interval::closed(-2, 0), Reused)]);
    serve(&mut ledger, Interval::closed(-3, -1));
    serve(&mut ledger, Interval::closed(-5, -4));
    assert_eq!(serve(&mut ledger, Interval::closed(-6, 0)), [
        (Interval::closed_open(-6, -5), Fresh),
        (Interval::closed(-5, -4), Reused),
        (Interval::open(-4, -3), Fresh),
        (Interval::closed_open(-3, -2), Reused),
        (Interval::closed(-2, 0), Reused),
    ]);
    assert_eq!(ledger.len(), 5);
}

#[test]
fn test_coarse_split() {
    let mut ledger = recorded(Policy::CoarseSplit, closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::closed(-5, -1)), [
        (Interval::closed_open(-5, -3), Fresh),
        (Interval::closed(-3, -2), Reused),
        (Interval::open_closed(-2, -1), Fresh),
    ]);

    let mut ledger = recorded(Policy::CoarseSplit, right_closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::open_closed(-5, -1)), [
        (Interval::open_closed(-5, -3), Fresh),
        (Interval::open_closed(-3, -2), Reused),
        (Interval::open_closed(-2, -1), Fresh),
    ]);
}

#[test]
fn test_fine_split() {
    let mut ledger = recorded(Policy::FineSplit, closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::closed(-5, -1)), [
        (Interval::closed(-5, -4), Fresh),
        (Interval::open(-4, -3), Fresh),
        (Interval::closed(-3, -2), Reused),
        (Interval::closed(-2, -1), Fresh),
    ]);
    // The coarser seeds stay next to the pieces cut from them.
    assert_eq!(ledger.len(), 6);
    assert!(ledger.stored_at(&Interval::closed(-6, -4)).is_some());
    assert!(serve(&mut ledger, Interval::closed(-5, -1)).iter().all(|(_, o)| *o == Reused));

    let mut ledger = recorded(Policy::FineSplit, right_closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::open_closed(-5, -1)), [
        (Interval::open_closed(-5, -4), Fresh),
        (Interval::open_closed(-4, -3), Fresh),
        (Interval::open_closed(-3, -2), Reused),
        (Interval::open_closed(-2, -1), Fresh),
    ]);
}

#[test]
fn test_fine_split_keeps_coarse_and_fine_intervals() {
    let mut ledger = ledger(Policy::FineSplit);
    ledger.record(Interval::closed(0, 10));
    ledger.record(Interval::closed(2, 4));
    assert_eq!(serve(&mut ledger, Interval::closed(-2, 12)), [
        (Interval::closed_open(-2, 0), Fresh),
        (Interval::closed(0, 10), Reused),
        (Interval::closed(2, 4), Reused),
        (Interval::open_closed(10, 12), Fresh),
    ]);
}

#[test]
fn test_whole_with_right_closed_intervals() {
    let mut ledger = recorded(Policy::Whole, right_closed_seeds());
    assert_eq!(serve(&mut ledger, Interval::open_closed(-5, -1)), [
        (Interval::open_closed(-6, -4), Reused),
        (Interval::open_closed(-4, -3), Fresh),
        (Interval::open_closed(-3, -2), Reused),
        (Interval::open_closed(-2, 0), Reused),
    ]);
}

#[test]
fn test_disjoint_query() {
    for policy in [Policy::Whole, Policy::CoarseSplit, Policy::FineSplit] {
        let mut ledger = recorded(policy, closed_seeds());
        assert_eq!(serve(&mut ledger, Interval::open(0, 3)), [(Interval::open(0, 3), Fresh)]);
        assert_eq!(serve(&mut ledger, Interval::at_least(10)), [(Interval::at_least(10), Fresh)]);
    }
}

#[test]
fn test_tolerance() {
    let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let mut ledger = Ledger::new(LedgerConfig {
        policy: Policy::Whole,
        tolerance: Some(TimeDelta::days(1)),
    });

    assert!(ledger.serve(&Interval::closed(day(1), day(2))).is_empty());
    assert!(ledger.is_empty());

    let plan = ledger.serve(&Interval::closed(day(1), day(3)));
    assert_eq!(plan.fresh().collect::<Vec<_>>(), [&Interval::closed(day(1), day(3))]);

    let plan = ledger.serve(&Interval::closed(day(1), day(4)));
    assert_eq!(plan.fresh().count(), 0);
    assert_eq!(plan.reused().collect::<Vec<_>>(), [&Interval::closed(day(1), day(3))]);
    assert_eq!(ledger.len(), 1);
    assert!(!ledger.record(Interval::open_closed(day(5), day(6))));
}

#[test]
fn test_coverage() {
    let mut ledger = ledger(Policy::Whole);
    serve(&mut ledger, Interval::closed(0, 2));
    serve(&mut ledger, Interval::open(2, 5));
    serve(&mut ledger, Interval::at_least(9));
    let coverage = ledger.coverage();
    assert_eq!(coverage.iter().collect::<Vec<_>>(), [
        &Interval::closed_open(0, 5),
        &Interval::at_least(9),
    ]);
}
