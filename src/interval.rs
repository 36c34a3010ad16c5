use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::error::Error;
use crate::set::IntervalSet;

/// A totally ordered domain intervals can range over.
///
/// The distance is only used to compare the width of an interval against a
/// tolerance, so it can be any ordered measure of `upper - lower`.
pub trait Domain: Ord + Clone + Hash + Debug + Send + Sync + 'static {
    /// The measure of an interval's width.
    type Distance: Ord + Clone + Debug + Send + Sync + 'static;

    /// The distance from `lower` to `upper`, where `lower <= upper`.
    fn distance(lower: &Self, upper: &Self) -> Self::Distance;
}

macro_rules! integer_domain {
    ($($ty:ty => $dist:ty),* $(,)?) => {
        $(impl Domain for $ty {
            type Distance = $dist;

            #[inline]
            fn distance(lower: &Self, upper: &Self) -> $dist {
                upper.abs_diff(*lower)
            }
        })*
    };
}

integer_domain! {
    i8 => u8, i16 => u16, i32 => u32, i64 => u64, i128 => u128, isize => usize,
    u8 => u8, u16 => u16, u32 => u32, u64 => u64, u128 => u128, usize => usize,
}

macro_rules! time_domain {
    ($($ty:ty),* $(,)?) => {
        $(impl Domain for $ty {
            type Distance = TimeDelta;

            #[inline]
            fn distance(lower: &Self, upper: &Self) -> TimeDelta {
                upper.signed_duration_since(*lower)
            }
        })*
    };
}

time_domain!(DateTime<Utc>, DateTime<FixedOffset>, NaiveDate, NaiveDateTime);

/// Whether an interval includes its endpoint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Bound {
    Open,
    Closed,
}

impl Bound {
    /// Whether the endpoint is included.
    #[inline]
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }

    /// The bound on the other side of the same endpoint.
    #[inline]
    pub fn invert(self) -> Self {
        match self {
            Self::Open => Self::Closed,
            Self::Closed => Self::Open,
        }
    }
}

/// An endpoint of an interval, possibly infinite.
///
/// The derived order puts `NegInfinity` before every finite value and
/// `PosInfinity` after.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Limit<T> {
    NegInfinity,
    Finite(T),
    PosInfinity,
}

impl<T> Limit<T> {
    /// The finite value, if any.
    #[inline]
    pub fn finite(&self) -> Option<&T> {
        match self {
            Self::Finite(value) => Some(value),
            _ => None,
        }
    }
}

/// An atomic interval: one contiguous range with independently open or closed
/// bounds.
///
/// Constructors normalize their input. Infinite endpoints are always open, and
/// `lower > upper` as well as `lower == upper` with an open side produce the
/// empty interval. Use [`Interval::try_new`] to reject inverted bounds
/// instead.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Interval<T> {
    span: Option<Span<T>>,
}

#[derive(Clone, Eq, PartialEq, Hash)]
struct Span<T> {
    left: Bound,
    lower: Limit<T>,
    upper: Limit<T>,
    right: Bound,
}

impl<T> Interval<T> {
    /// The empty interval.
    #[inline]
    pub const fn empty() -> Self {
        Self { span: None }
    }

    /// Whether the interval contains no value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    /// The lower endpoint, `None` when empty.
    #[inline]
    pub fn lower(&self) -> Option<&Limit<T>> {
        self.span.as_ref().map(|span| &span.lower)
    }

    /// The upper endpoint, `None` when empty.
    #[inline]
    pub fn upper(&self) -> Option<&Limit<T>> {
        self.span.as_ref().map(|span| &span.upper)
    }

    /// The closedness of the lower endpoint, `None` when empty.
    #[inline]
    pub fn left(&self) -> Option<Bound> {
        self.span.as_ref().map(|span| span.left)
    }

    /// The closedness of the upper endpoint, `None` when empty.
    #[inline]
    pub fn right(&self) -> Option<Bound> {
        self.span.as_ref().map(|span| span.right)
    }
}

impl<T: Ord> Interval<T> {
    /// Create an interval from its four parts.
    pub fn new(left: Bound, lower: Limit<T>, upper: Limit<T>, right: Bound) -> Self {
        let left = if matches!(lower, Limit::Finite(_)) { left } else { Bound::Open };
        let right = if matches!(upper, Limit::Finite(_)) { right } else { Bound::Open };
        let span = match lower.cmp(&upper) {
            Ordering::Less => Some(Span { left, lower, upper, right }),
            Ordering::Equal if left.is_closed() && right.is_closed() => {
                Some(Span { left, lower, upper, right })
            }
            _ => None,
        };
        Self { span }
    }

    /// Like [`Interval::new`], but fails if `lower > upper`.
    pub fn try_new(
        left: Bound,
        lower: Limit<T>,
        upper: Limit<T>,
        right: Bound,
    ) -> Result<Self, Error> {
        if lower > upper {
            return Err(Error::MalformedInterval);
        }
        Ok(Self::new(left, lower, upper, right))
    }

    /// `[lower, upper]`
    pub fn closed(lower: T, upper: T) -> Self {
        Self::new(Bound::Closed, Limit::Finite(lower), Limit::Finite(upper), Bound::Closed)
    }

    /// `(lower, upper)`
    pub fn open(lower: T, upper: T) -> Self {
        Self::new(Bound::Open, Limit::Finite(lower), Limit::Finite(upper), Bound::Open)
    }

    /// `[lower, upper)`
    pub fn closed_open(lower: T, upper: T) -> Self {
        Self::new(Bound::Closed, Limit::Finite(lower), Limit::Finite(upper), Bound::Open)
    }

    /// `(lower, upper]`
    pub fn open_closed(lower: T, upper: T) -> Self {
        Self::new(Bound::Open, Limit::Finite(lower), Limit::Finite(upper), Bound::Closed)
    }

    /// `[lower, +inf)`
    pub fn at_least(lower: T) -> Self {
        Self::new(Bound::Closed, Limit::Finite(lower), Limit::PosInfinity, Bound::Open)
    }

    /// `(lower, +inf)`
    pub fn greater_than(lower: T) -> Self {
        Self::new(Bound::Open, Limit::Finite(lower), Limit::PosInfinity, Bound::Open)
    }

    /// `(-inf, upper]`
    pub fn at_most(upper: T) -> Self {
        Self::new(Bound::Open, Limit::NegInfinity, Limit::Finite(upper), Bound::Closed)
    }

    /// `(-inf, upper)`
    pub fn less_than(upper: T) -> Self {
        Self::new(Bound::Open, Limit::NegInfinity, Limit::Finite(upper), Bound::Open)
    }

    /// `(-inf, +inf)`
    pub fn full() -> Self {
        Self::new(Bound::Open, Limit::NegInfinity, Limit::PosInfinity, Bound::Open)
    }

    /// Whether `value` lies inside the interval.
    pub fn contains_value(&self, value: &T) -> bool {
        let Some(span) = &self.span else { return false };
        let above = match span.lower.finite() {
            Some(lower) => match lower.cmp(value) {
                Ordering::Less => true,
                Ordering::Equal => span.left.is_closed(),
                Ordering::Greater => false,
            },
            None => span.lower == Limit::NegInfinity,
        };
        let below = match span.upper.finite() {
            Some(upper) => match value.cmp(upper) {
                Ordering::Less => true,
                Ordering::Equal => span.right.is_closed(),
                Ordering::Greater => false,
            },
            None => span.upper == Limit::PosInfinity,
        };
        above && below
    }

    /// Whether `other` is a subset of this interval.
    ///
    /// The empty interval is contained in every interval.
    pub fn contains(&self, other: &Self) -> bool {
        match (&self.span, &other.span) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                cmp_lower(a.lower_key(), b.lower_key()) != Ordering::Greater
                    && cmp_upper(b.upper_key(), a.upper_key()) != Ordering::Greater
            }
        }
    }
}

impl<T: Ord + Clone> Interval<T> {
    /// `[value, value]`
    pub fn singleton(value: T) -> Self {
        Self::closed(value.clone(), value)
    }

    /// The values in both intervals.
    pub fn intersection(&self, other: &Self) -> Self {
        let (Some(a), Some(b)) = (&self.span, &other.span) else {
            return Self::empty();
        };
        let (lower, left) = match cmp_lower(a.lower_key(), b.lower_key()) {
            Ordering::Less => b.lower_key(),
            _ => a.lower_key(),
        };
        let (upper, right) = match cmp_upper(a.upper_key(), b.upper_key()) {
            Ordering::Greater => b.upper_key(),
            _ => a.upper_key(),
        };
        Self::new(left, lower.clone(), upper.clone(), right)
    }

    /// Whether the two intervals share at least one value.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.intersection(other).is_empty()
    }

    /// The values in this interval but not in `other`.
    ///
    /// Yields up to two atomic pieces: the part before `other` and the part
    /// after it.
    pub fn difference(&self, other: &Self) -> IntervalSet<T> {
        let (Some(a), Some(b)) = (&self.span, &other.span) else {
            return IntervalSet::from(self.clone());
        };
        if !self.overlaps(other) {
            return IntervalSet::from(self.clone());
        }
        let before = Self::new(a.left, a.lower.clone(), b.lower.clone(), b.left.invert());
        let after = Self::new(b.right.invert(), b.upper.clone(), a.upper.clone(), a.right);
        [before, after].into_iter().collect()
    }

    /// The smallest interval covering both, if they overlap or touch at a
    /// value that at least one of them includes.
    pub(crate) fn merge(&self, other: &Self) -> Option<Self> {
        let (Some(a), Some(b)) = (&self.span, &other.span) else {
            return None;
        };
        let (first, second) = match cmp_lower(a.lower_key(), b.lower_key()) {
            Ordering::Greater => (b, a),
            _ => (a, b),
        };
        let connected = match second.lower.cmp(&first.upper) {
            Ordering::Less => true,
            Ordering::Equal => first.right.is_closed() || second.left.is_closed(),
            Ordering::Greater => false,
        };
        if !connected {
            return None;
        }
        let (upper, right) = match cmp_upper(first.upper_key(), second.upper_key()) {
            Ordering::Less => second.upper_key(),
            _ => first.upper_key(),
        };
        Some(Self::new(first.left, first.lower.clone(), upper.clone(), right))
    }
}

impl<T: Domain> Interval<T> {
    /// The distance between the endpoints, `None` if empty or unbounded.
    pub fn width(&self) -> Option<T::Distance> {
        let span = self.span.as_ref()?;
        Some(T::distance(span.lower.finite()?, span.upper.finite()?))
    }
}

impl<T> Span<T> {
    fn lower_key(&self) -> (&Limit<T>, Bound) {
        (&self.lower, self.left)
    }

    fn upper_key(&self) -> (&Limit<T>, Bound) {
        (&self.upper, self.right)
    }
}

/// Orders lower endpoints: at the same value, a closed bound starts earlier.
fn cmp_lower<T: Ord>(a: (&Limit<T>, Bound), b: (&Limit<T>, Bound)) -> Ordering {
    a.0.cmp(b.0).then_with(|| match (a.1, b.1) {
        (Bound::Closed, Bound::Open) => Ordering::Less,
        (Bound::Open, Bound::Closed) => Ordering::Greater,
        _ => Ordering::Equal,
    })
}

/// Orders upper endpoints: at the same value, an open bound ends earlier.
fn cmp_upper<T: Ord>(a: (&Limit<T>, Bound), b: (&Limit<T>, Bound)) -> Ordering {
    a.0.cmp(b.0).then_with(|| match (a.1, b.1) {
        (Bound::Open, Bound::Closed) => Ordering::Less,
        (Bound::Closed, Bound::Open) => Ordering::Greater,
        _ => Ordering::Equal,
    })
}

/// Intervals are ordered by lower endpoint, then by upper endpoint. The empty
/// interval comes first.
impl<T: Ord> Ord for Interval<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.span, &other.span) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => cmp_lower(a.lower_key(), b.lower_key())
                .then_with(|| cmp_upper(a.upper_key(), b.upper_key())),
        }
    }
}

impl<T: Ord> PartialOrd for Interval<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Default for Interval<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Debug> Debug for Interval<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Some(span) = &self.span else { return f.pad("()") };
        f.write_str(if span.left.is_closed() { "[" } else { "(" })?;
        fmt_limit(&span.lower, f, |v, f| Debug::fmt(v, f))?;
        f.write_str(", ")?;
        fmt_limit(&span.upper, f, |v, f| Debug::fmt(v, f))?;
        f.write_str(if span.right.is_closed() { "]" } else { ")" })
    }
}

impl<T: Display> Display for Interval<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Some(span) = &self.span else { return f.pad("()") };
        f.write_str(if span.left.is_closed() { "[" } else { "(" })?;
        fmt_limit(&span.lower, f, |v, f| Display::fmt(v, f))?;
        f.write_str(", ")?;
        fmt_limit(&span.upper, f, |v, f| Display::fmt(v, f))?;
        f.write_str(if span.right.is_closed() { "]" } else { ")" })
    }
}

fn fmt_limit<T>(
    limit: &Limit<T>,
    f: &mut Formatter,
    value: impl FnOnce(&T, &mut Formatter) -> fmt::Result,
) -> fmt::Result {
    match limit {
        Limit::NegInfinity => f.write_str("-inf"),
        Limit::Finite(v) => value(v, f),
        Limit::PosInfinity => f.write_str("+inf"),
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::{Arbitrary, Gen};

    use super::*;

    /// Small intervals with even endpoints so that odd values probe the
    /// space between endpoints.
    impl Arbitrary for Interval<i16> {
        fn arbitrary(g: &mut Gen) -> Self {
            let bound = |g: &mut Gen| if bool::arbitrary(g) { Bound::Closed } else { Bound::Open };
            let limit = |g: &mut Gen| match u8::arbitrary(g) % 16 {
                0 => Limit::NegInfinity,
                1 => Limit::PosInfinity,
                n => Limit::Finite(2 * (i16::from(n) - 8)),
            };
            let (a, b) = (limit(g), limit(g));
            let (lower, upper) = if a <= b { (a, b) } else { (b, a) };
            Interval::new(bound(g), lower, upper, bound(g))
        }
    }

    #[test]
    fn test_normalization() {
        assert!(Interval::closed(3, 1).is_empty());
        assert!(Interval::closed_open(1, 1).is_empty());
        assert!(Interval::open_closed(1, 1).is_empty());
        assert!(!Interval::closed(1, 1).is_empty());
        assert_eq!(Interval::singleton(1), Interval::closed(1, 1));
        assert_eq!(
            Interval::new(Bound::Closed, Limit::NegInfinity, Limit::Finite(2), Bound::Closed),
            Interval::at_most(2),
        );
        assert_eq!(
            Interval::try_new(Bound::Closed, Limit::Finite(2), Limit::Finite(1), Bound::Closed),
            Err(Error::MalformedInterval),
        );
        assert!(Interval::<i32>::full().contains(&Interval::closed(-100, 100)));
    }

    #[test]
    fn test_intersection() {
        let meet = |a: Interval<i32>, b: Interval<i32>| a.intersection(&b);
        assert_eq!(meet(Interval::closed(1, 3), Interval::closed(2, 4)), Interval::closed(2, 3));
        assert_eq!(meet(Interval::closed(1, 2), Interval::closed(2, 3)), Interval::singleton(2));
        assert!(meet(Interval::closed_open(1, 2), Interval::closed(2, 3)).is_empty());
        assert_eq!(meet(Interval::open(1, 5), Interval::closed(1, 5)), Interval::open(1, 5));
        assert_eq!(
            meet(Interval::at_least(3), Interval::less_than(5)),
            Interval::closed_open(3, 5),
        );
    }

    #[test]
    fn test_difference() {
        let pieces = |set: IntervalSet<i32>| set.into_iter().collect::<Vec<_>>();
        assert_eq!(
            pieces(Interval::closed(1, 5).difference(&Interval::closed(2, 3))),
            [Interval::closed_open(1, 2), Interval::open_closed(3, 5)],
        );
        assert_eq!(
            pieces(Interval::closed(1, 5).difference(&Interval::open_closed(1, 3))),
            [Interval::singleton(1), Interval::open_closed(3, 5)],
        );
        assert_eq!(
            pieces(Interval::closed(1, 5).difference(&Interval::closed(6, 7))),
            [Interval::closed(1, 5)],
        );
        assert!(Interval::closed(1, 5).difference(&Interval::full()).is_empty());
        assert_eq!(
            pieces(Interval::full().difference(&Interval::closed(0, 1))),
            [Interval::less_than(0), Interval::greater_than(1)],
        );
    }

    #[test]
    fn test_merge() {
        let hull = |a: Interval<i32>, b: Interval<i32>| a.merge(&b);
        assert_eq!(
            hull(Interval::closed_open(1, 2), Interval::closed(2, 3)),
            Some(Interval::closed(1, 3)),
        );
        assert_eq!(
            hull(Interval::open(2, 3), Interval::closed(1, 2)),
            Some(Interval::closed_open(1, 3)),
        );
        assert_eq!(Interval::open(1, 2).merge(&Interval::open(2, 3)), None);
        assert_eq!(Interval::closed(1, 2).merge(&Interval::closed(4, 5)), None);
    }

    #[test]
    fn test_order() {
        let mut intervals = vec![
            Interval::open_closed(-4, -3),
            Interval::closed(-6, -4),
            Interval::open(-6, -5),
            Interval::closed_open(-6, -4),
        ];
        intervals.sort();
        assert_eq!(
            intervals,
            [
                Interval::closed_open(-6, -4),
                Interval::closed(-6, -4),
                Interval::open(-6, -5),
                Interval::open_closed(-4, -3),
            ]
        );
    }

    #[test]
    fn test_width() {
        assert_eq!(Interval::closed(-3, 4).width(), Some(7u32));
        assert_eq!(Interval::at_least(3).width(), None);
        assert_eq!(Interval::<i32>::empty().width(), None);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(Interval::closed(day, next).width(), Some(TimeDelta::days(1)));
    }

    #[test]
    fn test_format() {
        assert_eq!(format!("{:?}", Interval::closed_open(-5, -3)), "[-5, -3)");
        assert_eq!(Interval::at_most(2).to_string(), "(-inf, 2]");
        assert_eq!(Interval::<i32>::empty().to_string(), "()");
    }

    #[quickcheck_macros::quickcheck]
    fn test_intersection_quickcheck(a: Interval<i16>, b: Interval<i16>) -> bool {
        let both = a.intersection(&b);
        (-17..=17)
            .all(|v| both.contains_value(&v) == (a.contains_value(&v) && b.contains_value(&v)))
    }

    #[quickcheck_macros::quickcheck]
    fn test_contains_quickcheck(a: Interval<i16>, b: Interval<i16>) -> bool {
        a.contains(&b) == (a.intersection(&b) == b)
    }
}
