//! Reducers that combine the results of sub-calls.
//!
//! An aggregator receives the results in plan order: ordered by interval, and
//! for several interval parameters in lexicographic order of the tuples.

use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use crate::error::Error;

/// Combines the results of the sub-calls into the result of one call.
pub type Aggregator<Out> = Box<dyn Fn(Vec<Out>) -> Result<Out, Error> + Send + Sync>;

/// Concatenate sequences in order.
pub fn concat<T: Send + Sync + 'static>() -> Aggregator<Vec<T>> {
    Box::new(|parts: Vec<Vec<T>>| {
        if parts.is_empty() {
            return Err(Error::NothingToAggregate);
        }
        Ok(parts.into_iter().flatten().collect())
    })
}

/// Add up maps key by key, treating a missing key as zero.
pub fn accumulate<K, V>() -> Aggregator<BTreeMap<K, V>>
where
    K: Ord + Send + Sync + 'static,
    V: AddAssign + Default + Send + Sync + 'static,
{
    Box::new(|parts: Vec<BTreeMap<K, V>>| {
        let mut parts = parts.into_iter();
        let mut total = parts.next().ok_or(Error::NothingToAggregate)?;
        for part in parts {
            for (key, value) in part {
                *total.entry(key).or_default() += value;
            }
        }
        Ok(total)
    })
}

/// Keep the result of the last sub-call.
pub fn last<T: Send + Sync + 'static>() -> Aggregator<T> {
    Box::new(|parts: Vec<T>| parts.into_iter().last().ok_or(Error::NothingToAggregate))
}

/// Sum the results.
pub fn sum<T: Add<Output = T> + Send + Sync + 'static>() -> Aggregator<T> {
    Box::new(|parts: Vec<T>| {
        parts.into_iter().reduce(|a, b| a + b).ok_or(Error::NothingToAggregate)
    })
}
