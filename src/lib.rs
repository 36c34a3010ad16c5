//! Interval-aware memoization.
//!
//! Wraps a function that fetches data for an interval, such as a date range,
//! so that every range is fetched at most once. A call is split into sub-calls
//! over atomic intervals: pieces served before are looked up in a memoizer,
//! new pieces are fetched, and the results are combined with an aggregator.
//!
//! - [`Interval`] and [`IntervalSet`] implement the interval algebra.
//! - [`Ledger`] tracks served intervals and plans the calls for a query under
//!   one of three overlap [`Policy`]s.
//! - [`IntervalMemo`] binds ledgers to a function through a [`Memoizer`].

pub mod aggregate;
mod cache;
mod error;
mod hash;
mod interval;
mod ledger;
mod memoize;
mod registry;
mod set;
mod signature;

pub use crate::aggregate::Aggregator;
pub use crate::cache::{Cache, Evictable, Memoizer, Stats};
pub use crate::error::{BindError, Error};
pub use crate::hash::hash;
pub use crate::interval::{Bound, Domain, Interval, Limit};
pub use crate::ledger::{CallPlan, Entry, Ledger, LedgerConfig, Origin, Policy, Step};
pub use crate::memoize::{Builder, Config, IntervalMemo, IntervalValue, Memoized, ParamRef};
pub use crate::registry::{Recorder, Slot, find_or_create};
pub use crate::set::IntervalSet;
pub use crate::signature::{Args, Binding, Signature};
