use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::cache::{Cache, Memoizer, Stats};
use crate::error::Error;
use crate::hash::{Tag, key};
use crate::interval::{Domain, Interval};
use crate::ledger::{CallPlan, LedgerConfig, Policy};
use crate::registry::{self, Recorder, Slot};
use crate::signature::{Args, Binding, Signature};

/// Fan-outs above this emit a warning unless a limit is configured.
const WIDE_FANOUT: usize = 256;

/// Numbers the combinators built without a namespace.
static UNNAMED: AtomicU64 = AtomicU64::new(0);

/// An argument value that may carry an interval.
///
/// Implemented by the argument type of a memoized function. Values of
/// interval parameters must return `Some` from [`as_interval`]; the combinator
/// replaces them with the atomic intervals it calls the function with.
///
/// [`as_interval`]: Self::as_interval
pub trait IntervalValue<T: Domain>: Clone + Debug + Hash + Send + Sync + 'static {
    /// The interval carried by this value, if any.
    fn as_interval(&self) -> Option<&Interval<T>>;

    /// Wrap an interval into an argument value.
    fn from_interval(interval: Interval<T>) -> Self;
}

impl<T: Domain> IntervalValue<T> for Interval<T> {
    fn as_interval(&self) -> Option<&Interval<T>> {
        Some(self)
    }

    fn from_interval(interval: Interval<T>) -> Self {
        interval
    }
}

/// Settings of a combinator.
#[derive(Debug, Clone)]
pub struct Config<T: Domain> {
    /// Settings of every ledger the combinator creates.
    pub ledger: LedgerConfig<T>,
    /// Log each sub-call with its duration.
    pub trace: bool,
    /// Fail calls expanding into more sub-calls than this.
    pub fanout_limit: Option<usize>,
}

impl<T: Domain> Default for Config<T> {
    fn default() -> Self {
        Self { ledger: LedgerConfig::default(), trace: false, fanout_limit: None }
    }
}

/// Refers to a parameter by position or name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ParamRef {
    /// Position in the signature.
    Position(usize),
    /// Name in the signature.
    Name(String),
}

impl From<usize> for ParamRef {
    fn from(position: usize) -> Self {
        Self::Position(position)
    }
}

impl From<&str> for ParamRef {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl From<String> for ParamRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl Display for ParamRef {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Position(position) => write!(f, "#{position}"),
            Self::Name(name) => f.pad(name),
        }
    }
}

/// Configures an [`IntervalMemo`].
pub struct Builder<V, T: Domain, Out, F, M> {
    signature: Signature<V>,
    func: F,
    aggregate: Aggregator<Out>,
    params: Vec<ParamRef>,
    config: Config<T>,
    namespace: Option<String>,
    memoizer: Arc<M>,
}

impl<V, T: Domain, Out, F, M> Builder<V, T, Out, F, M> {
    /// Designate the parameter at `position` as interval-valued.
    pub fn interval_position(mut self, position: usize) -> Self {
        self.params.push(ParamRef::Position(position));
        self
    }

    /// Designate the parameter called `name` as interval-valued.
    pub fn interval_keyword(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamRef::Name(name.into()));
        self
    }

    /// Set the overlap policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.config.ledger.policy = policy;
        self
    }

    /// Set the overlap policy from its two flags, see [`Policy::from_flags`].
    pub fn subintervals(self, require: bool, split_existing_on_overlap: bool) -> Self {
        self.policy(Policy::from_flags(require, split_existing_on_overlap))
    }

    /// Drop new intervals at most `tolerance` wide.
    pub fn tolerance(mut self, tolerance: T::Distance) -> Self {
        self.config.ledger.tolerance = Some(tolerance);
        self
    }

    /// Log each sub-call with its duration.
    pub fn trace(mut self, trace: bool) -> Self {
        self.config.trace = trace;
        self
    }

    /// Fail calls expanding into more than `limit` sub-calls.
    pub fn fanout_limit(mut self, limit: usize) -> Self {
        self.config.fanout_limit = Some(limit);
        self
    }

    /// Replace all settings at once.
    pub fn config(mut self, config: Config<T>) -> Self {
        self.config = config;
        self
    }

    /// Set the prefix of every key the combinator stores.
    ///
    /// Combinators sharing a memoizer need distinct namespaces. Without one,
    /// the combinator gets a namespace of its own and shares no keys with
    /// other combinators, including those built later for the same function.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Store results and recorders in `memoizer`.
    pub fn memoizer<M2>(self, memoizer: Arc<M2>) -> Builder<V, T, Out, F, M2> {
        Builder {
            signature: self.signature,
            func: self.func,
            aggregate: self.aggregate,
            params: self.params,
            config: self.config,
            namespace: self.namespace,
            memoizer,
        }
    }

    /// Resolve the designated parameters and build the combinator.
    pub fn build(self) -> Result<IntervalMemo<V, T, Out, F, M>, Error> {
        let mut designated = self
            .params
            .iter()
            .map(|param| {
                let position = match param {
                    ParamRef::Position(i) => Some(*i).filter(|&i| i < self.signature.len()),
                    ParamRef::Name(name) => self.signature.position(name),
                };
                position.ok_or_else(|| Error::UnknownParameter { param: param.to_string() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        designated.sort_unstable();
        designated.dedup();

        Ok(IntervalMemo {
            namespace: self.namespace.unwrap_or_else(|| {
                let n = UNNAMED.fetch_add(1, Ordering::Relaxed);
                format!("{}#{n}", std::any::type_name::<F>())
            }),
            signature: self.signature,
            designated,
            func: self.func,
            aggregate: self.aggregate,
            config: self.config,
            memoizer: self.memoizer,
        })
    }
}

/// Wraps a function taking interval arguments so that every range of every
/// interval is fetched at most once.
///
/// Each call is expanded into sub-calls over atomic intervals planned by one
/// [`Recorder`] per interval parameter and context, where the context is the
/// values of all other parameters. Sub-call results are memoized by their
/// exact arguments and combined with the aggregator.
pub struct IntervalMemo<V, T: Domain, Out, F, M = Cache<Slot<Out, T>>> {
    signature: Signature<V>,
    /// Positions of the interval parameters, ascending.
    designated: Vec<usize>,
    func: F,
    aggregate: Aggregator<Out>,
    config: Config<T>,
    namespace: String,
    memoizer: Arc<M>,
}

impl<V, T, Out, F> IntervalMemo<V, T, Out, F>
where
    V: IntervalValue<T>,
    T: Domain,
{
    /// Start configuring a combinator for `func`.
    ///
    /// Without [`Builder::memoizer`], the combinator owns a private [`Cache`].
    pub fn builder(
        signature: Signature<V>,
        func: F,
        aggregate: Aggregator<Out>,
    ) -> Builder<V, T, Out, F, Cache<Slot<Out, T>>> {
        Builder {
            signature,
            func,
            aggregate,
            params: Vec::new(),
            config: Config::default(),
            namespace: None,
            memoizer: Arc::new(Cache::new()),
        }
    }
}

impl<V, T, Out, F, M> IntervalMemo<V, T, Out, F, M>
where
    V: IntervalValue<T>,
    T: Domain,
    Out: Clone,
    M: Memoizer<Slot<Out, T>>,
{
    /// Call the function, reusing every range served before.
    ///
    /// Fails if the arguments do not bind, an interval parameter holds no
    /// interval or a sub-call fails. A failing sub-call aborts the whole call
    /// and none of its sub-results are stored. The ranges it planned stay
    /// recorded and are fetched by the next call needing them.
    ///
    /// Calling the same combinator with the same context from within `func`
    /// deadlocks.
    pub fn call<E>(&self, args: Args<V>) -> Result<Out, E>
    where
        F: Fn(&Binding<V>) -> Result<Out, E>,
        E: From<Error>,
    {
        let binding = self.signature.bind(args).map_err(Error::from)?;
        let queries = self.queries(&binding)?;
        let recorders = self
            .designated
            .iter()
            .map(|&position| self.recorder(&binding, position))
            .collect::<Result<Vec<_>, _>>()?;

        // Held until the sub-results are stored.
        let mut ledgers: Vec<_> = recorders.iter().map(|recorder| recorder.lock()).collect();
        let plans: Vec<CallPlan<T>> = ledgers
            .iter_mut()
            .zip(&queries)
            .map(|(ledger, query)| ledger.serve(query))
            .collect();

        let planned = plans.iter().map(CallPlan::len).fold(1usize, usize::saturating_mul);
        match self.config.fanout_limit {
            Some(limit) if planned > limit => {
                return Err(Error::FanOutExceeded { planned, limit }.into());
            }
            None if planned > WIDE_FANOUT => {
                warn!(namespace = %self.namespace, planned, "call expands into many sub-calls");
            }
            _ => {}
        }

        let mut outputs = Vec::with_capacity(planned);
        let mut staged = Vec::new();
        for tuple in product(&plans) {
            let mut sub = binding.clone();
            for (&position, interval) in self.designated.iter().zip(tuple) {
                sub.set(position, V::from_interval(interval.clone()));
            }

            let start = Instant::now();
            let key = key(&self.namespace, Tag::Call, &sub);
            let hit = match self.memoizer.lookup(key) {
                Some(Slot::Output(output)) => {
                    outputs.push(output);
                    true
                }
                Some(Slot::Recorder(_)) => {
                    return Err(Error::RegistryCorruption { key }.into());
                }
                None => {
                    let output = (self.func)(&sub)?;
                    staged.push((key, output.clone()));
                    outputs.push(output);
                    false
                }
            };

            if self.config.trace {
                info!(
                    namespace = %self.namespace,
                    args = ?tuple_display(&self.designated, &sub),
                    hit,
                    elapsed = ?start.elapsed(),
                    "sub-call",
                );
            }
        }

        debug!(
            namespace = %self.namespace,
            sub_calls = outputs.len(),
            misses = staged.len(),
            "expanded call",
        );
        for (key, output) in staged {
            self.memoizer.insert(key, Slot::Output(output));
        }
        drop(ledgers);

        (self.aggregate)(outputs).map_err(E::from)
    }

    /// The recorder a call with `args` uses for the interval parameter
    /// `param`.
    pub fn inspect(
        &self,
        param: impl Into<ParamRef>,
        args: Args<V>,
    ) -> Result<Arc<Recorder<T>>, Error> {
        let param = param.into();
        let position = match &param {
            ParamRef::Position(i) => Some(*i),
            ParamRef::Name(name) => self.signature.position(name),
        }
        .filter(|i| self.designated.contains(i))
        .ok_or_else(|| Error::UnknownParameter { param: param.to_string() })?;
        let binding = self.signature.bind(args)?;
        self.recorder(&binding, position)
    }

    /// The function memoized by exact arguments, without interval expansion.
    pub fn memoized(&self) -> Memoized<'_, V, T, Out, F, M> {
        Memoized { memo: self }
    }

    /// Usage counters of the memoizer.
    pub fn stats(&self) -> Stats {
        self.memoizer.stats()
    }

    /// The memoizer storing results and recorders.
    pub fn memoizer(&self) -> &Arc<M> {
        &self.memoizer
    }

    /// The declared parameters.
    pub fn signature(&self) -> &Signature<V> {
        &self.signature
    }

    /// The settings.
    pub fn config(&self) -> &Config<T> {
        &self.config
    }

    /// The prefix of every stored key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The interval values of the designated parameters.
    fn queries(&self, binding: &Binding<V>) -> Result<Vec<Interval<T>>, Error> {
        self.designated
            .iter()
            .map(|&position| {
                binding
                    .get(position)
                    .and_then(V::as_interval)
                    .cloned()
                    .ok_or_else(|| Error::InvalidIntervalArgument {
                        param: self.signature.name(position).unwrap_or_default().into(),
                    })
            })
            .collect()
    }

    /// Find or create the recorder of one interval parameter in the context
    /// given by the other parameters.
    fn recorder(&self, binding: &Binding<V>, position: usize) -> Result<Arc<Recorder<T>>, Error> {
        let context: Vec<&V> = binding
            .values()
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.designated.contains(i))
            .map(|(_, value)| value)
            .collect();
        let key = key(&self.namespace, Tag::Recorder, &(position, context));
        registry::find_or_create(&*self.memoizer, key, || self.config.ledger.clone())
    }
}

/// A combinator's function memoized by exact arguments.
pub struct Memoized<'a, V, T: Domain, Out, F, M> {
    memo: &'a IntervalMemo<V, T, Out, F, M>,
}

impl<V, T, Out, F, M> Memoized<'_, V, T, Out, F, M>
where
    V: IntervalValue<T>,
    T: Domain,
    Out: Clone,
    M: Memoizer<Slot<Out, T>>,
{
    /// Call the function with exactly these arguments, or reuse its result.
    pub fn call<E>(&self, args: Args<V>) -> Result<Out, E>
    where
        F: Fn(&Binding<V>) -> Result<Out, E>,
        E: From<Error>,
    {
        let binding = self.memo.signature.bind(args).map_err(Error::from)?;
        let key = key(&self.memo.namespace, Tag::Call, &binding);
        match self.memo.memoizer.lookup(key) {
            Some(Slot::Output(output)) => Ok(output),
            Some(Slot::Recorder(_)) => Err(Error::RegistryCorruption { key }.into()),
            None => {
                let output = (self.memo.func)(&binding)?;
                match self.memo.memoizer.insert(key, Slot::Output(output)) {
                    Slot::Output(output) => Ok(output),
                    Slot::Recorder(_) => Err(Error::RegistryCorruption { key }.into()),
                }
            }
        }
    }

    /// Whether a result for exactly these arguments is stored.
    pub fn contains(&self, args: Args<V>) -> Result<bool, Error> {
        let binding = self.memo.signature.bind(args)?;
        Ok(self.memo.memoizer.contains(key(&self.memo.namespace, Tag::Call, &binding)))
    }
}

/// All combinations of one interval per plan, in lexicographic order.
fn product<T>(plans: &[CallPlan<T>]) -> Vec<Vec<&Interval<T>>> {
    let mut tuples = vec![Vec::with_capacity(plans.len())];
    for plan in plans {
        tuples = tuples
            .into_iter()
            .flat_map(move |prefix| {
                plan.intervals().map(move |interval| {
                    let mut tuple = prefix.clone();
                    tuple.push(interval);
                    tuple
                })
            })
            .collect();
    }
    tuples
}

/// The interval arguments of a sub-call, for tracing.
fn tuple_display<'a, V>(designated: &[usize], sub: &'a Binding<V>) -> Vec<(&'a str, &'a V)> {
    sub.iter()
        .enumerate()
        .filter(|(i, _)| designated.contains(i))
        .map(|(_, pair)| pair)
        .collect()
}
