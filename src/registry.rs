use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::cache::{Evictable, Memoizer};
use crate::error::Error;
use crate::interval::{Domain, Interval};
use crate::ledger::{CallPlan, Ledger, LedgerConfig};

/// A value stored by a combinator in its memoizer.
pub enum Slot<Out, T: Domain> {
    /// The result of an atomic sub-call.
    Output(Out),
    /// The ledger for one bound context.
    Recorder(Arc<Recorder<T>>),
}

impl<Out: Clone, T: Domain> Clone for Slot<Out, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Output(output) => Self::Output(output.clone()),
            Self::Recorder(recorder) => Self::Recorder(Arc::clone(recorder)),
        }
    }
}

impl<Out: Debug, T: Domain> Debug for Slot<Out, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Output(output) => f.debug_tuple("Output").field(output).finish(),
            Self::Recorder(recorder) => f.debug_tuple("Recorder").field(recorder).finish(),
        }
    }
}

impl<Out, T: Domain> Evictable for Slot<Out, T> {
    /// A recorder is in use while a call holds it.
    fn in_use(&self) -> bool {
        match self {
            Self::Output(_) => false,
            Self::Recorder(recorder) => Arc::strong_count(recorder) > 1,
        }
    }
}

/// A ledger shared by all calls within one context.
pub struct Recorder<T: Domain> {
    ledger: Mutex<Ledger<T>>,
}

impl<T: Domain> Recorder<T> {
    /// Create a recorder with an empty ledger.
    pub fn new(config: LedgerConfig<T>) -> Self {
        Self { ledger: Mutex::new(Ledger::new(config)) }
    }

    /// Lock the ledger.
    ///
    /// Blocks while another call in the same context holds it.
    pub fn lock(&self) -> MutexGuard<'_, Ledger<T>> {
        self.ledger.lock()
    }

    /// Plan the calls for `query`, see [`Ledger::serve`].
    pub fn serve(&self, query: &Interval<T>) -> CallPlan<T> {
        self.lock().serve(query)
    }

    /// The number of stored intervals.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no interval was stored yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T: Domain> Debug for Recorder<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.ledger.try_lock() {
            Some(ledger) => f.debug_tuple("Recorder").field(&ledger.coverage()).finish(),
            None => f.pad("Recorder(<locked>)"),
        }
    }
}

/// Fetch the recorder stored under `key` or store a new one.
///
/// Fails with [`Error::RegistryCorruption`] if the key holds a call result.
pub fn find_or_create<Out, T, M>(
    memoizer: &M,
    key: u128,
    config: impl FnOnce() -> LedgerConfig<T>,
) -> Result<Arc<Recorder<T>>, Error>
where
    T: Domain,
    M: Memoizer<Slot<Out, T>>,
{
    let slot = memoizer.get_or_compute(key, || {
        debug!(key = ?key, "created recorder");
        Slot::Recorder(Arc::new(Recorder::new(config())))
    });
    match slot {
        Slot::Recorder(recorder) => Ok(recorder),
        Slot::Output(_) => Err(Error::RegistryCorruption { key }),
    }
}
