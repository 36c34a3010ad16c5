use std::hash::Hash;

use siphasher::sip128::{Hasher128, SipHasher13};

/// Produce a 128-bit hash of a value.
#[inline]
pub fn hash<T: Hash + ?Sized>(value: &T) -> u128 {
    let mut state = SipHasher13::new();
    value.hash(&mut state);
    state.finish128().as_u128()
}

/// What a memoizer key addresses.
///
/// Part of every key so that a call result and a recorder never share a key,
/// even for equal namespaces and arguments.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) enum Tag {
    /// The result of one atomic sub-call.
    Call,
    /// The ledger of one bound context.
    Recorder,
}

/// The key of a value in a combinator's namespace.
pub(crate) fn key<V: Hash + ?Sized>(namespace: &str, tag: Tag, value: &V) -> u128 {
    hash(&(namespace, tag, value))
}
