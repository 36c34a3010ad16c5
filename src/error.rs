//! Error types.
//!
//! Everything that can go wrong inside the ledger, the registry or the call
//! expansion is an [`Error`]. Failures of the wrapped function are not
//! represented here: they are returned to the caller unchanged, which is why
//! [`IntervalMemo::call`](crate::IntervalMemo::call) requires the function's
//! error type to implement `From<Error>`.

/// Errors produced while expanding and memoizing a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A parameter designated as interval-valued was bound to a value that is
    /// not an interval.
    #[error("argument `{param}` is not an interval")]
    InvalidIntervalArgument {
        /// Name of the offending parameter
        param: String,
    },

    /// The aggregator received no results to combine.
    ///
    /// This happens when every planned sub-call was dropped, for instance
    /// because all new pieces were narrower than the configured tolerance.
    #[error("nothing to aggregate")]
    NothingToAggregate,

    /// A recorder key resolved to a slot of the wrong kind.
    ///
    /// Indicates that the memoizer is shared in a way that makes call keys and
    /// recorder keys collide, e.g. two combinators with the same namespace.
    #[error("registry slot {key:#034x} does not hold a recorder")]
    RegistryCorruption {
        /// The colliding key
        key: u128,
    },

    /// An interval was constructed with its lower bound above its upper bound.
    #[error("interval lower bound exceeds its upper bound")]
    MalformedInterval,

    /// A designated parameter does not exist in the signature.
    #[error("unknown parameter `{param}`")]
    UnknownParameter {
        /// Position or name as given by the caller
        param: String,
    },

    /// The cartesian product of the call plans exceeds the configured limit.
    #[error("call expands into {planned} sub-calls, limit is {limit}")]
    FanOutExceeded {
        /// Number of sub-calls the plans expand into
        planned: usize,
        /// Configured maximum
        limit: usize,
    },

    /// The arguments do not fit the declared signature.
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Errors produced while binding arguments against a
/// [`Signature`](crate::Signature).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// More positional arguments than declared parameters.
    #[error("expected at most {expected} positional arguments, got {given}")]
    TooManyPositional {
        /// Number of declared parameters
        expected: usize,
        /// Number of positional arguments passed
        given: usize,
    },

    /// A keyword argument that names no parameter.
    #[error("unexpected keyword argument `{name}`")]
    UnexpectedKeyword {
        /// The keyword
        name: String,
    },

    /// A parameter received both a positional and a keyword argument, or the
    /// same keyword twice.
    #[error("multiple values for argument `{name}`")]
    DuplicateArgument {
        /// The parameter
        name: String,
    },

    /// A parameter without default received no argument.
    #[error("missing required argument `{name}`")]
    MissingArgument {
        /// The parameter
        name: String,
    },
}
