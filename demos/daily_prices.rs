//! This demo memoizes a slow price feed by date range. Extending a range only
//! fetches the days that were not fetched before.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use spanmemo::{
    Args, Binding, Error, Interval, IntervalMemo, IntervalValue, Limit, Signature, aggregate,
};

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Arg {
    Ticker(String),
    Period(Interval<NaiveDate>),
}

impl IntervalValue<NaiveDate> for Arg {
    fn as_interval(&self) -> Option<&Interval<NaiveDate>> {
        match self {
            Self::Period(period) => Some(period),
            Self::Ticker(_) => None,
        }
    }

    fn from_interval(interval: Interval<NaiveDate>) -> Self {
        Self::Period(interval)
    }
}

impl From<&str> for Arg {
    fn from(ticker: &str) -> Self {
        Self::Ticker(ticker.into())
    }
}

impl From<Interval<NaiveDate>> for Arg {
    fn from(period: Interval<NaiveDate>) -> Self {
        Self::Period(period)
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spanmemo=info".into()),
        )
        .init();

    let prices = IntervalMemo::builder(
        Signature::new().required("ticker").required("period"),
        fetch,
        aggregate::accumulate(),
    )
    .interval_keyword("period")
    .trace(true)
    .build()?;

    let date = |month, day| {
        NaiveDate::from_ymd_opt(2024, month, day).ok_or(Error::MalformedInterval)
    };
    let call = |ticker: &str, period: Interval<NaiveDate>| {
        prices.call(Args::new().arg(ticker).arg(period))
    };

    // [Miss] Fetches the whole of January.
    let january = call("ACME", Interval::closed(date(1, 1)?, date(1, 31)?))?;

    // [Hit] The week was fetched with January, which is returned whole.
    let week = call("ACME", Interval::closed(date(1, 1)?, date(1, 7)?))?;

    // [Miss] Only the first days of February are fetched.
    let extended = call("ACME", Interval::closed(date(1, 1)?, date(2, 3)?))?;

    // [Miss] Another ticker is another context.
    call("INIT", Interval::closed(date(1, 1)?, date(1, 3)?))?;

    println!("january: {} days, week: {} days", january.len(), week.len());
    println!("extended: {} days", extended.len());
    println!("{:?}", prices.stats());
    Ok(())
}

/// Pretend to query a price feed for the days of `period`.
fn fetch(binding: &Binding<Arg>) -> Result<BTreeMap<NaiveDate, f64>, Error> {
    let Some(Arg::Ticker(ticker)) = binding.get(0) else {
        return Err(Error::InvalidIntervalArgument { param: "ticker".into() });
    };
    let period = binding.get(1).and_then(Arg::as_interval).ok_or_else(|| {
        Error::InvalidIntervalArgument { param: "period".into() }
    })?;
    println!("fetching {ticker} for {period}");

    let (Some(Limit::Finite(first)), Some(Limit::Finite(last))) = (period.lower(), period.upper())
    else {
        return Ok(BTreeMap::new());
    };
    Ok(first
        .iter_days()
        .take_while(|day| day <= last)
        .filter(|day| period.contains_value(day))
        .map(|day| (day, 100.0 + f64::from(day.ordinal())))
        .collect())
}
