//! Request outcome classes and polling expectations.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Coarse classification of a single GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// 2xx response.
    Ok,
    /// 3xx response.
    Redirect,
    /// 4xx response.
    ClientError,
    /// 5xx or any other status.
    ServerError,
    /// Connection refused or unreachable host.
    CouldntConnect,
    /// No complete response before the request deadline.
    TimedOut,
    /// Connection reset, truncated response and similar.
    TransportError,
}

impl Outcome {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Outcome::Ok,
            300..=399 => Outcome::Redirect,
            400..=499 => Outcome::ClientError,
            _ => Outcome::ServerError,
        }
    }

    /// Classify a transport failure.
    pub fn from_error(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Outcome::CouldntConnect
        } else if err.is_timeout() {
            Outcome::TimedOut
        } else if let Some(status) = err.status() {
            Outcome::from_status(status.as_u16())
        } else {
            Outcome::TransportError
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Redirect => "redirect",
            Outcome::ClientError => "client_error",
            Outcome::ServerError => "server_error",
            Outcome::CouldntConnect => "couldnt_connect",
            Outcome::TimedOut => "timed_out",
            Outcome::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unrecognised outcome tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outcome token: {0}")]
pub struct UnknownOutcome(pub String);

impl FromStr for Outcome {
    type Err = UnknownOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Outcome::Ok),
            "redirect" => Ok(Outcome::Redirect),
            "client_error" => Ok(Outcome::ClientError),
            "server_error" => Ok(Outcome::ServerError),
            "couldnt_connect" => Ok(Outcome::CouldntConnect),
            "timed_out" => Ok(Outcome::TimedOut),
            "transport_error" => Ok(Outcome::TransportError),
            other => Err(UnknownOutcome(other.to_string())),
        }
    }
}

/// Condition a poll loop waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Stop when the outcome equals this token.
    Is(Outcome),
    /// Stop as soon as the outcome is anything else.
    Not(Outcome),
}

impl Expect {
    pub fn matches(&self, outcome: Outcome) -> bool {
        match self {
            Expect::Is(want) => outcome == *want,
            Expect::Not(unwanted) => outcome != *unwanted,
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Is(o) => write!(f, "{}", o),
            Expect::Not(o) => write!(f, "!{}", o),
        }
    }
}

impl FromStr for Expect {
    type Err = UnknownOutcome;

    /// A leading `!` negates the token, e.g. `"!couldnt_connect"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('!') {
            Some(rest) => Ok(Expect::Not(rest.parse()?)),
            None => Ok(Expect::Is(s.parse()?)),
        }
    }
}

impl From<Outcome> for Expect {
    fn from(outcome: Outcome) -> Self {
        Expect::Is(outcome)
    }
}

/// Histogram of outcomes, ordered by outcome class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeCounts(BTreeMap<Outcome, u64>);

impl OutcomeCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: Outcome) {
        *self.0.entry(outcome).or_insert(0) += 1;
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &OutcomeCounts) {
        for (outcome, count) in &other.0 {
            *self.0.entry(*outcome).or_insert(0) += count;
        }
    }

    pub fn get(&self, outcome: Outcome) -> u64 {
        self.0.get(&outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Outcome, u64)> + '_ {
        self.0.iter().map(|(o, c)| (*o, *c))
    }

    /// Entries whose outcome is anything other than `ok`.
    pub fn failures(&self) -> impl Iterator<Item = (Outcome, u64)> + '_ {
        self.iter().filter(|(o, _)| *o != Outcome::Ok)
    }
}

impl Extend<Outcome> for OutcomeCounts {
    fn extend<I: IntoIterator<Item = Outcome>>(&mut self, iter: I) {
        for outcome in iter {
            self.record(outcome);
        }
    }
}

impl FromIterator<Outcome> for OutcomeCounts {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut counts = OutcomeCounts::new();
        counts.extend(iter);
        counts
    }
}

impl fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (outcome, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", outcome, count)?;
        }
        Ok(())
    }
}
