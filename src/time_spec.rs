//! Relative/absolute time-range parsing (SPEC_FULL.md §1.6).
//!
//! The `Clock` trait is a small testable seam around wall-clock reads:
//! production code reads the real clock, tests pin it to a fixed
//! instant.

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, XtopError};

/// A source of "now". `SystemClock` in production, `FixedClock` in
/// tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A `--from`/`--to` argument before it's resolved against a clock.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    /// An RFC3339 instant.
    Absolute(DateTime<Utc>),
    /// The literal `now`.
    Now,
    /// `-Nh` / `-Nmin` / `-Ns`: N units back from the clock.
    RelativeBack(Duration),
}

impl TimeSpec {
    /// Parse a raw CLI argument into a `TimeSpec` (not yet resolved to an
    /// instant).
    pub fn parse(raw: &str) -> Result<TimeSpec> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("now") {
            return Ok(TimeSpec::Now);
        }
        if let Some(rest) = raw.strip_prefix('-') {
            return parse_relative(rest).map(TimeSpec::RelativeBack);
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| TimeSpec::Absolute(dt.with_timezone(&Utc)))
            .map_err(|e| XtopError::Parse(format!("invalid time spec '{raw}': {e}")))
    }

    /// Resolve this spec to a concrete instant using `clock`.
    pub fn resolve(&self, clock: &dyn Clock) -> DateTime<Utc> {
        match self {
            TimeSpec::Absolute(dt) => *dt,
            TimeSpec::Now => clock.now(),
            TimeSpec::RelativeBack(d) => clock.now() - *d,
        }
    }
}

/// Parse the numeric+unit tail of a relative spec, e.g. `"6h"`, `"30min"`,
/// `"45s"`.
fn parse_relative(rest: &str) -> Result<Duration> {
    let unit_start = rest
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| XtopError::Parse(format!("missing unit in relative time spec '-{rest}'")))?;
    let (digits, unit) = rest.split_at(unit_start);
    let n: i64 = digits
        .parse()
        .map_err(|_| XtopError::Parse(format!("invalid number in relative time spec '-{rest}'")))?;
    match unit {
        "h" => Ok(Duration::hours(n)),
        "min" => Ok(Duration::minutes(n)),
        "s" => Ok(Duration::seconds(n)),
        other => Err(XtopError::Parse(format!("unknown time unit '{other}' in '-{rest}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap())
    }

    #[test]
    fn parses_now() {
        assert_eq!(TimeSpec::parse("now").unwrap(), TimeSpec::Now);
        assert_eq!(TimeSpec::parse("NOW").unwrap(), TimeSpec::Now);
    }

    #[test]
    fn parses_rfc3339_absolute() {
        let spec = TimeSpec::parse("2025-01-01T00:00:00Z").unwrap();
        match spec {
            TimeSpec::Absolute(dt) => assert_eq!(dt.to_rfc3339(), "2025-01-01T00:00:00+00:00"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parses_relative_hours_minutes_seconds() {
        assert_eq!(TimeSpec::parse("-6h").unwrap(), TimeSpec::RelativeBack(Duration::hours(6)));
        assert_eq!(TimeSpec::parse("-30min").unwrap(), TimeSpec::RelativeBack(Duration::minutes(30)));
        assert_eq!(TimeSpec::parse("-45s").unwrap(), TimeSpec::RelativeBack(Duration::seconds(45)));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(TimeSpec::parse("-6d").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(TimeSpec::parse("not-a-time").is_err());
    }

    #[test]
    fn resolves_relative_against_fixed_clock() {
        let clock = fixed();
        let spec = TimeSpec::parse("-6h").unwrap();
        let resolved = spec.resolve(&clock);
        assert_eq!(resolved, clock.now() - Duration::hours(6));
    }

    #[test]
    fn now_resolves_to_clock_now() {
        let clock = fixed();
        assert_eq!(TimeSpec::Now.resolve(&clock), clock.now());
    }
}
