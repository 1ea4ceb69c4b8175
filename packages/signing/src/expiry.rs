//! Certificate lifetimes in duration notation (`87600h`, `90m`, `1h30m`)

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, SigningError};

/// Validity period of an issued certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expiry(Duration);

impl Expiry {
    /// Expiry of `hours` hours
    #[must_use]
    pub const fn from_hours(hours: u64) -> Self {
        Self(Duration::from_secs(hours * 3_600))
    }

    /// Parse `<number><unit>` groups; units are `h`, `m` and `s`
    ///
    /// # Errors
    ///
    /// Returns `SigningError::InvalidRequest` for malformed or zero durations.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            SigningError::InvalidRequest(format!("invalid expiry '{value}': {reason}"))
        };

        let mut total: u64 = 0;
        let mut digits = String::new();
        for c in value.trim().chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let unit = match c {
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                other => return Err(invalid(&format!("unknown unit '{other}'"))),
            };
            let amount: u64 = digits
                .parse()
                .map_err(|_| invalid("expected a number before each unit"))?;
            digits.clear();
            total = amount
                .checked_mul(unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| invalid("too large"))?;
        }
        if !digits.is_empty() {
            return Err(invalid("missing unit"));
        }
        if total == 0 {
            return Err(invalid("must be positive"));
        }
        Ok(Self(Duration::from_secs(total)))
    }

    /// Validity as a `Duration`
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Self(Duration::from_secs(duration.as_secs()))
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if secs % 3_600 == 0 {
            write!(f, "{}h", secs / 3_600)
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl FromStr for Expiry {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Expiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hour_notation() {
        assert_eq!(Expiry::parse("87600h").unwrap(), Expiry::from_hours(87_600));
        assert_eq!(
            Expiry::parse("1h30m").unwrap().as_duration(),
            Duration::from_secs(5_400)
        );
        assert_eq!(Expiry::parse("45s").unwrap().as_duration(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "10", "h", "10d", "0h", "-5h", "1.5h"] {
            assert!(Expiry::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn displays_in_largest_whole_unit() {
        assert_eq!(Expiry::from_hours(43_800).to_string(), "43800h");
        assert_eq!(Expiry::parse("90m").unwrap().to_string(), "90m");
        assert_eq!(Expiry::parse("1m5s").unwrap().to_string(), "65s");
    }

    proptest::proptest! {
        #[test]
        fn prop_display_parses_back(secs in 1u64..10_000_000) {
            let expiry = Expiry::from(Duration::from_secs(secs));
            proptest::prop_assert_eq!(Expiry::parse(&expiry.to_string()).unwrap(), expiry);
        }

        #[test]
        fn prop_groups_add_up(h in 0u64..100_000, m in 0u64..60, s in 1u64..60) {
            let total = Expiry::parse(&format!("{h}h{m}m{s}s")).unwrap();
            proptest::prop_assert_eq!(total.as_duration().as_secs(), h * 3_600 + m * 60 + s);
        }
    }
}
