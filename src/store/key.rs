use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchKeyError {
    #[error("batch key {0:?} is not a number")]
    NotANumber(String),
    #[error("batch key {0:?} is not a finite, non-negative timestamp")]
    OutOfRange(String),
}

/// Wall-clock arrival time of a batch, in seconds since the epoch.
///
/// The textual form is kept verbatim so keys written by other tools
/// survive a load/persist cycle. Keys order numerically.
#[derive(Debug, Clone)]
pub struct BatchKey {
    text: String,
    seconds: f64,
}

impl BatchKey {
    pub fn parse(text: &str) -> Result<Self, BatchKeyError> {
        let seconds: f64 = text
            .trim()
            .parse()
            .map_err(|_| BatchKeyError::NotANumber(text.to_string()))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(BatchKeyError::OutOfRange(text.to_string()));
        }
        Ok(Self {
            text: text.to_string(),
            seconds,
        })
    }

    pub fn from_micros(micros: u64) -> Self {
        let text = format!("{}.{:06}", micros / 1_000_000, micros % 1_000_000);
        let seconds = micros as f64 / 1_000_000.0;
        Self { text, seconds }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    /// Whole microseconds, rounded down. Exact for plain decimal keys.
    pub fn micros(&self) -> u64 {
        let text = self.text.trim();
        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        let plain = !whole.is_empty()
            && whole.bytes().all(|b| b.is_ascii_digit())
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if plain && let Ok(secs) = whole.parse::<u64>() {
            let digits: String = fraction.chars().chain("000000".chars()).take(6).collect();
            if let Ok(sub) = digits.parse::<u64>() {
                return secs.saturating_mul(1_000_000).saturating_add(sub);
            }
        }
        (self.seconds * 1_000_000.0).floor() as u64
    }

    pub fn to_local(&self) -> Option<DateTime<Local>> {
        let micros = self.micros();
        let secs = i64::try_from(micros / 1_000_000).ok()?;
        let nanos = (micros % 1_000_000) as u32 * 1_000;
        DateTime::from_timestamp(secs, nanos).map(|utc| utc.with_timezone(&Local))
    }
}

impl PartialEq for BatchKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for BatchKey {}

impl Hash for BatchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Ord for BatchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.text == other.text {
            return Ordering::Equal;
        }
        self.seconds
            .total_cmp(&other.seconds)
            .then_with(|| self.text.cmp(&other.text))
    }
}

impl PartialOrd for BatchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for BatchKey {
    type Err = BatchKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for BatchKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for BatchKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Mints strictly increasing batch keys from the wall clock, so two
/// datagrams arriving within the same microsecond never share a key.
#[derive(Debug, Default, Clone)]
pub struct KeySource {
    last_micros: Option<u64>,
}

impl KeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues after `newest`, typically the last key already stored.
    pub fn after(newest: Option<&BatchKey>) -> Self {
        Self {
            last_micros: newest.map(BatchKey::micros),
        }
    }

    pub fn next(&mut self) -> BatchKey {
        self.next_at(SystemTime::now())
    }

    pub fn next_at(&mut self, now: SystemTime) -> BatchKey {
        let now_micros = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();
        let micros = match self.last_micros {
            Some(last) if now_micros <= last => last + 1,
            _ => now_micros,
        };
        self.last_micros = Some(micros);
        BatchKey::from_micros(micros)
    }
}
