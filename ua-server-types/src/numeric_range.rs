use crate::Variant;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NumericRangeParseError {
    #[error("empty index range")]
    Empty,
    #[error("invalid index range bound: {0}")]
    InvalidBound(String),
    #[error("index range lower bound must be less than upper bound: {0}")]
    BoundsReversed(String),
    #[error("multi-dimension index ranges are not supported: {0}")]
    MultiDimension(String),
}

/// Single-dimension OPC UA index range, inclusive on both ends.
///
/// Text forms: `"5"` (single element) and `"2:7"` (`first < last` required).
/// Multi-dimension ranges are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange {
    first: u32,
    last: u32,
}

impl NumericRange {
    /// Range covering exactly one element.
    pub fn index(i: u32) -> Self {
        NumericRange { first: i, last: i }
    }

    /// Inclusive range `first..=last`. Callers must keep `first <= last`;
    /// the text form additionally requires `first < last`.
    pub fn span(first: u32, last: u32) -> Option<Self> {
        (first <= last).then_some(NumericRange { first, last })
    }

    #[inline]
    pub fn first(&self) -> u32 {
        self.first
    }

    #[inline]
    pub fn last(&self) -> u32 {
        self.last
    }

    /// Whether the two ranges share at least one index.
    #[inline]
    pub fn overlaps(&self, other: &NumericRange) -> bool {
        self.first.max(other.first) <= self.last.min(other.last)
    }

    /// Extract the covered slice of `value`.
    ///
    /// - arrays and byte strings yield the clamped sub-sequence, `None` when
    ///   the range lies entirely outside the data;
    /// - scalars pass through only when the range touches index 0.
    pub fn extract(&self, value: &Variant) -> Option<Variant> {
        match value {
            Variant::Array(items) => {
                let (lo, hi) = self.clamp_to(items.len())?;
                Some(Variant::Array(items[lo..=hi].to_vec()))
            }
            Variant::ByteString(bytes) => {
                let (lo, hi) = self.clamp_to(bytes.len())?;
                Some(Variant::ByteString(bytes.slice(lo..hi + 1)))
            }
            scalar => (self.first == 0).then(|| scalar.clone()),
        }
    }

    fn clamp_to(&self, len: usize) -> Option<(usize, usize)> {
        if len == 0 || self.first as usize >= len {
            return None;
        }
        Some((self.first as usize, (self.last as usize).min(len - 1)))
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

impl FromStr for NumericRange {
    type Err = NumericRangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(NumericRangeParseError::Empty);
        }
        if s.contains(',') {
            return Err(NumericRangeParseError::MultiDimension(s.to_string()));
        }
        let parse_bound = |b: &str| {
            b.parse::<u32>()
                .map_err(|_| NumericRangeParseError::InvalidBound(s.to_string()))
        };
        match s.split_once(':') {
            None => Ok(NumericRange::index(parse_bound(s)?)),
            Some((lo, hi)) => {
                let (first, last) = (parse_bound(lo)?, parse_bound(hi)?);
                if first >= last {
                    return Err(NumericRangeParseError::BoundsReversed(s.to_string()));
                }
                Ok(NumericRange { first, last })
            }
        }
    }
}

impl Serialize for NumericRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NumericRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
