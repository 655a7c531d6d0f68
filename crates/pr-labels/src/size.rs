//! # Size buckets
//!
//! Maps a change size (lines added + lines removed) to one of five ordered
//! buckets. Each bucket carries a bound of one of three shapes:
//!
//! | Shape | Matches (exclusive mode) | Matches (inclusive mode) |
//! |-------|--------------------------|--------------------------|
//! | `<max` | `size < max` | `size < max` |
//! | `min-max` | `min < size < max` | `min <= size <= max` |
//! | `>min` | `size > min` | `size > min` |
//!
//! Buckets are evaluated in a fixed order (tiny to huge) and the first match
//! wins, so misconfigured overlapping ranges still classify deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix shared by every size label.
pub const SIZE_LABEL_PREFIX: &str = "size/";

/// Named size buckets, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeBucket {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

impl SizeBucket {
    /// Every bucket in evaluation order.
    pub const ALL: [Self; 5] = [
        Self::Tiny,
        Self::Small,
        Self::Medium,
        Self::Large,
        Self::Huge,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tiny => "tiny",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Huge => "huge",
        }
    }

    /// Built-in range for this bucket.
    #[must_use]
    pub const fn default_bound(self) -> RangeBound {
        match self {
            Self::Tiny => RangeBound::Below(10),
            Self::Small => RangeBound::Between(10, 49),
            Self::Medium => RangeBound::Between(50, 100),
            Self::Large => RangeBound::Between(101, 500),
            Self::Huge => RangeBound::Above(500),
        }
    }

    #[must_use]
    pub fn label(self) -> SizeLabel {
        SizeLabel(format!("{SIZE_LABEL_PREFIX}{}", self.as_str()))
    }
}

impl fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `size/<bucket>` label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeLabel(String);

impl SizeLabel {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a label name belongs to the size family.
    #[must_use]
    pub fn is_size_label(name: &str) -> bool {
        name.starts_with(SIZE_LABEL_PREFIX)
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How `min-max` bounds treat their endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeMode {
    /// Both endpoints excluded. Sizes equal to an endpoint match no bucket.
    #[default]
    Exclusive,
    /// Both endpoints included.
    Inclusive,
}

/// The bound of a single bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeBound {
    /// `<max`
    Below(u64),
    /// `min-max`
    Between(u64, u64),
    /// `>min`
    Above(u64),
}

impl RangeBound {
    /// Parse a bound for `bucket`, naming the bucket in any error.
    ///
    /// # Errors
    /// [`ConfigError::InvalidRange`] for unrecognised shapes and
    /// [`ConfigError::InvertedRange`] when `min > max`.
    pub fn parse_for(bucket: SizeBucket, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRange {
            bucket: bucket.to_string(),
            value: value.to_string(),
        };
        let number = |s: &str| s.trim().parse::<u64>().map_err(|_| invalid());

        let trimmed = value.trim();
        if let Some(max) = trimmed.strip_prefix('<') {
            return Ok(Self::Below(number(max)?));
        }
        if let Some(min) = trimmed.strip_prefix('>') {
            return Ok(Self::Above(number(min)?));
        }

        let (min, max) = trimmed.split_once('-').ok_or_else(invalid)?;
        let (min, max) = (number(min)?, number(max)?);
        if min > max {
            return Err(ConfigError::InvertedRange {
                bucket: bucket.to_string(),
                value: value.to_string(),
                min,
                max,
            });
        }
        Ok(Self::Between(min, max))
    }

    /// Whether `size` falls inside this bound.
    #[must_use]
    pub const fn contains(self, size: u64, mode: RangeMode) -> bool {
        match (self, mode) {
            (Self::Below(max), _) => size < max,
            (Self::Above(min), _) => size > min,
            (Self::Between(min, max), RangeMode::Exclusive) => min < size && size < max,
            (Self::Between(min, max), RangeMode::Inclusive) => min <= size && size <= max,
        }
    }
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Below(max) => write!(f, "<{max}"),
            Self::Between(min, max) => write!(f, "{min}-{max}"),
            Self::Above(min) => write!(f, ">{min}"),
        }
    }
}

/// The configured bucket table. Built once at startup, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRanges {
    ranges: Vec<(SizeBucket, RangeBound)>,
    mode: RangeMode,
}

impl SizeRanges {
    /// The built-in table: tiny `<10`, small `10-49`, medium `50-100`,
    /// large `101-500`, huge `>500`.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            ranges: SizeBucket::ALL
                .iter()
                .map(|&bucket| (bucket, bucket.default_bound()))
                .collect(),
            mode: RangeMode::Exclusive,
        }
    }

    /// Replace one bucket's bound with a parsed override.
    ///
    /// # Errors
    /// Propagates [`RangeBound::parse_for`] failures.
    pub fn with_override(mut self, bucket: SizeBucket, value: &str) -> Result<Self, ConfigError> {
        let bound = RangeBound::parse_for(bucket, value)?;
        if let Some(entry) = self.ranges.iter_mut().find(|(b, _)| *b == bucket) {
            entry.1 = bound;
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RangeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn mode(&self) -> RangeMode {
        self.mode
    }

    #[must_use]
    pub fn bound(&self, bucket: SizeBucket) -> Option<RangeBound> {
        self.ranges
            .iter()
            .find(|(b, _)| *b == bucket)
            .map(|(_, bound)| *bound)
    }

    /// Bucket for `size`, or `None` when no range matches.
    #[must_use]
    pub fn bucket_for(&self, size: u64) -> Option<SizeBucket> {
        self.ranges
            .iter()
            .find(|(_, bound)| bound.contains(size, self.mode))
            .map(|(bucket, _)| *bucket)
    }

    /// Label for `size`, or `None` when no range matches.
    #[must_use]
    pub fn classify(&self, size: u64) -> Option<SizeLabel> {
        self.bucket_for(size).map(SizeBucket::label)
    }
}

impl Default for SizeRanges {
    fn default() -> Self {
        Self::defaults()
    }
}
