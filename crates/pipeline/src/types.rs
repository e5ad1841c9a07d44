//! Shared value types for the pitch generation domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. review scores are in `[1.0, 10.0]`,
//! token counts are non-negative integers) and participate in domain
//! computations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token accounting
// ---------------------------------------------------------------------------

/// Number of tokens consumed in an LLM API call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this count is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Input/output token usage reported by a provider for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub input: TokenCount,
    /// Tokens in the generated response.
    pub output: TokenCount,
}

impl TokenUsage {
    /// Sum of input and output tokens.
    pub fn total(self) -> TokenCount {
        self.input + self.output
    }
}

// ---------------------------------------------------------------------------
// Review scoring
// ---------------------------------------------------------------------------

/// Severity attached to a reviewer finding.
///
/// Serialised in upper case (`"HIGH"`, `"MEDIUM"`, `"LOW"`) to match the
/// reviewer's response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Forces a revision pass regardless of the overall score.
    #[serde(alias = "high", alias = "High")]
    High,
    /// Should be addressed; revision depends on the overall score.
    #[serde(alias = "medium", alias = "Medium")]
    Medium,
    /// Cosmetic.
    #[serde(alias = "low", alias = "Low")]
    Low,
    /// Any label outside the three above. Never forces a revision.
    #[serde(other)]
    Unknown,
}

/// An overall deck quality score in the range `[1.0, 10.0]`.
///
/// Deserialisation rejects out-of-range values; a review carrying one keeps
/// its issues but is scored neutrally instead of driving a revision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64")]
pub struct ReviewScore(f64);

impl ReviewScore {
    /// Score below which a deck is sent for revision.
    pub const REVISION_THRESHOLD: f64 = 7.0;

    /// Creates a [`ReviewScore`], returning `None` if `value` is outside
    /// `[1.0, 10.0]` or not finite.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (1.0..=10.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The score assumed when a review could not be obtained.
    pub fn neutral() -> Self {
        Self(Self::REVISION_THRESHOLD)
    }

    /// Returns the score as an `f64`.
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if the score alone warrants a revision pass.
    pub fn needs_revision(self) -> bool {
        self.0 < Self::REVISION_THRESHOLD
    }
}

impl TryFrom<f64> for ReviewScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("review score {value} is outside 1-10"))
    }
}

impl Default for ReviewScore {
    fn default() -> Self {
        Self::neutral()
    }
}

impl std::fmt::Display for ReviewScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, saturating at zero.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        self.0
            .signed_duration_since(earlier.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
