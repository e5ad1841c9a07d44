//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging — for example —
//! a [`ClientId`] with a [`CompetitorId`] even though both are strings under the
//! hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.trim().is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier holds only whitespace.
            ///
            /// Values built through [`Self::new`] never do, but deserialised
            /// request payloads may.
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single pipeline run.
///
/// Supplied by the caller through `RunConfig` or generated fresh; propagated
/// through spans and echoed in the outline result so all activity from one
/// run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(Uuid);

impl ThreadId {
    /// Generates a new random thread identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`ThreadId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (document store keys / configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a pitch record in the document store.
    ///
    /// Final outline and slide results are written back under this key.
    PitchId
}

string_id! {
    /// Identifies a client record in the `clients` collection.
    ClientId
}

string_id! {
    /// Identifies a competitor, either a stored record in the `competitors`
    /// collection or an ad-hoc entry carrying the manual-entry prefix.
    CompetitorId
}

string_id! {
    /// A concrete LLM model identifier (e.g. `"claude-sonnet-4-5"`).
    ///
    /// Every completion request carries one; an absent model is a
    /// configuration error raised before any pipeline starts.
    ModelName
}

/// Prefix marking competitor ids that were typed in by the user rather than
/// selected from stored records.
pub const MANUAL_COMPETITOR_PREFIX: &str = "manual-";

impl CompetitorId {
    /// Returns `true` for ad-hoc competitors that have no stored record.
    pub fn is_manual(&self) -> bool {
        self.0.starts_with(MANUAL_COMPETITOR_PREFIX)
    }
}
