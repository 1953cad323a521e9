//! Closed vocabulary: flight phases and competency tags
//!
//! Both sets are fixed at compile time. Parsing accepts only the exact
//! canonical spelling, so a value that made it into a `Phase` or `Tag`
//! is by construction a member of the vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error for a value outside the closed vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVocabularyValue {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVocabularyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a known {}", self.value, self.kind)
    }
}

impl std::error::Error for UnknownVocabularyValue {}

macro_rules! closed_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in canonical order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVocabularyValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVocabularyValue {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

closed_vocabulary! {
    /// Lifecycle stage of the flight an event belongs to
    Phase, "phase" {
        PreFlight => "Pre-flight",
        Taxi => "Taxi",
        Takeoff => "Takeoff",
        Climb => "Climb",
        Cruise => "Cruise",
        Descent => "Descent",
        Approach => "Approach",
        Landing => "Landing",
        Parking => "Parking",
        Debriefing => "Debriefing",
    }
}

closed_vocabulary! {
    /// Competency code attached to an event
    Tag, "tag" {
        Fa => "FA",
        Fm => "FM",
        Ap => "AP",
        Sa => "SA",
        Dm => "DM",
        Wm => "WM",
        Tb => "TB",
        Co => "CO",
        Kk => "KK",
        Aa => "AA",
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::ALL[0]
    }
}

/// Comma-separated canonical spellings, for prompt text
pub fn enumerate<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
