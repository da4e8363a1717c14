use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Raw identifier as it appears on the wire.
///
/// Remote payloads are inconsistent about id types, so both JSON strings and
/// integers are accepted and normalized to their decimal text form.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Unsigned(n) => n.to_string(),
            WireId::Signed(n) => n.to_string(),
        }
    }
}

macro_rules! text_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                WireId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

text_id!(
    /// Student owning statistics, submissions and the roadmap.
    StudentId
);
text_id!(
    /// One graded attempt at an assessment.
    SubmissionId
);
text_id!(AssessmentId);
text_id!(
    /// Assignment that practice quizzes are generated for.
    AssignmentId
);
text_id!(QuestionId);
text_id!(OptionId);
text_id!(
    /// Stable roadmap task identity, preserved across server reconciliation.
    TaskId
);
text_id!(
    /// Identifier of a single analysis stage result.
    ResultId
);

impl ResultId {
    /// Mint a fresh id for a result computed on this device.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("local-{}", uuid::Uuid::new_v4()))
    }

    /// Returns true if the id was minted by [`ResultId::generate`].
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}
