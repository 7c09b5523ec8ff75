//! Strongly typed record identifiers
//!
//! Records are normalized and addressed by integer keys; these wrappers keep
//! an exam id from being passed where a field id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Exam catalog entry
    ExamId
);
record_id!(CategoryId);
record_id!(
    /// A single field definition row (one version of a slot)
    FieldId
);
record_id!(
    /// Logical field slot shared by every version of a field
    SlotId
);
record_id!(
    /// Request exam instance ("detail")
    InstanceId
);
