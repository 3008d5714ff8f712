//! The principal on whose behalf an operation runs.

use serde::{Deserialize, Serialize};

/// Who is calling into the job system.
///
/// Authentication happens in the host; this is only the resolved result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Caller {
    /// No authenticated principal.
    #[default]
    Anonymous,
    /// An ordinary authenticated user.
    User(String),
    /// An operator in the elevated (backend) context.
    Operator(String),
}

impl Caller {
    pub fn owner(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::User(id) | Caller::Operator(id) => Some(id),
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Caller::Operator(_))
    }
}
