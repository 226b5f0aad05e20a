//! Severity tags for failures (E1 lowest, E4 system-critical).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Malformed or empty input, rejected before scheduling
    E1,
    /// Transient fault, recovered locally
    E2,
    /// Unrecoverable task-level failure
    E3,
    /// System-critical precondition failure
    E4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::E1 => "E1",
            Severity::E2 => "E2",
            Severity::E3 => "E3",
            Severity::E4 => "E4",
        }
    }

    /// E3 and above always produce an escalation record
    pub fn escalates(&self) -> bool {
        *self >= Severity::E3
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
