use std::fmt;

use crate::error::Error;

/// The two privilege-bearing verbs. `verify` at the transfer layer maps onto
/// `Upload` rather than being a third variant here — a sealed two-way match
/// keeps the privilege model closed by construction (see the design notes on
/// replacing string-keyed dispatch with a tagged enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Download,
    Upload,
}

impl Action {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "download" => Ok(Action::Download),
            "upload" => Ok(Action::Upload),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Download => "download",
            Action::Upload => "upload",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
