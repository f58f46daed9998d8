//! What kind of feed a [`Source`](crate::Source) offers, mirroring this
//! codebase's existing `Capability` probe idiom for access methods.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCapability {
    #[default]
    Poll,
    Stream,
}

impl Display for SourceCapability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceCapability::Poll => "poll",
            SourceCapability::Stream => "stream",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        assert_eq!(SourceCapability::Poll.to_string(), "poll");
        assert_eq!(SourceCapability::Stream.to_string(), "stream");
    }
}
