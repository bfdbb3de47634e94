//! Message priority
//!
//! Kept separate from the wire [`Urgency`] so callers never depend on the
//! remote schema directly.

use serde::{Deserialize, Serialize};

use crate::wire::Urgency;

/// Describes how important a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// An FYI, such as a new sign-up or a flagged post.
    #[default]
    Low,
    /// Something worth looking at soon.
    Medium,
    /// Show-stopping events: a database going down, a lost network link.
    High,
}

impl Priority {
    /// Map to the wire urgency sent to the remote service
    pub fn to_urgency(self) -> Urgency {
        match self {
            Priority::Low => Urgency::Low,
            Priority::Medium => Urgency::Medium,
            Priority::High => Urgency::High,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_low() {
        assert_eq!(Priority::default(), Priority::Low);
    }

    #[test]
    fn test_urgency_mapping() {
        assert_eq!(Priority::Low.to_urgency(), Urgency::Low);
        assert_eq!(Priority::Medium.to_urgency(), Urgency::Medium);
        assert_eq!(Priority::High.to_urgency(), Urgency::High);

        assert_eq!(Priority::Low.to_urgency().code(), 1);
        assert_eq!(Priority::Medium.to_urgency().code(), 2);
        assert_eq!(Priority::High.to_urgency().code(), 3);
    }

    #[test]
    fn test_parse_from_toml_value() {
        #[derive(Deserialize)]
        struct Wrapper {
            priority: Priority,
        }
        let parsed: Wrapper = toml::from_str("priority = \"high\"").unwrap();
        assert_eq!(parsed.priority, Priority::High);
    }
}
