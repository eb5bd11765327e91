//! Correlation ids pairing a combat request with its reply.

use std::fmt;
use uuid::Uuid;

/// Token stamped on a request's `correlation_id` property and echoed back by
/// the worker on the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short format (first 8 characters) for logging.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Whether a reply's raw property value carries this id.
    pub fn matches(&self, raw: Option<&str>) -> bool {
        raw.and_then(|value| Uuid::parse_str(value).ok()) == Some(self.0)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn short_format_is_8_chars() {
        assert_eq!(CorrelationId::new().short().len(), 8);
    }

    #[test]
    fn matches_only_its_own_wire_form() {
        let id = CorrelationId::new();
        let wire = id.to_string();

        assert!(id.matches(Some(&wire)));
        assert!(!id.matches(Some(&CorrelationId::new().to_string())));
        assert!(!id.matches(Some("not-a-uuid")));
        assert!(!id.matches(None));
    }
}
