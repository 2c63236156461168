//! Request correlation ids for tracing a tool call across subsystems

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier attached to every tool invocation and propagated through
/// indexing, storage and search so that log lines from one request can be
/// stitched back together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID, for persistence
    pub const fn to_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn display_matches_uuid() {
        let id = CorrelationId::new();
        assert_eq!(id.to_string(), id.to_uuid().to_string());
    }
}
