//! Correlation id generators for outbound calls.

use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

use crate::types::RequestId;

/// Produces ids unique among the calls pending on one engine.
///
/// Uniqueness is the generator's responsibility; the engine does not check.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> RequestId;
}

/// Random UUID v4 string ids (the default)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::String(Uuid::new_v4().to_string())
    }
}

/// Monotonic numeric ids starting at 1
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicI64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let generator = UuidIdGenerator;
        let ids: HashSet<RequestId> = (0..100).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_sequential_ids() {
        let generator = SequentialIdGenerator::new();
        assert_eq!(generator.next_id(), RequestId::Number(1));
        assert_eq!(generator.next_id(), RequestId::Number(2));
    }
}
