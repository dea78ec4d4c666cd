// src/store/mod.rs
//! Profile store boundary.
//!
//! The engine only needs two operations: read the current profile of an entity
//! and write a new one conditioned on the version it was computed from. The
//! version is the profile's `total_signals` (0 for an absent profile), which grows
//! by exactly one per accepted merge.

use crate::error::EngineResult;
use crate::profile::CognitiveProfile;

mod memory;

pub use memory::InMemoryProfileStore;

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// Another writer got there first; `current_version` is what the store holds now.
    Conflict { current_version: u64 },
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, entity_id: &str) -> EngineResult<Option<CognitiveProfile>>;

    /// Store `new_profile` only if the stored version still equals `expected_version`.
    async fn compare_and_set(
        &self,
        entity_id: &str,
        expected_version: u64,
        new_profile: CognitiveProfile,
    ) -> EngineResult<CasOutcome>;

    fn name(&self) -> &'static str;
}
