// src/store/memory.rs
use dashmap::{mapref::entry::Entry, DashMap};

use super::{CasOutcome, ProfileStore};
use crate::error::EngineResult;
use crate::profile::CognitiveProfile;

/// Process-local store. Sharded by entity id, so writers for different entities
/// never contend on a common lock.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, CognitiveProfile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, entity_id: &str) -> EngineResult<Option<CognitiveProfile>> {
        Ok(self.profiles.get(entity_id).map(|r| r.clone()))
    }

    async fn compare_and_set(
        &self,
        entity_id: &str,
        expected_version: u64,
        new_profile: CognitiveProfile,
    ) -> EngineResult<CasOutcome> {
        // The entry guard holds the shard lock for the check and the write.
        let outcome = match self.profiles.entry(entity_id.to_string()) {
            Entry::Occupied(mut e) => {
                let current_version = e.get().version();
                if current_version == expected_version {
                    e.insert(new_profile);
                    CasOutcome::Applied
                } else {
                    CasOutcome::Conflict { current_version }
                }
            }
            Entry::Vacant(e) => {
                if expected_version == 0 {
                    e.insert(new_profile);
                    CasOutcome::Applied
                } else {
                    CasOutcome::Conflict { current_version: 0 }
                }
            }
        };
        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
