// src/lib.rs
// Public library surface for the server binary and integration tests.

pub mod adapters;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod profile;
pub mod service;
pub mod signal;
pub mod store;
pub mod vector;
pub mod weighting;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::{EngineConfig, MergeConfig};
pub use crate::engine::{merge_signal_into_profile, replay};
pub use crate::error::{EngineError, EngineResult};
pub use crate::profile::{CognitiveProfile, Dimension, MergeResult};
pub use crate::service::ProfileService;
pub use crate::signal::{RawSignal, Signal, SignalSource};
pub use crate::store::{CasOutcome, InMemoryProfileStore, ProfileStore};
pub use crate::vector::TraitVector;
