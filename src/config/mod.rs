//! Engine configuration: merge coefficients, service policy and adapter tunables.

mod engine;

pub use engine::{
    AdapterConfig, ConfidenceWeights, EngineConfig, MergeConfig, ServiceConfig,
    DEFAULT_ENGINE_CONFIG_PATH, ENV_DEDUP, ENV_ENGINE_CONFIG_PATH, ENV_MAX_RETRIES,
    ENV_SOURCE_CONFIDENCE_PATH,
};
