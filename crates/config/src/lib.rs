//! Configuration schema and file loading for the herald bridge.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    env_subst::substitute_env,
    loader::{discover_and_load, find_config_file, load_config},
    schema::{
        CompletionConfig, DeliveryConfig, HeraldConfig, PipelineConfig, ServerConfig,
        WebhookConfig,
    },
};
