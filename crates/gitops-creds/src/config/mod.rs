pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, database_path, load_config, load_config_from_str, token_encryptor,
    validate_config,
};
pub use schema::{ArgoCdSettings, ClusterSettings, DatabaseSettings, LoggingSettings, ServiceConfig};
