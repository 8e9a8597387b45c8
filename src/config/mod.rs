// src/config/mod.rs

pub mod defaults;
pub mod loader;
pub mod model;
pub mod validate;
pub mod wire;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ClassSpec, ConfigFile, JobConfig, RawConfigFile, StringList};
pub use validate::validate_job;
