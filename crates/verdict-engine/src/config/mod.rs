//! Engine config loader (strict parsing).

pub mod schema;

use std::fs;

use verdict_core::error::{Result, VerdictError};

pub use schema::{
    AgentConfig, BackendKind, BackendSection, CheckConfig, EngineConfig, EngineSection,
    RemoteBackendConfig, RuleConfig, ViolationAction,
};

pub fn load_from_file(path: &str) -> Result<EngineConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VerdictError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<EngineConfig> {
    let de = serde_yaml::Deserializer::from_str(s);
    let cfg: EngineConfig = serde_yaml::with::singleton_map_recursive::deserialize(de)
        .map_err(|e| VerdictError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
